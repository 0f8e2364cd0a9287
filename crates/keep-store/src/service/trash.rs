//! The trash worker: drains the trash work queue, asking the volume
//! manager to delete each listed block wherever it's still present with
//! the mtime the policy engine observed when it decided to trash it.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use keep_types::KeepError;

use crate::domain::{TrashListItem, WorkQueue};
use crate::manager::VolumeManager;

pub struct TrashWorker {
    queue: Arc<WorkQueue<TrashListItem>>,
    manager: Arc<VolumeManager>,
}

/// How many items were actually trashed vs. skipped (mtime had moved on,
/// or the locator didn't parse) in one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrashReport {
    pub trashed: u64,
    pub skipped: u64,
}

impl TrashWorker {
    pub fn new(queue: Arc<WorkQueue<TrashListItem>>, manager: Arc<VolumeManager>) -> Self {
        Self { queue, manager }
    }

    /// Replace the queue's current list. `PUT /trash` calls this with the
    /// posted JSON body.
    pub async fn replace(&self, items: Vec<TrashListItem>) {
        self.queue.replace(items).await;
    }

    pub async fn drain_once(&self) -> TrashReport {
        let mut report = TrashReport::default();

        while let Some(item) = self.queue.next().await {
            match self.process_one(&item).await {
                Ok(n) if n > 0 => report.trashed += 1,
                _ => report.skipped += 1,
            }
        }

        report
    }

    async fn process_one(&self, item: &TrashListItem) -> Result<usize, KeepError> {
        let loc = keep_types::parse(&item.locator).map_err(|e| KeepError::BadRequest(e.to_string()))?;
        let block_mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(item.block_mtime.max(0) as u64);
        Ok(self.manager.trash_everywhere(&loc, block_mtime).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryVolume;
    use crate::domain::SystemTimeSource;
    use crate::ports::outbound::VolumeBackend;
    use keep_types::parse;

    fn manager_with_block(hash: &str, mtime: SystemTime) -> (Arc<VolumeManager>, Arc<dyn VolumeBackend>) {
        let vol: Arc<dyn VolumeBackend> = Arc::new(MemoryVolume::new("vol0", true, Arc::new(crate::domain::FakeTimeSource(mtime))));
        let loc = parse(hash).unwrap();
        (Arc::new(VolumeManager::new(vec![vol.clone()])), vol)
    }

    #[tokio::test]
    async fn trashes_block_with_matching_mtime() {
        let hash = keep_crypto::digest_hex(b"hello");
        let mtime = SystemTime::now() - Duration::from_secs(30 * 24 * 3600);
        let (manager, vol) = manager_with_block(&hash, mtime);
        let loc = parse(&hash).unwrap();
        vol.put(&loc, b"hello").await.unwrap();

        let queue = Arc::new(WorkQueue::new());
        let worker = TrashWorker::new(queue.clone(), manager.clone());
        let block_mtime = vol.mtime(&loc).await.unwrap();
        let mtime_unix = block_mtime
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;

        worker
            .replace(vec![TrashListItem {
                locator: hash,
                block_mtime: mtime_unix,
            }])
            .await;

        let report = worker.drain_once().await;
        assert_eq!(report.trashed, 1);
        assert_eq!(report.skipped, 0);
    }

    #[tokio::test]
    async fn skips_block_whose_mtime_has_moved_on() {
        let hash = keep_crypto::digest_hex(b"hello");
        let mtime = SystemTime::now();
        let (manager, vol) = manager_with_block(&hash, mtime);
        let loc = parse(&hash).unwrap();
        vol.put(&loc, b"hello").await.unwrap();

        let queue = Arc::new(WorkQueue::new());
        let worker = TrashWorker::new(queue.clone(), manager.clone());

        worker
            .replace(vec![TrashListItem {
                locator: hash,
                block_mtime: 1, // stale: doesn't match the block's actual mtime
            }])
            .await;

        let report = worker.drain_once().await;
        assert_eq!(report.trashed, 0);
        assert_eq!(report.skipped, 1);
    }
}
