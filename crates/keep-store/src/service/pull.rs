//! The pull worker: drains the pull work queue, fetching each listed block
//! from a remote server and committing it to a local volume.

use std::sync::Arc;

use crate::domain::{PullListItem, PullReport, WorkQueue};
use crate::manager::VolumeManager;
use crate::ports::outbound::BlockFetcher;

pub struct PullWorker {
    queue: Arc<WorkQueue<PullListItem>>,
    manager: Arc<VolumeManager>,
    fetcher: Arc<dyn BlockFetcher>,
}

impl PullWorker {
    pub fn new(
        queue: Arc<WorkQueue<PullListItem>>,
        manager: Arc<VolumeManager>,
        fetcher: Arc<dyn BlockFetcher>,
    ) -> Self {
        Self { queue, manager, fetcher }
    }

    /// Replace the queue's current list. `PUT /pull` calls this with the
    /// posted JSON body.
    pub async fn replace(&self, items: Vec<PullListItem>) {
        self.queue.replace(items).await;
    }

    /// Process every item currently queued, stopping when the queue is
    /// empty (a concurrent `replace` simply changes what `next()` yields
    /// next; already-dequeued items still run to completion).
    pub async fn drain_once(&self) -> PullReport {
        let mut report = PullReport::new();

        while let Some(item) = self.queue.next().await {
            match self.process_one(&item).await {
                Ok(bytes) => report.record_success(bytes as u64),
                Err(reason) => report.record_failure(item.locator.clone(), reason),
            }
        }

        report
    }

    async fn process_one(&self, item: &PullListItem) -> Result<usize, String> {
        let loc = keep_types::parse(
            item.locator
                .split('+')
                .next()
                .unwrap_or(&item.locator),
        )
        .map_err(|e| e.to_string())?;

        let data = self
            .fetcher
            .fetch(&item.locator, &item.servers)
            .await
            .map_err(|e| e.to_string())?;

        self.manager
            .put(&loc, &data)
            .await
            .map_err(|e| e.to_string())?;

        Ok(data.len())
    }
}
