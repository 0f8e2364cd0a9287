//! The volume manager: holds the configured volume set, picks a writable
//! volume round-robin, and fans reads out to every readable volume in
//! parallel.

use keep_types::{KeepError, Locator};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::domain::VolumeStatus;
use crate::ports::outbound::VolumeBackend;

/// Holds the process-wide volume set. One `VolumeManager` is constructed at
/// startup and shared (via `Arc`) across every request handler and
/// background worker — there is no hidden global.
pub struct VolumeManager {
    volumes: Vec<Arc<dyn VolumeBackend>>,
    /// Atomically advanced on every `next_writable()` call.
    cursor: AtomicUsize,
    quitting: AtomicBool,
}

impl VolumeManager {
    pub fn new(volumes: Vec<Arc<dyn VolumeBackend>>) -> Self {
        Self {
            volumes,
            cursor: AtomicUsize::new(0),
            quitting: AtomicBool::new(false),
        }
    }

    /// All volumes, in registration order.
    pub fn all_readable(&self) -> &[Arc<dyn VolumeBackend>] {
        &self.volumes
    }

    fn writable_volumes(&self) -> Vec<&Arc<dyn VolumeBackend>> {
        self.volumes.iter().filter(|v| v.writable()).collect()
    }

    /// The next writable volume in round-robin order, or `None` if there
    /// are no writable volumes at all.
    pub fn next_writable(&self) -> Option<Arc<dyn VolumeBackend>> {
        let writable = self.writable_volumes();
        if writable.is_empty() {
            return None;
        }
        let i = self.cursor.fetch_add(1, Ordering::SeqCst) % writable.len();
        Some(Arc::clone(writable[i]))
    }

    /// Read `loc` from every readable volume in parallel; the first
    /// success wins and the rest are dropped (cancelled).
    pub async fn get(&self, loc: &Locator) -> Result<Vec<u8>, KeepError> {
        if self.volumes.is_empty() {
            return Err(KeepError::NotFound(loc.hash.clone()));
        }

        let loc = loc.clone();
        let (tx, mut rx) = tokio::sync::mpsc::channel(self.volumes.len().max(1));

        let mut handles = Vec::with_capacity(self.volumes.len());
        for volume in self.volumes.clone() {
            let loc = loc.clone();
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let mut buf = Vec::new();
                let result = volume.get(&loc, &mut buf).await.map(|_| buf);
                let _ = tx.send(result).await;
            }));
        }
        drop(tx);

        let mut last_err = KeepError::NotFound(loc.hash.clone());
        while let Some(result) = rx.recv().await {
            match result {
                Ok(data) => {
                    for handle in &handles {
                        handle.abort();
                    }
                    return Ok(data);
                }
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }

    /// Write `data` under `loc`, trying writable volumes in round-robin
    /// order; a `Full`/read-only volume is skipped in favor of the next
    /// one, and the operation fails with `Full` once every writable volume
    /// has been tried.
    pub async fn put(&self, loc: &Locator, data: &[u8]) -> Result<Arc<dyn VolumeBackend>, KeepError> {
        let attempts = self.writable_volumes().len();
        if attempts == 0 {
            return Err(KeepError::Full);
        }

        let mut last_err = KeepError::Full;
        for _ in 0..attempts {
            let Some(volume) = self.next_writable() else {
                break;
            };
            match volume.put(loc, data).await {
                Ok(()) => return Ok(volume),
                Err(KeepError::Full) | Err(KeepError::MethodDisabled(_)) => continue,
                Err(e) => {
                    last_err = e;
                    continue;
                }
            }
        }
        Err(last_err)
    }

    /// Trash `loc` on every volume currently holding it at exactly
    /// `block_mtime`. Volumes whose stored mtime has moved on (or that
    /// don't have the block at all) are silently skipped — mtime-match is
    /// what protects against racing with a concurrent Put. Returns the
    /// number of volumes actually trashed.
    pub async fn trash_everywhere(&self, loc: &Locator, block_mtime: std::time::SystemTime) -> usize {
        let mut count = 0;
        for volume in &self.volumes {
            if volume.trash(loc, block_mtime).await.is_ok() {
                count += 1;
            }
        }
        count
    }

    /// Volume statuses for `GET /status.json`.
    pub async fn statuses(&self) -> Vec<VolumeStatus> {
        let mut out = Vec::with_capacity(self.volumes.len());
        for volume in &self.volumes {
            if let Ok(status) = volume.status().await {
                out.push(status);
            }
        }
        out
    }

    /// Signal serialized-I/O workers to drain and exit. Volume I/O here is
    /// serialized per-volume through an in-process lock rather than a
    /// detached worker thread, so there's nothing to join — this flips the
    /// flag new requests check before starting new work.
    pub fn quit(&self) {
        self.quitting.store(true, Ordering::SeqCst);
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::MemoryVolume;
    use crate::domain::SystemTimeSource;
    use keep_types::parse;

    fn loc_for(bytes: &[u8]) -> Locator {
        parse(&keep_crypto::digest_hex(bytes)).unwrap()
    }

    fn volumes(n: usize) -> Vec<Arc<dyn VolumeBackend>> {
        (0..n)
            .map(|i| -> Arc<dyn VolumeBackend> {
                Arc::new(MemoryVolume::new(format!("vol{i}"), true, Arc::new(SystemTimeSource)))
            })
            .collect()
    }

    #[test]
    fn next_writable_round_robins() {
        let manager = VolumeManager::new(volumes(3));
        let ids: Vec<String> = (0..6)
            .map(|_| manager.next_writable().unwrap().id().to_string())
            .collect();
        assert_eq!(ids, vec!["vol0", "vol1", "vol2", "vol0", "vol1", "vol2"]);
    }

    #[test]
    fn next_writable_none_when_no_volumes() {
        let manager = VolumeManager::new(Vec::new());
        assert!(manager.next_writable().is_none());
    }

    #[tokio::test]
    async fn put_chooses_a_writable_volume() {
        let manager = VolumeManager::new(volumes(2));
        let loc = loc_for(b"hello");
        let chosen = manager.put(&loc, b"hello").await.unwrap();
        assert!(chosen.id() == "vol0" || chosen.id() == "vol1");
    }

    #[tokio::test]
    async fn put_fails_full_when_no_writable_volumes() {
        let manager = VolumeManager::new(Vec::new());
        let loc = loc_for(b"hello");
        assert!(matches!(manager.put(&loc, b"hello").await, Err(KeepError::Full)));
    }

    #[tokio::test]
    async fn get_returns_first_success() {
        let vols = volumes(2);
        let loc = loc_for(b"hello");
        vols[1].put(&loc, b"hello").await.unwrap();
        let manager = VolumeManager::new(vols);
        let data = manager.get(&loc).await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn get_not_found_when_absent_everywhere() {
        let manager = VolumeManager::new(volumes(2));
        let loc = loc_for(b"missing");
        assert!(matches!(manager.get(&loc).await, Err(KeepError::NotFound(_))));
    }
}
