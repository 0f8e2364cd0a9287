//! Local-filesystem volume backend.
//!
//! File layout under `root`: each block lives at `<root>/<hash[0:3]>/<hash>`.
//! The first-three-hex-char sharding keeps any one directory below ~4096
//! entries.

use async_trait::async_trait;
use keep_types::{KeepError, Locator};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::Mutex as AsyncMutex;

use crate::domain::{IndexEntry, TimeSource, VolumeStatus};
use crate::ports::outbound::VolumeBackend;

/// Free space below which a volume is considered full, independent of the
/// `full` sentinel.
const MIN_FREE_BYTES: u64 = 64 * 1024 * 1024;

/// How long the `<root>/full` sentinel is trusted before it's re-checked.
const FULL_SENTINEL_TTL: Duration = Duration::from_secs(3600);

pub struct UnixVolume {
    root: PathBuf,
    writable: bool,
    replication: u32,
    blob_signature_ttl: Duration,
    clock: Arc<dyn TimeSource>,
    /// When set, Get/Put are serialized through this mutex so the
    /// underlying I/O is single-threaded — caps disk concurrency on
    /// spinning media.
    io_lock: Option<AsyncMutex<()>>,
    full_since: AtomicBool,
}

impl UnixVolume {
    pub fn new(
        root: impl Into<PathBuf>,
        writable: bool,
        replication: u32,
        blob_signature_ttl: Duration,
        clock: Arc<dyn TimeSource>,
        serialize: bool,
    ) -> Self {
        Self {
            root: root.into(),
            writable,
            replication,
            blob_signature_ttl,
            clock,
            io_lock: if serialize {
                Some(AsyncMutex::new(()))
            } else {
                None
            },
            full_since: AtomicBool::new(false),
        }
    }

    fn shard_dir(&self, hash: &str) -> PathBuf {
        self.root.join(&hash[0..3])
    }

    fn block_path(&self, hash: &str) -> PathBuf {
        self.shard_dir(hash).join(hash)
    }

    fn full_sentinel(&self) -> PathBuf {
        self.root.join("full")
    }

    async fn serialize<F, T>(&self, f: F) -> T
    where
        F: std::future::Future<Output = T>,
    {
        match &self.io_lock {
            Some(lock) => {
                let _guard = lock.lock().await;
                f.await
            }
            None => f.await,
        }
    }

    fn read_and_verify(&self, loc: &Locator, path: &Path) -> Result<Vec<u8>, KeepError> {
        let data = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KeepError::NotFound(loc.hash.clone())
            } else {
                KeepError::Io(e)
            }
        })?;

        let actual = keep_crypto::digest_hex(&data);
        if actual != loc.hash {
            self.quarantine(path);
            return Err(KeepError::DiskHashError(loc.hash.clone()));
        }
        Ok(data)
    }

    fn quarantine(&self, path: &Path) {
        let ts = self
            .clock
            .now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let quarantined = path.with_file_name(format!(
            "{}.corrupt-{ts}",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("block")
        ));
        let _ = std::fs::rename(path, quarantined);
    }
}

#[async_trait]
impl VolumeBackend for UnixVolume {
    fn id(&self) -> &str {
        self.root.to_str().unwrap_or("<non-utf8 root>")
    }

    fn writable(&self) -> bool {
        self.writable
    }

    fn replication(&self) -> u32 {
        self.replication
    }

    async fn get(&self, loc: &Locator, buf: &mut Vec<u8>) -> Result<usize, KeepError> {
        let path = self.block_path(&loc.hash);
        self.serialize(async {
            let data = self.read_and_verify(loc, &path)?;
            let n = data.len();
            buf.clear();
            buf.extend_from_slice(&data);
            Ok(n)
        })
        .await
    }

    async fn put(&self, loc: &Locator, data: &[u8]) -> Result<(), KeepError> {
        if !self.writable {
            return Err(KeepError::MethodDisabled(format!(
                "{} is read-only",
                self.id()
            )));
        }
        if self.is_full().await? {
            return Err(KeepError::Full);
        }

        let shard_dir = self.shard_dir(&loc.hash);
        let final_path = shard_dir.join(&loc.hash);

        self.serialize(async {
            if final_path.exists() {
                return match self.read_and_verify(loc, &final_path) {
                    Ok(existing) if existing == data => Ok(()),
                    Ok(_) => Err(KeepError::Collision(loc.hash.clone())),
                    Err(KeepError::DiskHashError(_)) => Err(KeepError::Collision(loc.hash.clone())),
                    Err(e) => Err(e),
                };
            }

            std::fs::create_dir_all(&shard_dir)?;
            let tmp_path = shard_dir.join(format!(".{}.tmp-{}", loc.hash, std::process::id()));
            {
                let mut tmp = std::fs::File::create(&tmp_path)?;
                use std::io::Write;
                tmp.write_all(data)?;
                tmp.sync_all()?;
            }
            std::fs::rename(&tmp_path, &final_path)?;
            Ok(())
        })
        .await
    }

    async fn mtime(&self, loc: &Locator) -> Result<SystemTime, KeepError> {
        let path = self.block_path(&loc.hash);
        let meta = std::fs::metadata(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KeepError::NotFound(loc.hash.clone())
            } else {
                KeepError::Io(e)
            }
        })?;
        Ok(meta.modified()?)
    }

    async fn touch(&self, loc: &Locator) -> Result<(), KeepError> {
        let path = self.block_path(&loc.hash);
        let file = std::fs::OpenOptions::new().write(true).open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                KeepError::NotFound(loc.hash.clone())
            } else {
                KeepError::Io(e)
            }
        })?;
        file.set_modified(self.clock.now())?;
        Ok(())
    }

    async fn index(&self, prefix: &str) -> Result<Vec<IndexEntry>, KeepError> {
        let mut entries = Vec::new();
        let shard_dirs = match std::fs::read_dir(&self.root) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(KeepError::Io(e)),
        };

        for shard in shard_dirs.flatten() {
            let shard_name = shard.file_name();
            let shard_name = shard_name.to_string_lossy();
            if !shard.path().is_dir() {
                continue;
            }
            // Directories whose name is disjoint from `prefix` are skipped.
            if !prefix.is_empty() {
                let overlap = shard_name.len().min(prefix.len());
                if shard_name[..overlap] != prefix[..overlap] {
                    continue;
                }
            }

            for entry in std::fs::read_dir(shard.path())?.flatten() {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if name.len() != keep_types::HASH_HEX_LEN || !name.starts_with(prefix) {
                    continue;
                }
                if keep_types::parse(&name).is_err() {
                    continue;
                }
                let meta = entry.metadata()?;
                let mtime_unix = meta
                    .modified()?
                    .duration_since(SystemTime::UNIX_EPOCH)
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0);
                entries.push(IndexEntry {
                    locator: name.to_string(),
                    mtime_unix,
                });
            }
        }

        Ok(entries)
    }

    async fn trash(&self, loc: &Locator, block_mtime: SystemTime) -> Result<(), KeepError> {
        let path = self.block_path(&loc.hash);
        let current_mtime = self.mtime(loc).await?;
        if current_mtime != block_mtime {
            return Err(KeepError::NotFound(loc.hash.clone()));
        }
        let now = self.clock.now();
        let grace_elapsed = now
            .duration_since(current_mtime)
            .map(|age| age >= self.blob_signature_ttl)
            .unwrap_or(false);
        if !grace_elapsed {
            return Err(KeepError::NotFound(loc.hash.clone()));
        }
        std::fs::remove_file(&path)?;
        Ok(())
    }

    async fn is_full(&self) -> Result<bool, KeepError> {
        let sentinel = self.full_sentinel();
        if let Ok(meta) = std::fs::symlink_metadata(&sentinel) {
            let age_ok = meta
                .modified()
                .ok()
                .and_then(|m| self.clock.now().duration_since(m).ok())
                .map(|age| age < FULL_SENTINEL_TTL)
                .unwrap_or(false);
            if age_ok {
                self.full_since.store(true, Ordering::SeqCst);
                return Ok(true);
            }
        }

        let free = fs2::free_space(&self.root).map_err(KeepError::Io)?;
        let full = free < MIN_FREE_BYTES;
        if full {
            let ts = self
                .clock
                .now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let _ = std::fs::remove_file(&sentinel);
            #[cfg(unix)]
            let _ = std::os::unix::fs::symlink(ts.to_string(), &sentinel);
            self.full_since.store(true, Ordering::SeqCst);
        } else {
            self.full_since.store(false, Ordering::SeqCst);
        }
        Ok(full)
    }

    async fn status(&self) -> Result<VolumeStatus, KeepError> {
        let free = fs2::free_space(&self.root).map_err(KeepError::Io)?;
        let total = fs2::total_space(&self.root).map_err(KeepError::Io)?;
        Ok(VolumeStatus {
            id: self.id().to_string(),
            bytes_free: free,
            bytes_used: total.saturating_sub(free),
            writable: self.writable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SystemTimeSource;
    use keep_types::parse;
    use std::time::Duration;

    fn volume(root: &Path) -> UnixVolume {
        UnixVolume::new(root, true, 1, Duration::from_secs(0), Arc::new(SystemTimeSource), false)
    }

    fn loc_for(bytes: &[u8]) -> Locator {
        parse(&keep_crypto::digest_hex(bytes)).unwrap()
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let vol = volume(dir.path());
        let loc = loc_for(b"hello");

        vol.put(&loc, b"hello").await.unwrap();

        let mut buf = Vec::new();
        let n = vol.get(&loc, &mut buf).await.unwrap();
        assert_eq!(n, 5);
        assert_eq!(buf, b"hello");
    }

    #[tokio::test]
    async fn block_lands_in_sharded_path() {
        let dir = tempfile::tempdir().unwrap();
        let vol = volume(dir.path());
        let loc = loc_for(b"hello");

        vol.put(&loc, b"hello").await.unwrap();

        let expected = dir.path().join(&loc.hash[0..3]).join(&loc.hash);
        assert!(expected.exists());
    }

    #[tokio::test]
    async fn put_same_bytes_twice_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let vol = volume(dir.path());
        let loc = loc_for(b"hello");

        vol.put(&loc, b"hello").await.unwrap();
        vol.put(&loc, b"hello").await.unwrap();
    }

    #[tokio::test]
    async fn get_missing_block_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let vol = volume(dir.path());
        let loc = loc_for(b"nope");

        let mut buf = Vec::new();
        assert!(matches!(vol.get(&loc, &mut buf).await, Err(KeepError::NotFound(_))));
    }

    #[tokio::test]
    async fn corrupted_block_is_quarantined_on_get() {
        let dir = tempfile::tempdir().unwrap();
        let vol = volume(dir.path());
        let loc = loc_for(b"hello");

        vol.put(&loc, b"hello").await.unwrap();
        let path = vol.block_path(&loc.hash);
        std::fs::write(&path, b"tampered").unwrap();

        let mut buf = Vec::new();
        assert!(matches!(
            vol.get(&loc, &mut buf).await,
            Err(KeepError::DiskHashError(_))
        ));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn read_only_volume_refuses_put() {
        let dir = tempfile::tempdir().unwrap();
        let vol = UnixVolume::new(
            dir.path(),
            false,
            1,
            Duration::from_secs(0),
            Arc::new(SystemTimeSource),
            false,
        );
        let loc = loc_for(b"hello");
        assert!(matches!(
            vol.put(&loc, b"hello").await,
            Err(KeepError::MethodDisabled(_))
        ));
    }

    #[tokio::test]
    async fn trash_refuses_within_grace_window() {
        let dir = tempfile::tempdir().unwrap();
        let vol = UnixVolume::new(
            dir.path(),
            true,
            1,
            Duration::from_secs(3600),
            Arc::new(SystemTimeSource),
            false,
        );
        let loc = loc_for(b"hello");
        vol.put(&loc, b"hello").await.unwrap();
        let mtime = vol.mtime(&loc).await.unwrap();

        assert!(matches!(
            vol.trash(&loc, mtime).await,
            Err(KeepError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn trash_refuses_on_mtime_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let vol = volume(dir.path());
        let loc = loc_for(b"hello");
        vol.put(&loc, b"hello").await.unwrap();

        let wrong_mtime = SystemTime::now() - Duration::from_secs(1_000_000);
        assert!(matches!(
            vol.trash(&loc, wrong_mtime).await,
            Err(KeepError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn index_lists_matching_prefix_only() {
        let dir = tempfile::tempdir().unwrap();
        let vol = volume(dir.path());
        let a = loc_for(b"hello");
        let b = loc_for(b"world");
        vol.put(&a, b"hello").await.unwrap();
        vol.put(&b, b"world").await.unwrap();

        let all = vol.index("").await.unwrap();
        assert_eq!(all.len(), 2);

        let prefix = &a.hash[0..3];
        let matching = vol.index(prefix).await.unwrap();
        assert!(matching.iter().any(|e| e.locator == a.hash));
    }
}
