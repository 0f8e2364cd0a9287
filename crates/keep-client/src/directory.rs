//! The service directory: the set of keepstore endpoints a client fans
//! requests out across.
//!
//! The API metadata server that produces this set (source of service
//! directory and tokens) is explicitly out of scope, so it is modeled as
//! a seam — the same pattern `keep-store` uses for `MountSource` (OS
//! mount table) and `BlockFetcher` (the keep client itself, from the
//! volume manager's point of view).

use async_trait::async_trait;
use keep_types::ServiceDirectoryEntry;
use tokio::sync::RwLock;

/// Supplies the current set of keepstore services to probe.
#[async_trait]
pub trait ServiceDirectory: Send + Sync {
    /// All known services, in no particular order — `rank()` imposes the
    /// per-hash probe order.
    async fn entries(&self) -> Vec<ServiceDirectoryEntry>;
}

/// A directory whose contents are set once (or periodically replaced by
/// the embedding application calling [`StaticDirectory::replace`]) rather
/// than polled from a live metadata server. `keepstore`'s pull worker and
/// test suites use this directly; a production client embedder is
/// expected to poll the real metadata server and call `replace` on its
/// own schedule — periodic refresh is the host application's job, not
/// this crate's.
pub struct StaticDirectory {
    entries: RwLock<Vec<ServiceDirectoryEntry>>,
}

impl StaticDirectory {
    pub fn new(entries: Vec<ServiceDirectoryEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Replace the held set wholesale; entries are compared by `root_url`.
    pub async fn replace(&self, entries: Vec<ServiceDirectoryEntry>) {
        *self.entries.write().await = entries;
    }
}

#[async_trait]
impl ServiceDirectory for StaticDirectory {
    async fn entries(&self) -> Vec<ServiceDirectoryEntry> {
        self.entries.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(uuid: &str, url: &str) -> ServiceDirectoryEntry {
        ServiceDirectoryEntry {
            uuid: uuid.to_string(),
            root_url: url.to_string(),
            writable: true,
            local_or_proxy: true,
            region: None,
        }
    }

    #[tokio::test]
    async fn replace_swaps_the_full_set() {
        let dir = StaticDirectory::new(vec![entry("s1", "http://s1")]);
        assert_eq!(dir.entries().await.len(), 1);

        dir.replace(vec![entry("s2", "http://s2"), entry("s3", "http://s3")]).await;
        let entries = dir.entries().await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].uuid, "s2");
    }
}
