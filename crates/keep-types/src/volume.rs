//! Volume-level configuration shared by every backend.

use std::time::Duration;

/// Configuration common to all volume backends, independent of whether the
/// backend is a directory on disk or an S3 bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeConfig {
    /// How long a trashed block is retained before it becomes eligible for
    /// permanent deletion.
    pub trash_lifetime: Duration,
    /// Default validity window for permission signatures minted against
    /// blocks on this volume.
    pub blob_signature_ttl: Duration,
    /// Replication factor this volume counts toward.
    pub replication: u32,
    /// Whether this volume accepts writes (`Put`, `Touch`, `Trash`, ...).
    pub writable: bool,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            trash_lifetime: Duration::from_secs(14 * 24 * 3600),
            blob_signature_ttl: Duration::from_secs(2 * 7 * 24 * 3600),
            replication: 1,
            writable: true,
        }
    }
}
