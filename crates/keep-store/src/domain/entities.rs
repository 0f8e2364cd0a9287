//! Core value types shared by every volume backend and the manager above
//! them.

use serde::{Deserialize, Serialize};

/// Maximum size of a block's payload: 64 MiB.
pub const MAX_BLOCK_SIZE: u64 = 64 * 1024 * 1024;

/// One line of an `Index` stream: a bare locator (hash, and size hint if the
/// backend tracks one) plus the block's mtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// `<hash>` or `<hash>+<size>`, exactly as it should appear on the wire.
    pub locator: String,
    /// Unix seconds.
    pub mtime_unix: i64,
}

impl std::fmt::Display for IndexEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.locator, self.mtime_unix)
    }
}

/// A volume's self-reported capacity, returned by `GET /status.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeStatus {
    /// Stable identity string (root path or bucket name).
    pub id: String,
    /// Bytes free, as last measured.
    pub bytes_free: u64,
    /// Bytes used, as last measured (best-effort; S3 backends may not know
    /// this precisely).
    pub bytes_used: u64,
    /// Whether this volume currently accepts writes.
    pub writable: bool,
}

/// One item of a posted pull list: a block to fetch from one of `servers`
/// and commit to a local volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullListItem {
    /// The locator to fetch, hints and all.
    pub locator: String,
    /// Candidate service root URLs to fetch it from, in the order to try
    /// them.
    pub servers: Vec<String>,
}

/// One item of a posted trash list: a block to delete, guarded by the mtime
/// the policy engine observed when it decided to trash it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrashListItem {
    /// The locator to trash.
    pub locator: String,
    /// The mtime the block must still carry for the delete to proceed.
    pub block_mtime: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_entry_formats_as_locator_space_mtime() {
        let entry = IndexEntry {
            locator: "acbd18db4cc2f85cedef654fccc4a4d8+3".to_string(),
            mtime_unix: 1_700_000_000,
        };
        assert_eq!(
            entry.to_string(),
            "acbd18db4cc2f85cedef654fccc4a4d8+3 1700000000"
        );
    }
}
