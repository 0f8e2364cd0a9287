//! # Error Types
//!
//! `KeepError` is the single error enum shared by every crate in the
//! workspace; `keep-api` maps each variant to an HTTP status once, at the
//! edge, so nothing downstream needs to know about status codes.

use thiserror::Error;

/// All of the ways a Keep operation can fail.
#[derive(Debug, Error)]
pub enum KeepError {
    /// The request was structurally invalid (bad locator, bad header, ...).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// No valid credentials were presented where they were required.
    #[error("unauthorized")]
    Unauthorized,

    /// Credentials were presented but do not grant the requested operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The requested block does not exist on any reachable volume.
    #[error("not found: {0}")]
    NotFound(String),

    /// The digest of the bytes received did not match the locator's hash.
    #[error("hash mismatch: expected {expected}, got {actual}")]
    RequestHashMismatch { expected: String, actual: String },

    /// The operation is disabled on this service (e.g. deletion with
    /// `-never-delete`).
    #[error("method disabled: {0}")]
    MethodDisabled(String),

    /// A `Content-Length` (or equivalent size hint) was required but
    /// missing.
    #[error("size required")]
    SizeRequired,

    /// The block exceeds `MAX_BLOCK_SIZE`.
    #[error("block too long: {size} bytes exceeds the {limit} byte ceiling")]
    TooLong { size: u64, limit: u64 },

    /// Two different byte sequences were submitted under the same hash.
    #[error("hash collision for {0}")]
    Collision(String),

    /// A volume reported that it could not produce a valid digest for this
    /// block (distinct from `NotFound`: the bytes exist but are suspect).
    #[error("disk hash error for {0}")]
    DiskHashError(String),

    /// No writable volume had room for the block.
    #[error("all writable volumes are full")]
    Full,

    /// A replicated `Put` could not reach its requested replica count.
    #[error("insufficient replicas: wanted {wanted}, stored {stored}")]
    InsufficientReplicas { wanted: u32, stored: u32 },

    /// A quarantined or corrupted block was read back with a bad checksum.
    #[error("bad checksum for {0}")]
    BadChecksum(String),

    /// An underlying I/O failure not covered by a more specific variant.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl KeepError {
    /// Whether retrying the same operation against a different volume or
    /// service might succeed, as opposed to the error being inherent to the
    /// request itself.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            KeepError::Full | KeepError::DiskHashError(_) | KeepError::Io(_)
        )
    }
}
