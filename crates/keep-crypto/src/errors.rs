//! Crypto error types.

use thiserror::Error;

/// Errors surfaced by digest/signature helpers.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// A hex string did not decode to a valid digest.
    #[error("invalid hex digest: {0}")]
    InvalidDigest(#[from] hex::FromHexError),
}
