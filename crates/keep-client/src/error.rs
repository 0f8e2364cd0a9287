//! Errors surfaced by the fan-out client, distinct from [`keep_types::KeepError`]
//! because a handful of outcomes (`InsufficientReplicas`, `BadChecksum`) only
//! make sense from the client's side of the wire.

use thiserror::Error;

/// Everything a client-side `Get`/`Put` can fail with.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No probed service returned the block.
    #[error("block not found on any of {tried} probed service(s)")]
    NotFound { tried: usize },

    /// A service answered but the body's digest didn't match the requested
    /// hash. The bytes are surfaced to the caller but never cached.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    BadChecksum { expected: String, actual: String },

    /// A replicated `Put` exhausted every probed service without reaching
    /// `want_replicas`.
    #[error("insufficient replicas: wanted {wanted}, stored {stored}")]
    InsufficientReplicas { wanted: u32, stored: u32 },

    /// A service answered with a 4xx other than 404: a non-404 4xx
    /// aborts the whole operation rather than falling through to the
    /// next probe, since only a 404 is treated as "try elsewhere".
    #[error("service {url} rejected the request: HTTP {status}")]
    Rejected { url: String, status: u16 },

    /// No service directory entries were available to probe.
    #[error("no services in the directory")]
    NoServices,

    /// Transport-level failure (connect refused, timed out, TLS error...).
    #[error("transport error talking to {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The locator text returned by a service didn't parse.
    #[error("malformed locator from service: {0}")]
    BadLocator(#[from] keep_types::ParseError),
}
