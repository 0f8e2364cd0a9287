//! Service directory entries: the metadata the keep client uses to build
//! its probe-ordered list of keepstore endpoints.

use serde::{Deserialize, Serialize};

/// One keepstore service as advertised by the (externally supplied) service
/// directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDirectoryEntry {
    /// Stable identifier used as the salt in probe-order ranking.
    pub uuid: String,
    /// Base URL the client issues requests against, e.g. `http://host:25107`.
    pub root_url: String,
    /// Whether this service accepts writes.
    pub writable: bool,
    /// Whether this service is directly reachable (`true`) or must be
    /// proxied through (`false`).
    pub local_or_proxy: bool,
    /// Optional short region tag matching a `+K@region` locator hint.
    pub region: Option<String>,
}
