//! Server-wide configuration: everything a handler or middleware needs
//! to know about how this keepstore process was started.

use std::net::SocketAddr;
use std::time::Duration;

/// Process-wide configuration, built once at startup from CLI flags
/// (`keepstore`'s job) and threaded into [`crate::state::AppState`].
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server listens on.
    pub listen: SocketAddr,
    /// Shared secret gating `DELETE`, `GET /index*`, `PUT /pull`, and
    /// `PUT /trash`. `None` disables every admin route (`401`).
    pub data_manager_token: Option<String>,
    /// Whether `GET`/`HEAD` on a locator must carry a valid, unexpired
    /// permission signature.
    pub enforce_permissions: bool,
    /// HMAC-SHA1 key backing both verification (when `enforce_permissions`
    /// is set) and the signature minted on a successful `Put`.
    pub blob_signing_key: Option<Vec<u8>>,
    /// Validity window for signatures this server mints.
    pub blob_signature_ttl: Duration,
    /// When set, `DELETE` is refused with `MethodDisabled` regardless of
    /// token.
    pub never_delete: bool,
    /// When set, `Put`/`Delete`/pull/trash are refused; the service only
    /// serves reads.
    pub readonly: bool,
    /// Counting-semaphore capacity for the buffer pool (number of 64 MiB
    /// buffers that may be checked out concurrently).
    pub max_buffers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:25107".parse().expect("static listen address parses"),
            data_manager_token: None,
            enforce_permissions: false,
            blob_signing_key: None,
            blob_signature_ttl: Duration::from_secs(1_209_600),
            never_delete: true,
            readonly: false,
            max_buffers: 128,
        }
    }
}
