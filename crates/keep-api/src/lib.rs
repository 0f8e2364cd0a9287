//! # keep-api
//!
//! The keepstore HTTP surface: block get/put/delete, the index stream,
//! the pull/trash admin routes, `GET /status.json`, the 64 MiB buffer
//! pool, and the capability/data-manager-token auth layer everything
//! above sits behind.
//!
//! The wire protocol and storage engine live in `keep-types` and
//! `keep-store`; this crate only wires them to HTTP.
//!
//! ```text
//! Request -> KeepAuthLayer (capability / data-manager-token check)
//!         -> buffer pool checkout (skipped for HEAD/DELETE/index)
//!         -> handler (VolumeManager / PullWorker / TrashWorker)
//!         -> ApiError -> HTTP status
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod buffer_pool;
pub mod domain;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod service;
pub mod state;
mod util;

pub use buffer_pool::{BufferPermit, BufferPool};
pub use domain::config::ServerConfig;
pub use domain::error::ApiError;
pub use middleware::{KeepAuthConfig, KeepAuthLayer};
pub use router::build_router;
pub use service::{KeepstoreService, ServiceError};
pub use state::AppState;

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
