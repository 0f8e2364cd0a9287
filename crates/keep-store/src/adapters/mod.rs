//! # Adapters
//!
//! Concrete implementations of the port traits: the two storage backends,
//! the pid-file lock, and OS mount-table discovery.

pub mod lock;
pub mod mounts;
pub mod storage;

pub use lock::{LockError, PidFile};
pub use mounts::ProcMounts;
pub use storage::{MemoryVolume, UnixVolume};
#[cfg(feature = "s3")]
pub use storage::{s3_client, S3Volume, S3VolumeConfig};
