//! # keep-store
//!
//! The volume abstraction and everything built directly on top of it:
//!
//! - `ports` — the `VolumeBackend`, `MountSource`, and `BlockFetcher` seams
//! - `adapters` — `UnixVolume`, `S3Volume` (behind the `s3` feature),
//!   `MemoryVolume`, the pid-file lock, and `/proc/mounts` discovery
//! - `domain` — wire-adjacent value types, the injectable clock, and the
//!   generic `WorkQueue<T>` the pull/trash workers drain
//! - `manager` — `VolumeManager`: round-robin writes, parallel-race reads
//! - `service` — the pull and trash background workers
//!
//! HTTP routing, capability signature enforcement, and the client fan-out
//! protocol live in `keep-api` and `keep-client`; this crate only knows
//! about volumes.

pub mod adapters;
pub mod domain;
pub mod manager;
pub mod ports;
pub mod service;

pub use domain::{IndexEntry, PullListItem, PullReport, TrashListItem, VolumeStatus, MAX_BLOCK_SIZE};
pub use manager::VolumeManager;
pub use ports::{BlockFetcher, MountCandidate, MountSource, VolumeBackend};
pub use service::{PullWorker, TrashReport, TrashWorker};
