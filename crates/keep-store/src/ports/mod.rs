//! # Ports Layer
//!
//! Driven ports: the trait seams the volume subsystem depends on but does
//! not implement itself.
//!
//! - `outbound` — `VolumeBackend` (what a backend must provide) and
//!   `MountSource` (OS mount-table discovery, an external collaborator —
//!   only its interface lives here).

pub mod outbound;

pub use outbound::{BlockFetcher, MountCandidate, MountSource, VolumeBackend};
