//! Concrete volume backends.
//!
//! - `unix` — local-filesystem volume, sharded by hash prefix.
//! - `s3` — S3-compatible bucket volume with the fixRace protocol
//!   (requires the `s3` feature).
//! - `memory` — in-memory test double implementing the full capability
//!   set.

pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;
pub mod unix;

pub use memory::MemoryVolume;
#[cfg(feature = "s3")]
pub use s3::{s3_client, S3Volume, S3VolumeConfig};
pub use unix::UnixVolume;
