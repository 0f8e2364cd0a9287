//! # Domain Layer
//!
//! Pure logic for the volume subsystem: the value types every backend
//! speaks in, the injectable clock, the pull-worker report accumulator, and
//! the generic pull/trash work queue.
//!
//! ## Modules
//!
//! - `entities` — `IndexEntry`, `VolumeStatus`, pull/trash list items
//! - `time` — `TimeSource` for testable mtime/race-window arithmetic
//! - `queue` — `WorkQueue<T>`, the `Idle -> Draining(list)` state machine
//! - `pull` — `PullReport`, the pull worker's per-pass accumulator

pub mod entities;
pub mod pull;
pub mod queue;
pub mod time;

pub use entities::{IndexEntry, PullListItem, TrashListItem, VolumeStatus, MAX_BLOCK_SIZE};
pub use pull::{PullFailure, PullReport};
pub use queue::{QueueState, WorkQueue};
pub use time::{FakeTimeSource, SystemTimeSource, TimeSource};
