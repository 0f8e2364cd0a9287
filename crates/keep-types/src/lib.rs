//! # keep-types
//!
//! The wire-level data model shared by every other crate in the workspace:
//! the locator codec, permission-signature helpers, service directory
//! entries, volume configuration, and the `KeepError` enum every operation
//! returns.

pub mod capability;
pub mod directory;
pub mod errors;
pub mod locator;
pub mod volume;

pub use capability::{sign, verify, VerifyResult};
pub use directory::ServiceDirectoryEntry;
pub use errors::KeepError;
pub use locator::{parse, Hint, Locator, ParseError, HASH_HEX_LEN};
pub use volume::VolumeConfig;
