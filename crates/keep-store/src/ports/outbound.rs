//! Driven ports: what a volume backend must provide, and what supplies
//! candidate volume roots at startup.
//!
//! The two concrete backends (Unix directory, S3 bucket) differ materially
//! — the S3 backend needs fixRace, the Unix backend does not — so this is
//! modeled as one trait covering the full capability set
//! `{Get, Put, Index, Mtime, Touch, Trash, Untrash, EmptyTrash, Status}`.
//! A backend for which a capability doesn't apply returns
//! `KeepError::MethodDisabled` from the default implementation; only the
//! operations a backend actually supports need overriding.

use async_trait::async_trait;
use keep_types::{KeepError, Locator};
use std::time::SystemTime;

use crate::domain::{IndexEntry, VolumeStatus};

/// A storage backend for content-addressed blocks.
#[async_trait]
pub trait VolumeBackend: Send + Sync {
    /// Stable identity string: root path or bucket name.
    fn id(&self) -> &str;

    /// Whether this volume currently accepts writes.
    fn writable(&self) -> bool;

    /// Replication factor this volume counts toward.
    fn replication(&self) -> u32;

    /// Read the block named by `loc` into `buf`, returning the number of
    /// bytes read. Implementations verify the digest while reading and
    /// return `KeepError::DiskHashError` (quarantining the block) on
    /// mismatch, distinct from `NotFound`.
    async fn get(&self, loc: &Locator, buf: &mut Vec<u8>) -> Result<usize, KeepError>;

    /// Store `data` under `loc`. Never overwrites a differing payload: if
    /// the target already exists and its digest matches, returns `Ok`; if
    /// it differs, returns `KeepError::Collision`.
    async fn put(&self, loc: &Locator, data: &[u8]) -> Result<(), KeepError>;

    /// Modification time of the stored block.
    async fn mtime(&self, loc: &Locator) -> Result<SystemTime, KeepError>;

    /// Reset the stored block's mtime to now. Used by fixRace and trash
    /// resurrection.
    async fn touch(&self, loc: &Locator) -> Result<(), KeepError>;

    /// Enumerate every block whose locator begins with `prefix`.
    async fn index(&self, prefix: &str) -> Result<Vec<IndexEntry>, KeepError>;

    /// Delete the block iff its current mtime equals `block_mtime` and the
    /// grace window (`mtime + blob_signature_ttl < now`) has elapsed.
    async fn trash(&self, loc: &Locator, block_mtime: SystemTime) -> Result<(), KeepError> {
        let _ = (loc, block_mtime);
        Err(KeepError::MethodDisabled(format!(
            "{} does not support Trash",
            self.id()
        )))
    }

    /// Reverse a pending trash (S3 only; the Unix backend deletes
    /// unconditionally once the grace window passes, so there's nothing to
    /// reverse).
    async fn untrash(&self, loc: &Locator) -> Result<(), KeepError> {
        let _ = loc;
        Err(KeepError::MethodDisabled(format!(
            "{} does not support Untrash",
            self.id()
        )))
    }

    /// Permanently remove blocks past their trash lifetime (S3 only).
    async fn empty_trash(&self) -> Result<(), KeepError> {
        Err(KeepError::MethodDisabled(format!(
            "{} does not support EmptyTrash",
            self.id()
        )))
    }

    /// Whether this volume currently has room for another block.
    async fn is_full(&self) -> Result<bool, KeepError>;

    /// Capacity and identity, for `GET /status.json`.
    async fn status(&self) -> Result<VolumeStatus, KeepError>;
}

/// One candidate volume root discovered from the OS mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountCandidate {
    /// The `<mount>/keep` directory to register as a volume root.
    pub path: std::path::PathBuf,
    /// Whether the mount was reported read-only.
    pub read_only: bool,
}

/// Supplies candidate volume directories when no `-volume` flag is given.
/// The concrete implementation (parsing `/proc/mounts`) lives in
/// `adapters::mounts`; out-of-scope collaborators (the real OS mount table)
/// are modeled only through this seam.
pub trait MountSource: Send + Sync {
    /// For each mount whose device starts with `/dev/` or equals `tmpfs`,
    /// if `<mount>/keep` is a directory, yield it.
    fn discover(&self) -> std::io::Result<Vec<MountCandidate>>;
}

/// What the pull worker uses to fetch a block from one of a pull item's
/// candidate servers. The keep client fan-out protocol that implements
/// this lives in the `keep-client` crate; the pull worker only depends on
/// this seam, so the storage engine doesn't need to know about HTTP or
/// service directories.
#[async_trait]
pub trait BlockFetcher: Send + Sync {
    /// Fetch `locator` from whichever of `servers` answers first,
    /// verifying its digest. Mirrors `keep-client`'s `Get`, configured for
    /// `want_replicas = 1` in proxy mode.
    async fn fetch(&self, locator: &str, servers: &[String]) -> Result<Vec<u8>, KeepError>;
}
