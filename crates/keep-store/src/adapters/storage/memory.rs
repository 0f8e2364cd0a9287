//! In-memory volume backend: a test double standing in for either concrete
//! backend wherever a test just needs *some* `VolumeBackend`.

use async_trait::async_trait;
use keep_types::KeepError;
use keep_types::Locator;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use crate::domain::{IndexEntry, TimeSource, VolumeStatus};
use crate::ports::outbound::VolumeBackend;

struct Entry {
    data: Vec<u8>,
    mtime: SystemTime,
    trashed: bool,
}

pub struct MemoryVolume {
    id: String,
    writable: bool,
    replication: u32,
    blocks: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn TimeSource>,
    full: Mutex<bool>,
}

impl MemoryVolume {
    pub fn new(id: impl Into<String>, writable: bool, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            id: id.into(),
            writable,
            replication: 1,
            blocks: Mutex::new(HashMap::new()),
            clock,
            full: Mutex::new(false),
        }
    }

    /// Test helper: force subsequent `put`s to report `Full`.
    pub fn set_full(&self, full: bool) {
        *self.full.lock().unwrap() = full;
    }

    /// Test helper: whether the block is present and not trashed.
    pub fn contains(&self, hash: &str) -> bool {
        self.blocks
            .lock()
            .unwrap()
            .get(hash)
            .map(|e| !e.trashed)
            .unwrap_or(false)
    }
}

#[async_trait]
impl VolumeBackend for MemoryVolume {
    fn id(&self) -> &str {
        &self.id
    }

    fn writable(&self) -> bool {
        self.writable
    }

    fn replication(&self) -> u32 {
        self.replication
    }

    async fn get(&self, loc: &Locator, buf: &mut Vec<u8>) -> Result<usize, KeepError> {
        let blocks = self.blocks.lock().unwrap();
        match blocks.get(&loc.hash) {
            Some(entry) if !entry.trashed => {
                buf.clear();
                buf.extend_from_slice(&entry.data);
                Ok(entry.data.len())
            }
            _ => Err(KeepError::NotFound(loc.hash.clone())),
        }
    }

    async fn put(&self, loc: &Locator, data: &[u8]) -> Result<(), KeepError> {
        if !self.writable {
            return Err(KeepError::MethodDisabled(format!("{} is read-only", self.id)));
        }
        if *self.full.lock().unwrap() {
            return Err(KeepError::Full);
        }

        let mut blocks = self.blocks.lock().unwrap();
        if let Some(existing) = blocks.get(&loc.hash) {
            if existing.data == data {
                return Ok(());
            }
            return Err(KeepError::Collision(loc.hash.clone()));
        }

        blocks.insert(
            loc.hash.clone(),
            Entry {
                data: data.to_vec(),
                mtime: self.clock.now(),
                trashed: false,
            },
        );
        Ok(())
    }

    async fn mtime(&self, loc: &Locator) -> Result<SystemTime, KeepError> {
        self.blocks
            .lock()
            .unwrap()
            .get(&loc.hash)
            .map(|e| e.mtime)
            .ok_or_else(|| KeepError::NotFound(loc.hash.clone()))
    }

    async fn touch(&self, loc: &Locator) -> Result<(), KeepError> {
        let mut blocks = self.blocks.lock().unwrap();
        let entry = blocks
            .get_mut(&loc.hash)
            .ok_or_else(|| KeepError::NotFound(loc.hash.clone()))?;
        entry.mtime = self.clock.now();
        Ok(())
    }

    async fn index(&self, prefix: &str) -> Result<Vec<IndexEntry>, KeepError> {
        let blocks = self.blocks.lock().unwrap();
        Ok(blocks
            .iter()
            .filter(|(hash, entry)| !entry.trashed && hash.starts_with(prefix))
            .map(|(hash, entry)| IndexEntry {
                locator: hash.clone(),
                mtime_unix: entry
                    .mtime
                    .duration_since(SystemTime::UNIX_EPOCH)
                    .map(|d| d.as_secs() as i64)
                    .unwrap_or(0),
            })
            .collect())
    }

    async fn trash(&self, loc: &Locator, block_mtime: SystemTime) -> Result<(), KeepError> {
        let mut blocks = self.blocks.lock().unwrap();
        let entry = blocks
            .get_mut(&loc.hash)
            .ok_or_else(|| KeepError::NotFound(loc.hash.clone()))?;
        if entry.mtime != block_mtime {
            return Err(KeepError::NotFound(loc.hash.clone()));
        }
        entry.trashed = true;
        Ok(())
    }

    async fn untrash(&self, loc: &Locator) -> Result<(), KeepError> {
        let mut blocks = self.blocks.lock().unwrap();
        let entry = blocks
            .get_mut(&loc.hash)
            .ok_or_else(|| KeepError::NotFound(loc.hash.clone()))?;
        entry.trashed = false;
        entry.mtime = self.clock.now();
        Ok(())
    }

    async fn empty_trash(&self) -> Result<(), KeepError> {
        self.blocks.lock().unwrap().retain(|_, e| !e.trashed);
        Ok(())
    }

    async fn is_full(&self) -> Result<bool, KeepError> {
        Ok(*self.full.lock().unwrap())
    }

    async fn status(&self) -> Result<VolumeStatus, KeepError> {
        let blocks = self.blocks.lock().unwrap();
        let used: u64 = blocks.values().map(|e| e.data.len() as u64).sum();
        Ok(VolumeStatus {
            id: self.id.clone(),
            bytes_free: if *self.full.lock().unwrap() { 0 } else { u64::MAX - used },
            bytes_used: used,
            writable: self.writable,
        })
    }
}
