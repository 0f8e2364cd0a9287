//! # PID file lock
//!
//! Uses `fs2` for cross-platform exclusive file locking (flock on Unix,
//! LockFile on Windows). Acquisition is **non-blocking**: keepstore's
//! `-pid` flag takes an exclusive flock once at startup and fails
//! immediately on contention, rather than waiting — a second instance
//! pointed at the same pid file is a startup misconfiguration, not a
//! transient condition to retry through.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;

use super::security::is_process_running;

/// Errors acquiring the pid-file lock.
#[derive(Debug)]
pub enum LockError {
    /// The lock file could not be created or opened.
    CreateFailed(io::Error),
    /// Another process already holds the lock.
    AlreadyLocked { pid: Option<u32>, path: PathBuf },
    /// The lock was acquired but the pid could not be written.
    WriteFailed(io::Error),
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockError::CreateFailed(e) => write!(f, "failed to create pid file: {e}"),
            LockError::AlreadyLocked { pid, path } => match pid {
                Some(pid) if is_process_running(*pid) => {
                    write!(f, "keepstore already running as pid {pid} ({})", path.display())
                }
                Some(pid) => write!(
                    f,
                    "pid file {} is locked by pid {pid}, which no longer appears to be running",
                    path.display()
                ),
                None => write!(f, "pid file {} is locked by another process", path.display()),
            },
            LockError::WriteFailed(e) => write!(f, "failed to write pid file: {e}"),
        }
    }
}

impl std::error::Error for LockError {}

/// An exclusive, non-blocking lock on a pid file.
///
/// Acquired once at startup via [`PidFile::acquire`]; released when dropped.
pub struct PidFile {
    file: File,
    path: PathBuf,
    pid: u32,
}

impl PidFile {
    /// Attempt to acquire the lock exactly once. Returns
    /// `LockError::AlreadyLocked` immediately if another process holds it —
    /// there is no retry loop.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)
            .map_err(LockError::CreateFailed)?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                let pid = std::process::id();
                let mut file = file;
                file.set_len(0).map_err(LockError::WriteFailed)?;
                writeln!(file, "{pid}").map_err(LockError::WriteFailed)?;
                file.sync_all().map_err(LockError::WriteFailed)?;
                Ok(Self {
                    file,
                    path: path.to_path_buf(),
                    pid,
                })
            }
            Err(_) => Err(LockError::AlreadyLocked {
                pid: read_existing_pid(path),
                path: path.to_path_buf(),
            }),
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_existing_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        let _ = std::fs::remove_file(&self.path);
    }
}
