//! OS mount-table enumeration, used to auto-discover volume roots when no
//! `-volume` flag is given: "scan the OS mount table; for each entry whose
//! device starts with `/dev/` or equals `tmpfs`, if `<mount>/keep` is a
//! directory, register it. Copy the mount's `ro` flag into the per-volume
//! readonly setting."
//!
//! The OS mount table itself is out of scope (an external collaborator);
//! this module is the one adapter that reads it, behind the
//! [`MountSource`] seam so the auto-discovery rule is testable without a
//! real `/proc/mounts`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::ports::outbound::{MountCandidate, MountSource};

/// Reads Linux's `/proc/mounts`.
pub struct ProcMounts {
    mounts_path: PathBuf,
}

impl ProcMounts {
    pub fn new() -> Self {
        Self {
            mounts_path: PathBuf::from("/proc/mounts"),
        }
    }

    /// For tests: point at an arbitrary mounts-table-formatted file.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            mounts_path: path.into(),
        }
    }
}

impl Default for ProcMounts {
    fn default() -> Self {
        Self::new()
    }
}

impl MountSource for ProcMounts {
    fn discover(&self) -> std::io::Result<Vec<MountCandidate>> {
        let contents = fs::read_to_string(&self.mounts_path)?;
        Ok(parse_mounts(&contents))
    }
}

/// Parse `/proc/mounts`-formatted text (`device mountpoint fstype options
/// dump pass`, whitespace-separated, spaces in paths escaped as `\040`)
/// into volume candidates.
fn parse_mounts(contents: &str) -> Vec<MountCandidate> {
    let mut candidates = Vec::new();

    for line in contents.lines() {
        let mut fields = line.split_whitespace();
        let device = match fields.next() {
            Some(d) => d,
            None => continue,
        };
        let mount_point = match fields.next() {
            Some(m) => m,
            None => continue,
        };
        let options = fields.nth(1).unwrap_or("");

        if !(device.starts_with("/dev/") || device == "tmpfs") {
            continue;
        }

        let mount_point = mount_point.replace("\\040", " ");
        let keep_dir = Path::new(&mount_point).join("keep");
        if !keep_dir.is_dir() {
            continue;
        }

        let read_only = options.split(',').any(|opt| opt == "ro");

        candidates.push(MountCandidate {
            path: keep_dir,
            read_only,
        });
    }

    candidates
}
