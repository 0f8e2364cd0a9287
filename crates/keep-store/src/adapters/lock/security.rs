//! Helpers for diagnosing pid-file contention. Unlike a database lock,
//! keepstore's pid-file flock does not retry or clean up stale locks on its
//! own (§5: "pid-file flock is non-blocking (immediate fatal on
//! contention)") — these exist only to make the resulting error message
//! useful.

/// Whether a process with the given PID is still running.
pub fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        std::path::Path::new(&format!("/proc/{pid}")).exists()
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_running() {
        assert!(is_process_running(std::process::id()));
    }
}
