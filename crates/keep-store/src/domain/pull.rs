//! Accumulated outcome of one pull-worker pass, built up incrementally as
//! each queued item is processed.

use serde::Serialize;

/// One pull item that failed, kept for the log line / status report.
#[derive(Debug, Clone, Serialize)]
pub struct PullFailure {
    pub locator: String,
    pub reason: String,
}

/// Running tally of a pull worker's progress through its current list.
/// Errors are logged and the offending item dropped (§7: "the pull worker
/// drops items that fail terminally") — this struct is what gets logged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PullReport {
    pub fetched: u64,
    pub bytes_written: u64,
    pub failures: Vec<PullFailure>,
}

impl PullReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, bytes: u64) {
        self.fetched += 1;
        self.bytes_written += bytes;
    }

    pub fn record_failure(&mut self, locator: impl Into<String>, reason: impl Into<String>) {
        self.failures.push(PullFailure {
            locator: locator.into(),
            reason: reason.into(),
        });
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_successes_and_failures() {
        let mut report = PullReport::new();
        report.record_success(128);
        report.record_success(64);
        report.record_failure("deadbeef", "not found on any listed server");

        assert_eq!(report.fetched, 2);
        assert_eq!(report.bytes_written, 192);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].locator, "deadbeef");
    }
}
