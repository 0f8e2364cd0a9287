//! Injectable wall-clock access, so trash/race-window arithmetic is
//! testable without sleeping.

use std::time::SystemTime;

/// A source of the current time. Volume backends depend on this trait
/// instead of calling `SystemTime::now()` directly so tests can supply a
/// fixed or stepped clock.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A fixed clock for tests.
#[derive(Debug, Clone, Copy)]
pub struct FakeTimeSource(pub SystemTime);

impl TimeSource for FakeTimeSource {
    fn now(&self) -> SystemTime {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_is_fixed() {
        let t = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000);
        let clock = FakeTimeSource(t);
        assert_eq!(clock.now(), t);
        assert_eq!(clock.now(), t);
    }
}
