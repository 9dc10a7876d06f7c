// Time Provider Port (join order and wait estimates depend on it)

use std::sync::atomic::{AtomicI64, Ordering};

/// Time provider interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Get current time in milliseconds since epoch
    fn now_millis(&self) -> i64;
}

/// System time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Hand-driven clock for deterministic ordering in tests and replays
///
/// Every read advances the clock by `step` ms, so consecutive joins get
/// strictly increasing timestamps unless `step` is 0.
#[derive(Debug)]
pub struct ManualTimeProvider {
    now: AtomicI64,
    step: i64,
}

impl ManualTimeProvider {
    pub fn new(start_millis: i64, step: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
            step,
        }
    }

    /// Clock that never moves on its own
    pub fn frozen(at_millis: i64) -> Self {
        Self::new(at_millis, 0)
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now_millis(&self) -> i64 {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_steps() {
        let clock = ManualTimeProvider::new(1_000, 10);
        assert_eq!(clock.now_millis(), 1_000);
        assert_eq!(clock.now_millis(), 1_010);

        clock.advance(100);
        assert_eq!(clock.now_millis(), 1_120);
    }

    #[test]
    fn test_frozen_clock() {
        let clock = ManualTimeProvider::frozen(5_000);
        assert_eq!(clock.now_millis(), 5_000);
        assert_eq!(clock.now_millis(), 5_000);

        clock.set(9_000);
        assert_eq!(clock.now_millis(), 9_000);
    }
}
