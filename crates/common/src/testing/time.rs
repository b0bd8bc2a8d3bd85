//! Controllable clock for deterministic expiry tests
//!
//! ```ignore
//! use std::time::{Duration, UNIX_EPOCH};
//!
//! use heatmapp_common::testing::MockClock;
//! use heatmapp_common::time::Clock;
//!
//! let clock = MockClock::at(UNIX_EPOCH + Duration::from_secs(10));
//! clock.advance(Duration::from_millis(500));
//! assert_eq!(clock.millis_since_epoch(), 10_500);
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use parking_lot::Mutex;

use crate::time::Clock;

/// Mock clock that only moves when told to
#[derive(Debug, Clone)]
pub struct MockClock {
    base_system_time: SystemTime,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Start at the current real time
    #[must_use]
    pub fn new() -> Self {
        Self::at(SystemTime::now())
    }

    /// Start at a fixed wall-clock time
    #[must_use]
    pub fn at(system_time: SystemTime) -> Self {
        Self {
            base_system_time: system_time,
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Simulate time passing without waiting
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Set the absolute offset from the starting time
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn system_time(&self) -> SystemTime {
        self.base_system_time + self.elapsed()
    }
}
