//! Clock abstraction
//!
//! Expiry decisions read the wall clock through [`Clock`] so tests can pin
//! "now" to an exact millisecond.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current time
pub trait Clock: Send + Sync {
    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Get milliseconds since UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        let millis = self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        u64::try_from(millis).unwrap_or(u64::MAX)
    }
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}
