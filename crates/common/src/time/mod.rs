//! Time utilities

mod clock;

pub use clock::{Clock, SystemClock};
