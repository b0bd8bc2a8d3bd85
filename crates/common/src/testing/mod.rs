//! Testing utilities and helpers
//!
//! - **[`mocks`]**: scripted token refresher, in-memory token store,
//!   recording header sink
//! - **[`time`]**: controllable clock
//! - **[`jwt`]**: unsigned JWT builders for expiry tests
//!
//! ## Usage
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use heatmapp_common::auth::TokenLifecycleManager;
//! use heatmapp_common::testing::{make_jwt, MockClock, MockTokenRefresher};
//!
//! let refresher = MockTokenRefresher::succeeding("new-access", None);
//! let manager = TokenLifecycleManager::builder(Arc::new(refresher.clone()))
//!     .clock(Arc::new(MockClock::new()))
//!     .build();
//! assert!(!manager.should_refresh());
//! # let _ = make_jwt(0);
//! ```

pub mod jwt;
pub mod mocks;
pub mod time;

pub use jwt::{make_jwt, make_jwt_expiring_in, make_jwt_with_payload};
pub use mocks::{MockTokenRefresher, MockTokenStore, RecordingHeaderSink};
pub use time::MockClock;
