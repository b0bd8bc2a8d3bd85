//! Transport-independent core shared across Heatmapp crates.
//!
//! # Modules
//!
//! - [`auth`]: token pair, JWT expiry decoding and the token lifecycle
//!   manager that deduplicates concurrent refreshes
//! - [`time`]: clock abstraction used for expiry decisions
//! - `testing` (feature `test-utils`): mock collaborators

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod time;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "test-utils", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use auth::{
    AuthHeaderSink, ListenerHandle, RefreshError, RefreshTokenUpdate, RefreshedTokens,
    SetTokensOptions, StoredTokens, TokenChange, TokenLifecycleManager,
    TokenLifecycleManagerBuilder, TokenPair, TokenRefresher, TokenStore, TokenStoreError,
};
pub use time::{Clock, SystemClock};
