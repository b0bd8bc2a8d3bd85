//! Access/refresh token lifecycle
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────┐
//! │ TokenLifecycleManager  │  owns the TokenPair + refresh state
//! └──────────┬─────────────┘
//!            │
//!            ├──► TokenRefresher   (network call to the refresh endpoint)
//!            ├──► AuthHeaderSink   (transport Authorization header)
//!            ├──► Clock            (expiry threshold checks)
//!            └──► listener         (persistence of committed changes)
//! ```
//!
//! Concurrent refresh requests join a single in-flight operation; see
//! [`TokenLifecycleManager::refresh`].

pub mod jwt;
pub mod token_manager;
pub mod traits;
pub mod types;

pub use jwt::decode_expiry;
pub use token_manager::{ListenerHandle, TokenLifecycleManager, TokenLifecycleManagerBuilder};
pub use traits::{AuthHeaderSink, RefreshError, TokenRefresher, TokenStore, TokenStoreError};
pub use types::{
    RefreshTokenUpdate, RefreshedTokens, SetTokensOptions, StoredTokens, TokenChange, TokenPair,
};
