//! Collaborator traits for the token lifecycle
//!
//! These traits let the lifecycle manager stay independent of the HTTP
//! transport and of the storage backend, and let tests substitute mocks.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{RefreshedTokens, StoredTokens};

/// Failure of a refresh network call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// The server rejected the refresh token itself (HTTP 400/401).
    /// The session cannot be recovered.
    #[error("refresh token rejected (HTTP {status})")]
    Rejected { status: u16 },

    /// Anything else: network failure, timeout, other status, bad body
    #[error("transient refresh failure: {0}")]
    Transient(String),
}

impl RefreshError {
    /// Whether this failure invalidates the stored credentials
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

/// Exchanges a refresh token for a new access token
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    /// Perform the refresh call
    ///
    /// # Arguments
    /// * `refresh_token` - Currently stored refresh token
    ///
    /// # Errors
    /// [`RefreshError::Rejected`] when the server refuses the refresh token,
    /// [`RefreshError::Transient`] for every other failure
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError>;
}

/// Receives the access token whenever it changes
///
/// Called while the lifecycle manager holds its state lock, so
/// implementations must not call back into the manager.
pub trait AuthHeaderSink: Send + Sync {
    /// `Some` installs `Authorization: Bearer <token>`, `None` removes it
    fn set_access_token(&self, token: Option<&str>);
}

/// Error type for token persistence
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("token store error: {0}")]
pub struct TokenStoreError(pub String);

/// Persistent storage for the token pair
pub trait TokenStore: Send + Sync {
    /// Load persisted tokens; an empty store yields empty tokens
    ///
    /// # Errors
    /// Returns error if the backend cannot be read or is corrupt
    fn read(&self) -> Result<StoredTokens, TokenStoreError>;

    /// Replace the persisted tokens
    ///
    /// # Errors
    /// Returns error if the backend cannot be written
    fn write(&self, tokens: &StoredTokens) -> Result<(), TokenStoreError>;
}
