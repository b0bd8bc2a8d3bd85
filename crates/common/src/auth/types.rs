//! Token data structures

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::jwt::decode_expiry;

/// Current credentials held by the lifecycle manager
///
/// `access_token_expires_at` is derived from the access token's `exp` claim
/// and is `None` whenever the access token is absent or undecodable.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TokenPair {
    access_token: Option<String>,
    refresh_token: Option<String>,
    access_token_expires_at: Option<DateTime<Utc>>,
}

impl TokenPair {
    /// Build a pair, decoding the access token's expiry.
    #[must_use]
    pub fn new(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        let access_token_expires_at = access_token.as_deref().and_then(decode_expiry);
        Self { access_token, refresh_token, access_token_expires_at }
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    #[must_use]
    pub fn access_token_expires_at(&self) -> Option<DateTime<Utc>> {
        self.access_token_expires_at
    }

    /// Whether a refresh is due at `now_ms` given the threshold.
    ///
    /// Requires both tokens. An unknown expiry always counts as due;
    /// otherwise due once the remaining lifetime is at most `threshold_ms`.
    #[must_use]
    pub fn needs_refresh(&self, now_ms: i64, threshold_ms: i64) -> bool {
        if self.access_token.is_none() || self.refresh_token.is_none() {
            return false;
        }
        match self.access_token_expires_at {
            None => true,
            Some(expires_at) => expires_at.timestamp_millis().saturating_sub(now_ms) <= threshold_ms,
        }
    }

    /// Public view of the pair handed to listeners.
    #[must_use]
    pub fn to_change(&self) -> TokenChange {
        TokenChange {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("access_token_expires_at", &self.access_token_expires_at)
            .finish()
    }
}

/// Payload delivered to the change listener
#[derive(Clone, Default, PartialEq, Eq)]
pub struct TokenChange {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl std::fmt::Debug for TokenChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenChange")
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

/// How [`set_tokens`](super::TokenLifecycleManager::set_tokens) treats the
/// stored refresh token
#[derive(Clone, Default, PartialEq, Eq)]
pub enum RefreshTokenUpdate {
    /// Not provided; keep the stored value unless `overwrite_refresh` is set
    #[default]
    Unchanged,
    /// Explicitly clear the stored refresh token
    Cleared,
    /// Store this refresh token
    Replace(String),
}

impl RefreshTokenUpdate {
    /// Resolve the refresh token that should be stored next.
    #[must_use]
    pub fn resolve(self, current: Option<&str>, overwrite_refresh: bool) -> Option<String> {
        match self {
            Self::Replace(token) => Some(token),
            Self::Cleared => None,
            Self::Unchanged if overwrite_refresh => None,
            Self::Unchanged => current.map(str::to_string),
        }
    }
}

impl From<Option<String>> for RefreshTokenUpdate {
    /// `Some` replaces, `None` means "not provided".
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Unchanged, Self::Replace)
    }
}

impl std::fmt::Debug for RefreshTokenUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unchanged => f.write_str("Unchanged"),
            Self::Cleared => f.write_str("Cleared"),
            Self::Replace(_) => f.write_str("Replace([REDACTED])"),
        }
    }
}

/// Options for [`set_tokens`](super::TokenLifecycleManager::set_tokens)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetTokensOptions {
    /// Adopt the refresh value even when it was not provided (clearing it)
    pub overwrite_refresh: bool,
    /// Fire the change listener if anything changed
    pub notify: bool,
}

impl SetTokensOptions {
    /// Options used when restoring persisted tokens: nothing is re-persisted.
    #[must_use]
    pub const fn silent() -> Self {
        Self { overwrite_refresh: false, notify: false }
    }

    #[must_use]
    pub const fn overwrite_refresh(mut self, overwrite: bool) -> Self {
        self.overwrite_refresh = overwrite;
        self
    }
}

impl Default for SetTokensOptions {
    fn default() -> Self {
        Self { overwrite_refresh: false, notify: true }
    }
}

/// Successful refresh endpoint response
///
/// `refresh` is only present when the server rotated the refresh token.
#[derive(Clone, PartialEq, Eq)]
pub struct RefreshedTokens {
    pub access: String,
    pub refresh: Option<String>,
}

impl std::fmt::Debug for RefreshedTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshedTokens")
            .field("access", &"[REDACTED]")
            .field("rotated_refresh", &self.refresh.is_some())
            .finish()
    }
}

/// Persisted token record
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl StoredTokens {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

impl From<&TokenChange> for StoredTokens {
    fn from(change: &TokenChange) -> Self {
        Self {
            access_token: change.access_token.clone(),
            refresh_token: change.refresh_token.clone(),
        }
    }
}

impl std::fmt::Debug for StoredTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTokens")
            .field("has_access_token", &self.access_token.is_some())
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}
