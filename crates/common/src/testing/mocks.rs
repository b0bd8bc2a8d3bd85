//! Mock implementations of the auth collaborator traits

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::auth::{
    AuthHeaderSink, RefreshError, RefreshedTokens, StoredTokens, TokenRefresher, TokenStore,
    TokenStoreError,
};

type Outcome = Result<RefreshedTokens, RefreshError>;

#[derive(Default)]
struct RefresherState {
    scripted: Mutex<VecDeque<Outcome>>,
    fallback: Mutex<Option<Outcome>>,
    received: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

/// Scripted [`TokenRefresher`]
///
/// Scripted outcomes are consumed in order; once exhausted, the fallback
/// outcome (if any) repeats, otherwise calls fail transiently. Clones share
/// the script and counters.
///
/// ```
/// use heatmapp_common::testing::MockTokenRefresher;
///
/// let refresher = MockTokenRefresher::rejecting(401);
/// assert_eq!(refresher.call_count(), 0);
/// ```
#[derive(Clone, Default)]
pub struct MockTokenRefresher {
    state: Arc<RefresherState>,
    delay: Option<Duration>,
}

impl MockTokenRefresher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Always succeed with these tokens
    #[must_use]
    pub fn succeeding(access: &str, refresh: Option<&str>) -> Self {
        Self::with_fallback(Ok(tokens(access, refresh)))
    }

    /// Always reject the refresh token with `status`
    #[must_use]
    pub fn rejecting(status: u16) -> Self {
        Self::with_fallback(Err(RefreshError::Rejected { status }))
    }

    /// Always fail transiently
    #[must_use]
    pub fn failing(reason: &str) -> Self {
        Self::with_fallback(Err(RefreshError::Transient(reason.to_string())))
    }

    fn with_fallback(outcome: Outcome) -> Self {
        let mock = Self::new();
        *mock.state.fallback.lock() = Some(outcome);
        mock
    }

    /// Sleep this long inside every call
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_outcome(&self, outcome: Outcome) {
        self.state.scripted.lock().push_back(outcome);
    }

    pub fn push_success(&self, access: &str, refresh: Option<&str>) {
        self.push_outcome(Ok(tokens(access, refresh)));
    }

    #[must_use]
    pub fn call_count(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Refresh tokens passed to each call, in order
    #[must_use]
    pub fn received_tokens(&self) -> Vec<String> {
        self.state.received.lock().clone()
    }
}

fn tokens(access: &str, refresh: Option<&str>) -> RefreshedTokens {
    RefreshedTokens { access: access.to_string(), refresh: refresh.map(str::to_string) }
}

#[async_trait]
impl TokenRefresher for MockTokenRefresher {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError> {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
        self.state.received.lock().push(refresh_token.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.state.scripted.lock().pop_front();
        scripted.or_else(|| self.state.fallback.lock().clone()).unwrap_or_else(|| {
            Err(RefreshError::Transient("no scripted refresh outcome".to_string()))
        })
    }
}

/// Records every Authorization token pushed by the lifecycle manager
#[derive(Debug, Default)]
pub struct RecordingHeaderSink {
    history: Mutex<Vec<Option<String>>>,
}

impl RecordingHeaderSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Token currently installed (`None` if never set or cleared)
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.history.lock().last().cloned().flatten()
    }

    #[must_use]
    pub fn history(&self) -> Vec<Option<String>> {
        self.history.lock().clone()
    }
}

impl AuthHeaderSink for RecordingHeaderSink {
    fn set_access_token(&self, token: Option<&str>) {
        self.history.lock().push(token.map(str::to_string));
    }
}

/// In-memory [`TokenStore`] with failure injection
#[derive(Debug, Default)]
pub struct MockTokenStore {
    stored: Mutex<StoredTokens>,
    writes: Mutex<Vec<StoredTokens>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MockTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the store
    #[must_use]
    pub fn with_tokens(access_token: Option<&str>, refresh_token: Option<&str>) -> Self {
        let store = Self::new();
        *store.stored.lock() = StoredTokens {
            access_token: access_token.map(str::to_string),
            refresh_token: refresh_token.map(str::to_string),
        };
        store
    }

    #[must_use]
    pub fn stored(&self) -> StoredTokens {
        self.stored.lock().clone()
    }

    /// Every successful write, in order
    #[must_use]
    pub fn writes(&self) -> Vec<StoredTokens> {
        self.writes.lock().clone()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl TokenStore for MockTokenStore {
    fn read(&self) -> Result<StoredTokens, TokenStoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(TokenStoreError("simulated read failure".to_string()));
        }
        Ok(self.stored.lock().clone())
    }

    fn write(&self, tokens: &StoredTokens) -> Result<(), TokenStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TokenStoreError("simulated write failure".to_string()));
        }
        *self.stored.lock() = tokens.clone();
        self.writes.lock().push(tokens.clone());
        Ok(())
    }
}
