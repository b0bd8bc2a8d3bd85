//! Token lifecycle manager with deduplicated refresh
//!
//! Owns the token pair and decides when a refresh is due:
//! - Access token expiry decoded from its JWT `exp` claim
//! - Refresh due when less than the threshold (default 60 s) remains
//! - At most one refresh call in flight; concurrent callers join it
//! - A single change listener notified after each committed change
//! - Refresh calls run on a spawned tokio task, so a tokio runtime is required

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::traits::{AuthHeaderSink, RefreshError, TokenRefresher};
use super::types::{RefreshTokenUpdate, RefreshedTokens, SetTokensOptions, TokenChange, TokenPair};
use crate::time::{Clock, SystemClock};

/// Default refresh threshold before access token expiry
pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(60);

/// Callback invoked with the new pair after a committed change
pub type TokenListener = Arc<dyn Fn(&TokenChange) + Send + Sync>;

type SharedRefresh = Shared<BoxFuture<'static, bool>>;
type RefreshOutcome = std::thread::Result<Result<RefreshedTokens, RefreshError>>;

/// Refresh concurrency gate
///
/// While `Refreshing`, every caller awaits the same shared operation.
/// The operation resets the state to `Idle` as it settles.
enum RefreshState {
    Idle,
    Refreshing(SharedRefresh),
}

struct RegisteredListener {
    id: u64,
    callback: TokenListener,
}

struct State {
    tokens: TokenPair,
    refresh: RefreshState,
    listener: Option<RegisteredListener>,
    next_listener_id: u64,
}

/// A committed change whose listener call is still owed
struct PendingNotification {
    listener: TokenListener,
    change: TokenChange,
}

impl PendingNotification {
    fn deliver(self) {
        let Self { listener, change } = self;
        if std::panic::catch_unwind(AssertUnwindSafe(|| listener(&change))).is_err() {
            warn!("Token change listener panicked");
        }
    }
}

/// Notifications waiting for delivery, in commit order
///
/// At most one thread drains the queue at a time; other committers leave
/// their entries to it instead of racing it to the listener.
#[derive(Default)]
struct NotificationQueue {
    pending: VecDeque<PendingNotification>,
    draining: bool,
}

struct Core {
    state: Mutex<State>,
    notifications: Mutex<NotificationQueue>,
    refresher: Arc<dyn TokenRefresher>,
    header_sink: Option<Arc<dyn AuthHeaderSink>>,
    clock: Arc<dyn Clock>,
    threshold_ms: i64,
}

impl Core {
    fn is_due(&self, tokens: &TokenPair) -> bool {
        let now_ms = i64::try_from(self.clock.millis_since_epoch()).unwrap_or(i64::MAX);
        tokens.needs_refresh(now_ms, self.threshold_ms)
    }

    /// Apply a token update under the state lock.
    ///
    /// The header sink is updated here so the transport never observes an
    /// uncommitted token. The listener call is queued while the state lock
    /// is still held and made later by [`Core::drain_notifications`].
    fn commit(
        &self,
        state: &mut State,
        access_token: Option<String>,
        refresh_token: RefreshTokenUpdate,
        options: SetTokensOptions,
    ) {
        let refresh_token = refresh_token.resolve(state.tokens.refresh_token(), options.overwrite_refresh);
        let next = TokenPair::new(access_token, refresh_token);

        let access_changed = next.access_token() != state.tokens.access_token();
        let changed = access_changed || next.refresh_token() != state.tokens.refresh_token();
        state.tokens = next;

        if access_changed {
            if let Some(sink) = &self.header_sink {
                sink.set_access_token(state.tokens.access_token());
            }
        }

        if !changed || !options.notify {
            return;
        }
        if let Some(registered) = &state.listener {
            self.notifications.lock().pending.push_back(PendingNotification {
                listener: Arc::clone(&registered.callback),
                change: state.tokens.to_change(),
            });
        }
    }

    /// Deliver queued notifications outside the state lock.
    ///
    /// Returns at once if another thread is already draining; that thread
    /// delivers whatever was queued behind it.
    fn drain_notifications(&self) {
        {
            let mut queue = self.notifications.lock();
            if queue.draining || queue.pending.is_empty() {
                return;
            }
            queue.draining = true;
        }

        loop {
            let next = {
                let mut queue = self.notifications.lock();
                let next = queue.pending.pop_front();
                if next.is_none() {
                    queue.draining = false;
                }
                next
            };
            match next {
                Some(pending) => pending.deliver(),
                None => return,
            }
        }
    }

    /// Apply the outcome of a refresh call started with `refresh_token`.
    fn settle(
        &self,
        state: &mut State,
        refresh_token: &str,
        outcome: RefreshOutcome,
    ) -> bool {
        if state.tokens.refresh_token() != Some(refresh_token) {
            debug!("Session changed while refreshing; discarding refresh result");
            return false;
        }

        match outcome {
            Ok(Ok(refreshed)) => {
                info!(rotated = refreshed.refresh.is_some(), "Access token refreshed");
                self.commit(
                    state,
                    Some(refreshed.access),
                    refreshed.refresh.into(),
                    SetTokensOptions::default(),
                );
                true
            }
            Ok(Err(RefreshError::Rejected { status })) => {
                warn!(status, "Refresh token rejected; clearing tokens");
                self.commit(state, None, RefreshTokenUpdate::Cleared, SetTokensOptions::default());
                false
            }
            Ok(Err(RefreshError::Transient(reason))) => {
                warn!(%reason, "Token refresh failed; keeping current tokens");
                false
            }
            Err(_) => {
                warn!("Token refresher panicked; keeping current tokens");
                false
            }
        }
    }

    async fn run_refresh(core: Arc<Self>, refresh_token: String) -> bool {
        debug!("Starting token refresh");
        let outcome = AssertUnwindSafe(core.refresher.refresh(&refresh_token)).catch_unwind().await;

        let refreshed = {
            let mut state = core.state.lock();
            state.refresh = RefreshState::Idle;
            core.settle(&mut state, &refresh_token, outcome)
        };

        core.drain_notifications();
        refreshed
    }
}

/// Owner of the access/refresh token pair
///
/// Cloning yields another handle to the same state.
///
/// # Example
///
/// ```no_run
/// # use std::sync::Arc;
/// # use heatmapp_common::auth::{TokenLifecycleManager, TokenRefresher};
/// # async fn run(refresher: Arc<dyn TokenRefresher>) {
/// let manager = TokenLifecycleManager::builder(refresher).build();
/// let _handle = manager.set_listener(|change| {
///     println!("tokens changed, access present: {}", change.access_token.is_some());
/// });
///
/// manager.ensure_fresh().await;
/// # }
/// ```
#[derive(Clone)]
pub struct TokenLifecycleManager {
    core: Arc<Core>,
}

impl TokenLifecycleManager {
    /// Create a manager with the system clock and no header sink
    #[must_use]
    pub fn new(refresher: Arc<dyn TokenRefresher>) -> Self {
        Self::builder(refresher).build()
    }

    #[must_use]
    pub fn builder(refresher: Arc<dyn TokenRefresher>) -> TokenLifecycleManagerBuilder {
        TokenLifecycleManagerBuilder::new(refresher)
    }

    /// Replace the stored tokens
    ///
    /// The access token is always replaced. The refresh token follows
    /// `refresh_token` (see [`RefreshTokenUpdate::resolve`]). The listener
    /// fires only if something changed and `options.notify` is set.
    ///
    /// Listener calls are made in commit order. When another thread is
    /// already notifying, this call returns before its own listener call
    /// has been made. Listeners must not block on the manager.
    ///
    /// # Arguments
    /// * `access_token` - New access token, `None` to clear
    /// * `refresh_token` - Refresh token update
    /// * `options` - Overwrite/notify behaviour
    pub fn set_tokens(
        &self,
        access_token: Option<String>,
        refresh_token: RefreshTokenUpdate,
        options: SetTokensOptions,
    ) {
        {
            let mut state = self.core.state.lock();
            self.core.commit(&mut state, access_token, refresh_token, options);
        }
        self.core.drain_notifications();
    }

    /// Clear both tokens and notify the listener
    pub fn clear_tokens(&self) {
        self.set_tokens(None, RefreshTokenUpdate::Cleared, SetTokensOptions::default());
    }

    /// Whether a refresh is due right now
    ///
    /// True only with both tokens present and either an unknown expiry or
    /// at most the threshold left before expiry.
    #[must_use]
    pub fn should_refresh(&self) -> bool {
        let state = self.core.state.lock();
        self.core.is_due(&state.tokens)
    }

    /// Best-effort pre-emptive refresh before sending a request
    ///
    /// Does nothing for anonymous callers. A failed refresh is ignored; it
    /// will surface as a 401 on the request itself.
    pub async fn ensure_fresh(&self) {
        if self.core.state.lock().tokens.access_token().is_none() {
            return;
        }
        let _ = self.refresh(false).await;
    }

    /// Refresh the access token, joining any refresh already in flight
    ///
    /// # Arguments
    /// * `force` - Skip the expiry threshold check (used after a 401)
    ///
    /// # Returns
    /// - `false` immediately when no refresh token is stored
    /// - `true` without network activity when not forced and not due
    /// - otherwise the outcome of the single in-flight refresh call, shared
    ///   by every concurrent caller
    ///
    /// The call runs on a spawned task and settles the tokens even if every
    /// caller stops waiting for it.
    pub async fn refresh(&self, force: bool) -> bool {
        let operation = {
            let mut state = self.core.state.lock();
            let Some(refresh_token) = state.tokens.refresh_token().map(str::to_string) else {
                debug!("No refresh token stored; skipping refresh");
                return false;
            };
            if !force && !self.core.is_due(&state.tokens) {
                return true;
            }

            match &state.refresh {
                RefreshState::Refreshing(operation) => {
                    debug!(force, "Joining in-flight token refresh");
                    operation.clone()
                }
                RefreshState::Idle => {
                    let task = tokio::spawn(Core::run_refresh(Arc::clone(&self.core), refresh_token));
                    let core = Arc::clone(&self.core);
                    let operation = async move {
                        task.await.unwrap_or_else(|err| {
                            warn!(error = %err, "Token refresh task did not complete");
                            core.state.lock().refresh = RefreshState::Idle;
                            false
                        })
                    }
                    .boxed()
                    .shared();
                    state.refresh = RefreshState::Refreshing(operation.clone());
                    operation
                }
            }
        };

        operation.await
    }

    /// Register the change listener, replacing any previous one
    pub fn set_listener<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&TokenChange) + Send + Sync + 'static,
    {
        let mut state = self.core.state.lock();
        state.next_listener_id += 1;
        let id = state.next_listener_id;
        state.listener = Some(RegisteredListener { id, callback: Arc::new(listener) });

        ListenerHandle { id, core: Arc::downgrade(&self.core) }
    }

    /// Remove whichever listener is registered
    pub fn clear_listener(&self) {
        self.core.state.lock().listener = None;
    }

    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.core.state.lock().tokens.access_token().map(str::to_string)
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.core.state.lock().tokens.refresh_token().map(str::to_string)
    }

    /// Snapshot of the current pair
    #[must_use]
    pub fn tokens(&self) -> TokenPair {
        self.core.state.lock().tokens.clone()
    }

    /// Whether a refresh call is currently in flight
    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        matches!(self.core.state.lock().refresh, RefreshState::Refreshing(_))
    }
}

impl std::fmt::Debug for TokenLifecycleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.core.state.lock();
        f.debug_struct("TokenLifecycleManager")
            .field("tokens", &state.tokens)
            .field("refreshing", &matches!(state.refresh, RefreshState::Refreshing(_)))
            .field("has_listener", &state.listener.is_some())
            .field("threshold_ms", &self.core.threshold_ms)
            .finish_non_exhaustive()
    }
}

/// Handle returned by [`TokenLifecycleManager::set_listener`]
///
/// Dropping the handle leaves the listener registered.
#[derive(Debug)]
pub struct ListenerHandle {
    id: u64,
    core: Weak<Core>,
}

impl ListenerHandle {
    /// Remove the listener if it is still the registered one
    ///
    /// Returns `true` if it was removed. A handle for a listener that has
    /// since been replaced never removes the newer one.
    pub fn unsubscribe(self) -> bool {
        let Some(core) = self.core.upgrade() else {
            return false;
        };
        let mut state = core.state.lock();
        match &state.listener {
            Some(registered) if registered.id == self.id => {
                state.listener = None;
                true
            }
            _ => false,
        }
    }
}

/// Builder for [`TokenLifecycleManager`]
pub struct TokenLifecycleManagerBuilder {
    refresher: Arc<dyn TokenRefresher>,
    header_sink: Option<Arc<dyn AuthHeaderSink>>,
    clock: Arc<dyn Clock>,
    threshold: Duration,
}

impl TokenLifecycleManagerBuilder {
    #[must_use]
    pub fn new(refresher: Arc<dyn TokenRefresher>) -> Self {
        Self {
            refresher,
            header_sink: None,
            clock: Arc::new(SystemClock),
            threshold: DEFAULT_REFRESH_THRESHOLD,
        }
    }

    /// Receiver of access token changes (usually the HTTP transport)
    #[must_use]
    pub fn header_sink(mut self, sink: Arc<dyn AuthHeaderSink>) -> Self {
        self.header_sink = Some(sink);
        self
    }

    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Remaining lifetime at which a refresh becomes due
    #[must_use]
    pub fn refresh_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub fn build(self) -> TokenLifecycleManager {
        let threshold_ms = i64::try_from(self.threshold.as_millis()).unwrap_or(i64::MAX);
        TokenLifecycleManager {
            core: Arc::new(Core {
                state: Mutex::new(State {
                    tokens: TokenPair::default(),
                    refresh: RefreshState::Idle,
                    listener: None,
                    next_listener_id: 0,
                }),
                notifications: Mutex::new(NotificationQueue::default()),
                refresher: self.refresher,
                header_sink: self.header_sink,
                clock: self.clock,
                threshold_ms,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::token_manager.
    use std::time::{SystemTime, UNIX_EPOCH};

    use async_trait::async_trait;

    use super::*;
    use crate::testing::{
        make_jwt, make_jwt_with_payload, MockClock, MockTokenRefresher, RecordingHeaderSink,
    };

    /// Fixed "now": 2023-11-14T22:13:20Z
    const NOW_SECS: u64 = 1_700_000_000;

    type Changes = Arc<Mutex<Vec<TokenChange>>>;

    fn clock() -> Arc<MockClock> {
        Arc::new(MockClock::at(UNIX_EPOCH + Duration::from_secs(NOW_SECS)))
    }

    fn jwt_expiring_in(secs: i64) -> String {
        make_jwt(NOW_SECS as i64 + secs)
    }

    fn manager_with(refresher: &MockTokenRefresher) -> (TokenLifecycleManager, Arc<MockClock>) {
        let clock = clock();
        let manager = TokenLifecycleManager::builder(Arc::new(refresher.clone()))
            .clock(clock.clone())
            .build();
        (manager, clock)
    }

    fn record_changes(manager: &TokenLifecycleManager) -> Changes {
        let changes: Changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        let _handle = manager.set_listener(move |change| sink.lock().push(change.clone()));
        changes
    }

    fn login(manager: &TokenLifecycleManager, access: String, refresh: &str) {
        manager.set_tokens(
            Some(access),
            RefreshTokenUpdate::Replace(refresh.to_string()),
            SetTokensOptions::silent(),
        );
    }

    /// Validates a fresh login is not immediately due for refresh.
    ///
    /// Assertions:
    /// - Access token expiring in an hour → `should_refresh()` is false
    #[test]
    fn fresh_login_does_not_need_refresh() {
        let (manager, _) = manager_with(&MockTokenRefresher::new());
        login(&manager, jwt_expiring_in(3600), "refresh-1");

        assert!(!manager.should_refresh());
    }

    /// Validates the 60 second threshold boundary against a pinned clock.
    ///
    /// Assertions:
    /// - Exactly `exp*1000 - 60000` ms → due
    /// - One millisecond earlier → not due
    /// - Past expiry → due
    #[test]
    fn threshold_boundary_follows_clock() {
        let (manager, clock) = manager_with(&MockTokenRefresher::new());
        let exp = NOW_SECS + 600;
        login(&manager, make_jwt(exp as i64), "refresh-1");

        let boundary_ms = exp * 1000 - 60_000;
        clock.set_elapsed(Duration::from_millis(boundary_ms - NOW_SECS * 1000 - 1));
        assert!(!manager.should_refresh());

        clock.advance(Duration::from_millis(1));
        assert!(manager.should_refresh());

        clock.advance(Duration::from_secs(3600));
        assert!(manager.should_refresh());
    }

    #[test]
    fn unknown_expiry_always_needs_refresh() {
        let (manager, _) = manager_with(&MockTokenRefresher::new());
        login(&manager, make_jwt_with_payload(r#"{"sub":"1"}"#), "refresh-1");

        assert!(manager.tokens().access_token_expires_at().is_none());
        assert!(manager.should_refresh());
    }

    #[test]
    fn no_refresh_needed_without_refresh_token() {
        let (manager, _) = manager_with(&MockTokenRefresher::new());
        manager.set_tokens(
            Some(jwt_expiring_in(-10)),
            RefreshTokenUpdate::Unchanged,
            SetTokensOptions::silent(),
        );

        assert!(!manager.should_refresh());
    }

    /// Validates `set_tokens` with identical values does not notify.
    ///
    /// Assertions:
    /// - First call notifies once
    /// - Repeating the same values does not notify again
    #[test]
    fn identical_set_tokens_does_not_notify() {
        let (manager, _) = manager_with(&MockTokenRefresher::new());
        let changes = record_changes(&manager);
        let access = jwt_expiring_in(3600);

        for _ in 0..3 {
            manager.set_tokens(
                Some(access.clone()),
                RefreshTokenUpdate::Replace("refresh-1".into()),
                SetTokensOptions::default(),
            );
        }

        assert_eq!(changes.lock().len(), 1);
    }

    #[test]
    fn silent_set_tokens_does_not_notify() {
        let (manager, _) = manager_with(&MockTokenRefresher::new());
        let changes = record_changes(&manager);

        login(&manager, jwt_expiring_in(3600), "refresh-1");

        assert!(changes.lock().is_empty());
        assert_eq!(manager.refresh_token().as_deref(), Some("refresh-1"));
    }

    #[test]
    fn unprovided_refresh_token_is_kept_unless_overwritten() {
        let (manager, _) = manager_with(&MockTokenRefresher::new());
        login(&manager, "access-1".into(), "refresh-1");

        manager.set_tokens(
            Some("access-2".into()),
            RefreshTokenUpdate::Unchanged,
            SetTokensOptions::default(),
        );
        assert_eq!(manager.refresh_token().as_deref(), Some("refresh-1"));

        manager.set_tokens(
            Some("access-3".into()),
            RefreshTokenUpdate::Unchanged,
            SetTokensOptions::default().overwrite_refresh(true),
        );
        assert_eq!(manager.access_token().as_deref(), Some("access-3"));
        assert_eq!(manager.refresh_token(), None);
    }

    #[test]
    fn header_sink_tracks_committed_access_token() {
        let sink = Arc::new(RecordingHeaderSink::new());
        let manager = TokenLifecycleManager::builder(Arc::new(MockTokenRefresher::new()))
            .header_sink(sink.clone())
            .clock(clock())
            .build();

        login(&manager, "access-1".into(), "refresh-1");
        // Refresh-only change leaves the header alone
        manager.set_tokens(
            Some("access-1".into()),
            RefreshTokenUpdate::Replace("refresh-2".into()),
            SetTokensOptions::default(),
        );
        manager.clear_tokens();

        assert_eq!(sink.history(), vec![Some("access-1".to_string()), None]);
        assert_eq!(sink.current(), None);
    }

    #[tokio::test]
    async fn refresh_without_refresh_token_returns_false() {
        let refresher = MockTokenRefresher::succeeding("new-access", None);
        let (manager, _) = manager_with(&refresher);
        manager.set_tokens(
            Some(jwt_expiring_in(-1)),
            RefreshTokenUpdate::Unchanged,
            SetTokensOptions::silent(),
        );

        assert!(!manager.refresh(true).await);
        assert_eq!(refresher.call_count(), 0);
    }

    #[tokio::test]
    async fn unforced_refresh_skips_network_when_not_due() {
        let refresher = MockTokenRefresher::succeeding("new-access", None);
        let (manager, _) = manager_with(&refresher);
        login(&manager, jwt_expiring_in(3600), "refresh-1");

        assert!(manager.refresh(false).await);
        assert_eq!(refresher.call_count(), 0);
    }

    #[tokio::test]
    async fn forced_refresh_ignores_threshold() {
        let refresher = MockTokenRefresher::succeeding("new-access", None);
        let (manager, _) = manager_with(&refresher);
        login(&manager, jwt_expiring_in(3600), "refresh-1");

        assert!(manager.refresh(true).await);
        assert_eq!(refresher.call_count(), 1);
        assert_eq!(refresher.received_tokens(), vec!["refresh-1".to_string()]);
        assert_eq!(manager.access_token().as_deref(), Some("new-access"));
    }

    /// Validates refresh token rotation is adopted only when returned.
    ///
    /// Assertions:
    /// - No rotated token → stored refresh token unchanged
    /// - Rotated token → stored refresh token replaced
    #[tokio::test]
    async fn rotation_adopted_only_when_present() {
        let refresher = MockTokenRefresher::new();
        refresher.push_success("access-2", None);
        refresher.push_success("access-3", Some("refresh-2"));
        let (manager, _) = manager_with(&refresher);
        login(&manager, jwt_expiring_in(10), "refresh-1");

        assert!(manager.refresh(true).await);
        assert_eq!(manager.refresh_token().as_deref(), Some("refresh-1"));

        assert!(manager.refresh(true).await);
        assert_eq!(manager.access_token().as_deref(), Some("access-3"));
        assert_eq!(manager.refresh_token().as_deref(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn successful_refresh_notifies_listener() {
        let refresher = MockTokenRefresher::succeeding("access-2", Some("refresh-2"));
        let (manager, _) = manager_with(&refresher);
        login(&manager, jwt_expiring_in(10), "refresh-1");
        let changes = record_changes(&manager);

        assert!(manager.refresh(false).await);

        let changes = changes.lock();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].access_token.as_deref(), Some("access-2"));
        assert_eq!(changes[0].refresh_token.as_deref(), Some("refresh-2"));
    }

    /// Validates a hard rejection wipes the session.
    ///
    /// Assertions:
    /// - `refresh()` resolves to false
    /// - Both tokens are cleared
    /// - Listener receives an empty pair
    /// - Authorization header is removed
    #[tokio::test]
    async fn rejected_refresh_clears_tokens() {
        let refresher = MockTokenRefresher::rejecting(401);
        let sink = Arc::new(RecordingHeaderSink::new());
        let manager = TokenLifecycleManager::builder(Arc::new(refresher.clone()))
            .header_sink(sink.clone())
            .clock(clock())
            .build();
        login(&manager, jwt_expiring_in(10), "refresh-1");
        let changes = record_changes(&manager);

        assert!(!manager.refresh(false).await);

        assert_eq!(manager.access_token(), None);
        assert_eq!(manager.refresh_token(), None);
        assert_eq!(*changes.lock(), vec![TokenChange::default()]);
        assert_eq!(sink.current(), None);
    }

    /// Validates a transient failure leaves credentials untouched.
    ///
    /// Assertions:
    /// - `refresh()` resolves to false
    /// - Tokens are exactly as before
    /// - Listener is not invoked
    #[tokio::test]
    async fn transient_failure_preserves_tokens() {
        let refresher = MockTokenRefresher::failing("connection reset");
        let (manager, _) = manager_with(&refresher);
        let access = jwt_expiring_in(10);
        login(&manager, access.clone(), "refresh-1");
        let before = manager.tokens();
        let changes = record_changes(&manager);

        assert!(!manager.refresh(true).await);

        assert_eq!(manager.tokens(), before);
        assert!(changes.lock().is_empty());
        assert!(!manager.is_refreshing());
    }

    struct PanickingRefresher;

    #[async_trait]
    impl TokenRefresher for PanickingRefresher {
        async fn refresh(&self, _refresh_token: &str) -> Result<RefreshedTokens, RefreshError> {
            panic!("refresh exploded");
        }
    }

    #[tokio::test]
    async fn panicking_refresher_resolves_false() {
        let manager = TokenLifecycleManager::builder(Arc::new(PanickingRefresher))
            .clock(clock())
            .build();
        login(&manager, jwt_expiring_in(10), "refresh-1");

        assert!(!manager.refresh(true).await);
        assert_eq!(manager.refresh_token().as_deref(), Some("refresh-1"));
        assert!(!manager.is_refreshing());
    }

    #[tokio::test]
    async fn logout_during_refresh_discards_result() {
        let refresher = MockTokenRefresher::succeeding("stale-access", Some("stale-refresh"))
            .with_delay(Duration::from_millis(50));
        let (manager, _) = manager_with(&refresher);
        login(&manager, jwt_expiring_in(10), "refresh-1");

        let refreshing = tokio::spawn({
            let manager = manager.clone();
            async move { manager.refresh(true).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        manager.clear_tokens();

        assert!(!refreshing.await.unwrap());
        assert_eq!(manager.access_token(), None);
        assert_eq!(manager.refresh_token(), None);
    }

    #[tokio::test]
    async fn ensure_fresh_is_noop_without_access_token() {
        let refresher = MockTokenRefresher::succeeding("access", None);
        let (manager, _) = manager_with(&refresher);
        manager.set_tokens(
            None,
            RefreshTokenUpdate::Replace("refresh-1".into()),
            SetTokensOptions::silent(),
        );

        manager.ensure_fresh().await;

        assert_eq!(refresher.call_count(), 0);
    }

    #[tokio::test]
    async fn ensure_fresh_refreshes_when_due() {
        let refresher = MockTokenRefresher::succeeding("access-2", None);
        let (manager, _) = manager_with(&refresher);
        login(&manager, jwt_expiring_in(30), "refresh-1");

        manager.ensure_fresh().await;

        assert_eq!(refresher.call_count(), 1);
        assert_eq!(manager.access_token().as_deref(), Some("access-2"));
    }

    #[tokio::test]
    async fn concurrent_refreshes_share_one_call() {
        let refresher = MockTokenRefresher::succeeding("access-2", None)
            .with_delay(Duration::from_millis(20));
        let (manager, _) = manager_with(&refresher);
        login(&manager, jwt_expiring_in(10), "refresh-1");

        let results =
            futures::future::join_all((0..8).map(|i| manager.refresh(i % 2 == 0))).await;

        assert!(results.into_iter().all(|ok| ok));
        assert_eq!(refresher.call_count(), 1);
    }

    /// Validates a refresh settles after its only caller gives up on it.
    ///
    /// Assertions:
    /// - Caller times out before the refresher answers
    /// - The answer is still committed and the gate returns to idle
    /// - Listener sees the refreshed pair
    #[tokio::test]
    async fn abandoned_refresh_still_settles() {
        let refresher = MockTokenRefresher::succeeding("access-2", Some("refresh-2"))
            .with_delay(Duration::from_millis(50));
        let (manager, _) = manager_with(&refresher);
        login(&manager, jwt_expiring_in(10), "refresh-1");
        let changes = record_changes(&manager);

        let timed_out =
            tokio::time::timeout(Duration::from_millis(10), manager.refresh(true)).await;
        assert!(timed_out.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;

        assert!(!manager.is_refreshing());
        assert_eq!(refresher.call_count(), 1);
        assert_eq!(manager.access_token().as_deref(), Some("access-2"));
        assert_eq!(manager.refresh_token().as_deref(), Some("refresh-2"));
        assert_eq!(changes.lock().len(), 1);
    }

    /// Validates listener calls follow commit order across threads.
    ///
    /// Assertions:
    /// - A slow listener call for a login does not land after a later logout
    /// - Last change seen by the listener matches the manager's final state
    #[test]
    fn notifications_follow_commit_order_across_threads() {
        let (manager, _) = manager_with(&MockTokenRefresher::new());
        let changes: Changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        let _handle = manager.set_listener(move |change| {
            if change.access_token.as_deref() == Some("login") {
                std::thread::sleep(Duration::from_millis(200));
            }
            sink.lock().push(change.clone());
        });

        let logging_in = std::thread::spawn({
            let manager = manager.clone();
            move || {
                manager.set_tokens(
                    Some("login".into()),
                    RefreshTokenUpdate::Replace("refresh-1".into()),
                    SetTokensOptions::default(),
                );
            }
        });
        std::thread::sleep(Duration::from_millis(50));
        manager.clear_tokens();
        logging_in.join().unwrap();

        assert_eq!(manager.access_token(), None);
        let changes = changes.lock();
        let access: Vec<_> = changes.iter().map(|change| change.access_token.clone()).collect();
        assert_eq!(access, vec![Some("login".to_string()), None]);
    }

    #[test]
    fn replaced_listener_is_not_removed_by_stale_handle() {
        let (manager, _) = manager_with(&MockTokenRefresher::new());
        let first = manager.set_listener(|_| {});
        let changes = record_changes(&manager);

        assert!(!first.unsubscribe());
        manager.set_tokens(Some("a".into()), RefreshTokenUpdate::Unchanged, SetTokensOptions::default());
        assert_eq!(changes.lock().len(), 1);
    }

    #[test]
    fn unsubscribe_removes_current_listener() {
        let (manager, _) = manager_with(&MockTokenRefresher::new());
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        let handle = manager.set_listener(move |_| *counter.lock() += 1);

        assert!(handle.unsubscribe());
        manager.set_tokens(Some("a".into()), RefreshTokenUpdate::Unchanged, SetTokensOptions::default());
        assert_eq!(*calls.lock(), 0);
    }

    #[test]
    fn listener_panic_does_not_poison_manager() {
        let (manager, _) = manager_with(&MockTokenRefresher::new());
        let _handle = manager.set_listener(|_| panic!("listener bug"));

        manager.set_tokens(Some("a".into()), RefreshTokenUpdate::Unchanged, SetTokensOptions::default());

        assert_eq!(manager.access_token().as_deref(), Some("a"));
    }

    #[test]
    fn system_clock_default_treats_expired_token_as_due() {
        let manager = TokenLifecycleManager::new(Arc::new(MockTokenRefresher::new()));
        let past = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64 - 5;
        login(&manager, make_jwt(past), "refresh-1");

        assert!(manager.should_refresh());
    }
}
