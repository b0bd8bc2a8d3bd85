//! Login state on top of [`ApiClient`]
//!
//! The session installs a listener on the client's token lifecycle so that
//! every committed token change (login, refresh, rotation, logout) is
//! written to the [`TokenStore`].

use std::sync::Arc;

use heatmapp_common::auth::{
    ListenerHandle, RefreshTokenUpdate, SetTokensOptions, StoredTokens, TokenChange, TokenStore,
};
use heatmapp_domain::{validate_username, HeatmappError, LoginRequest, UserData};
use parking_lot::Mutex;
use tracing::{info, instrument, warn};

use super::client::ApiClient;
use super::problem::ApiResult;
use crate::errors::InfraError;

#[derive(Debug, Default)]
struct SessionState {
    username: Option<String>,
    current_user: Option<UserData>,
}

/// Authenticated session persisted through a [`TokenStore`]
pub struct AuthSession {
    client: ApiClient,
    store: Arc<dyn TokenStore>,
    state: Arc<Mutex<SessionState>>,
    listener: Option<ListenerHandle>,
}

impl AuthSession {
    /// Wrap `client` and start persisting its token changes to `store`.
    ///
    /// Replaces any listener already registered on the client's tokens.
    pub fn new(client: ApiClient, store: Arc<dyn TokenStore>) -> Self {
        let state = Arc::new(Mutex::new(SessionState::default()));

        let listener = {
            let store = Arc::clone(&store);
            let state = Arc::clone(&state);
            client.tokens().set_listener(move |change: &TokenChange| {
                if let Err(err) = store.write(&StoredTokens::from(change)) {
                    warn!(error = %err, "Failed to persist tokens");
                }
                if change.access_token.is_none() {
                    state.lock().current_user = None;
                }
            })
        };

        Self { client, store, state, listener: Some(listener) }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Load persisted tokens without writing them back.
    ///
    /// Returns whether an access token is now held.
    ///
    /// # Errors
    /// Returns `HeatmappError::Storage` if the store cannot be read.
    pub fn restore(&self) -> Result<bool, HeatmappError> {
        let stored = self.store.read().map_err(InfraError::from)?;
        if stored.is_empty() {
            return Ok(false);
        }

        self.client.tokens().set_tokens(
            stored.access_token,
            RefreshTokenUpdate::from(stored.refresh_token),
            SetTokensOptions::silent(),
        );
        info!("Restored persisted session");
        Ok(self.is_authenticated())
    }

    /// Exchange credentials for a token pair and adopt it.
    ///
    /// A missing `refresh` in the response clears any stored refresh token.
    ///
    /// # Errors
    /// `HeatmappError::InvalidInput` for an invalid username, otherwise the
    /// endpoint's problem converted into a `HeatmappError`.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<(), HeatmappError> {
        if let Some(message) = validate_username(username) {
            return Err(HeatmappError::InvalidInput(format!("username {message}")));
        }

        let response = self.client.login(&LoginRequest::new(username, password)).await?;

        self.client.tokens().set_tokens(
            Some(response.access),
            RefreshTokenUpdate::from(response.refresh),
            SetTokensOptions::default().overwrite_refresh(true),
        );

        let mut state = self.state.lock();
        state.username = Some(username.to_string());
        state.current_user = None;
        drop(state);

        info!("Logged in");
        Ok(())
    }

    /// Drop both tokens (the store is cleared through the listener).
    pub fn logout(&self) {
        self.client.tokens().clear_tokens();
        let mut state = self.state.lock();
        state.username = None;
        state.current_user = None;
        drop(state);
        info!("Logged out");
    }

    pub fn is_authenticated(&self) -> bool {
        self.client.tokens().access_token().is_some()
    }

    pub fn username(&self) -> Option<String> {
        self.state.lock().username.clone()
    }

    /// Last profile fetched with [`fetch_current_user`](Self::fetch_current_user).
    pub fn current_user(&self) -> Option<UserData> {
        self.state.lock().current_user.clone()
    }

    /// Fetch `current_user/` and cache it.
    ///
    /// # Errors
    /// Returns the endpoint's [`ApiProblem`](super::ApiProblem).
    pub async fn fetch_current_user(&self) -> ApiResult<UserData> {
        let user = self.client.current_user().await?;
        let mut state = self.state.lock();
        if state.username.is_none() {
            state.username = Some(user.username.clone());
        }
        state.current_user = Some(user.clone());
        Ok(user)
    }
}

impl Drop for AuthSession {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.unsubscribe();
        }
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("client", &self.client)
            .field("authenticated", &self.is_authenticated())
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use heatmapp_common::testing::{make_jwt_expiring_in, MockTokenRefresher, MockTokenStore};
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn session(server: &MockServer, store: &Arc<MockTokenStore>) -> AuthSession {
        let client = ApiClient::builder()
            .base_url(server.uri())
            .timeout(Duration::from_secs(2))
            .token_refresher(Arc::new(MockTokenRefresher::succeeding("unused", None)))
            .build()
            .unwrap();
        AuthSession::new(client, store.clone())
    }

    #[tokio::test]
    async fn login_persists_tokens() {
        let server = MockServer::start().await;
        let access = make_jwt_expiring_in(3600);
        Mock::given(method("POST"))
            .and(path("/token/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access": access, "refresh": "refresh-1"})),
            )
            .mount(&server)
            .await;
        let store = Arc::new(MockTokenStore::new());
        let session = session(&server, &store);

        session.login("ana", "secret").await.unwrap();

        assert!(session.is_authenticated());
        assert_eq!(session.username().as_deref(), Some("ana"));
        assert_eq!(store.stored().access_token.as_deref(), Some(access.as_str()));
        assert_eq!(store.stored().refresh_token.as_deref(), Some("refresh-1"));
    }

    #[tokio::test]
    async fn failed_persist_keeps_tokens_in_memory() {
        let server = MockServer::start().await;
        let access = make_jwt_expiring_in(3600);
        Mock::given(method("POST"))
            .and(path("/token/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"access": access, "refresh": "refresh-1"})),
            )
            .mount(&server)
            .await;
        let store = Arc::new(MockTokenStore::new());
        store.fail_writes(true);
        let session = session(&server, &store);

        session.login("ana", "secret").await.unwrap();

        assert!(session.is_authenticated());
        assert_eq!(session.client().tokens().refresh_token().as_deref(), Some("refresh-1"));
        assert!(store.writes().is_empty());
        assert!(store.stored().is_empty());
    }

    #[tokio::test]
    async fn login_without_refresh_clears_old_refresh_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "a2"})))
            .mount(&server)
            .await;
        let store =
            Arc::new(MockTokenStore::with_tokens(Some(&make_jwt_expiring_in(3600)), Some("r1")));
        let session = session(&server, &store);
        assert!(session.restore().unwrap());

        session.login("ana", "secret").await.unwrap();

        assert_eq!(session.client().tokens().refresh_token(), None);
        assert_eq!(store.stored().refresh_token, None);
    }

    #[tokio::test]
    async fn invalid_username_never_reaches_the_server() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        let store = Arc::new(MockTokenStore::new());
        let session = session(&server, &store);

        let err = session.login("ab", "secret").await.unwrap_err();

        assert_eq!(
            err,
            HeatmappError::InvalidInput("username must be at least 3 characters".into())
        );
    }

    #[tokio::test]
    async fn wrong_credentials_are_an_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token/"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let store = Arc::new(MockTokenStore::new());
        let session = session(&server, &store);

        let err = session.login("ana", "wrong").await.unwrap_err();

        assert!(matches!(err, HeatmappError::Auth(_)), "{err:?}");
        assert!(!session.is_authenticated());
        assert!(store.writes().is_empty());
    }

    #[test]
    fn restore_does_not_write_back() {
        let store = Arc::new(MockTokenStore::with_tokens(Some("a"), Some("r")));
        let client = ApiClient::builder()
            .token_refresher(Arc::new(MockTokenRefresher::succeeding("unused", None)))
            .build()
            .unwrap();
        let session = AuthSession::new(client, store.clone());

        assert!(session.restore().unwrap());
        assert_eq!(session.client().tokens().refresh_token().as_deref(), Some("r"));
        assert!(store.writes().is_empty());
    }

    #[test]
    fn restore_from_empty_or_failing_store() {
        let client = ApiClient::builder().build().unwrap();
        let store = Arc::new(MockTokenStore::new());
        let session = AuthSession::new(client, store.clone());
        assert!(!session.restore().unwrap());

        store.fail_reads(true);
        assert!(matches!(session.restore().unwrap_err(), HeatmappError::Storage(_)));
    }

    #[tokio::test]
    async fn logout_clears_store_and_cached_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/current_user/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1,
                "username": "ana",
                "streak": 2,
                "moedas": 30
            })))
            .mount(&server)
            .await;
        let store =
            Arc::new(MockTokenStore::with_tokens(Some(&make_jwt_expiring_in(3600)), Some("r")));
        let session = session(&server, &store);
        session.restore().unwrap();

        let user = session.fetch_current_user().await.unwrap();
        assert_eq!(user.moedas, 30);
        assert_eq!(session.current_user(), Some(user));
        assert_eq!(session.username().as_deref(), Some("ana"));

        session.logout();

        assert!(!session.is_authenticated());
        assert_eq!(session.current_user(), None);
        assert_eq!(session.username(), None);
        assert_eq!(store.stored(), StoredTokens::default());
    }

    #[test]
    fn dropping_the_session_stops_persistence() {
        let store = Arc::new(MockTokenStore::new());
        let client = ApiClient::builder().build().unwrap();
        drop(AuthSession::new(client.clone(), store.clone()));

        client.tokens().set_tokens(
            Some("a".into()),
            RefreshTokenUpdate::Replace("r".into()),
            SetTokensOptions::default(),
        );

        assert!(store.writes().is_empty());
    }
}
