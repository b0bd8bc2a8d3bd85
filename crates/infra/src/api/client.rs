//! Request orchestrator
//!
//! Every API call goes through [`ApiClient::request`]:
//!
//! 1. `ensure_fresh` (pre-emptive refresh when the access token is close to
//!    expiry)
//! 2. send
//! 3. on HTTP 401, force a refresh and, if it succeeded, send once more
//! 4. normalize the final response into a value or an [`ApiProblem`]

use std::sync::Arc;
use std::time::Duration;

use heatmapp_common::auth::{AuthHeaderSink, TokenLifecycleManager, TokenRefresher};
use heatmapp_common::time::Clock;
use heatmapp_domain::{ApiConfig, AppConfig, HeatmappError, ImageConfig};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use super::problem::{ApiProblem, ApiResult};
use super::refresh::TokenEndpoint;
use crate::http::{ApiRequest, HttpClient, RawResponse};
use crate::imaging::{ImageOptimizer, JpegImageOptimizer};

/// Authenticated API client
///
/// Cheap to clone; clones share the transport and the token state.
#[derive(Clone)]
pub struct ApiClient {
    http: Arc<HttpClient>,
    tokens: TokenLifecycleManager,
    image_optimizer: Arc<dyn ImageOptimizer>,
}

impl ApiClient {
    /// Build a client from application configuration with default
    /// collaborators.
    ///
    /// # Errors
    /// Returns `HeatmappError::Config` if the base URL is invalid.
    pub fn new(config: &AppConfig) -> Result<Self, HeatmappError> {
        Self::builder().api_config(config.api.clone()).image_config(config.image).build()
    }

    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Token lifecycle shared by this client.
    pub fn tokens(&self) -> &TokenLifecycleManager {
        &self.tokens
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    pub(crate) fn image_optimizer(&self) -> &dyn ImageOptimizer {
        self.image_optimizer.as_ref()
    }

    /// Send `request` through the refresh-and-retry pipeline and decode the
    /// JSON body.
    ///
    /// # Errors
    /// Returns the [`ApiProblem`] describing the final response, or the
    /// transport failure of whichever attempt failed.
    #[instrument(skip(self, request), fields(method = %request.method(), path = request.path()))]
    pub async fn request<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        let response = self.execute(&request).await?;
        let result = ApiProblem::decode(&response);
        if let Err(problem) = &result {
            debug!(kind = problem.kind(), status = %response.status(), "API request failed");
        }
        result
    }

    /// Like [`request`](Self::request), but returns the final raw response
    /// without interpreting its status.
    ///
    /// At most two sends happen. The second one only follows a 401 and a
    /// successful forced refresh.
    ///
    /// # Errors
    /// Returns the transport failure of whichever attempt failed.
    pub async fn execute(&self, request: &ApiRequest) -> ApiResult<RawResponse> {
        self.tokens.ensure_fresh().await;

        let response = self.http.send(request).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        if !self.tokens.refresh(true).await {
            debug!("Got 401 and no fresh token is available; not retrying");
            return Ok(response);
        }

        debug!("Retrying once after forced token refresh");
        Ok(self.http.send(request).await?)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("http", &self.http)
            .field("refreshing", &self.tokens.is_refreshing())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ApiClient`]
#[derive(Default)]
pub struct ApiClientBuilder {
    api: ApiConfig,
    image: ImageConfig,
    image_optimizer: Option<Arc<dyn ImageOptimizer>>,
    token_refresher: Option<Arc<dyn TokenRefresher>>,
    clock: Option<Arc<dyn Clock>>,
    refresh_threshold: Option<Duration>,
}

impl ApiClientBuilder {
    pub fn api_config(mut self, config: ApiConfig) -> Self {
        self.api = config;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.api.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn image_config(mut self, config: ImageConfig) -> Self {
        self.image = config;
        self
    }

    pub fn image_optimizer(mut self, optimizer: Arc<dyn ImageOptimizer>) -> Self {
        self.image_optimizer = Some(optimizer);
        self
    }

    /// Replace the `token/refresh/` endpoint (tests use a mock).
    pub fn token_refresher(mut self, refresher: Arc<dyn TokenRefresher>) -> Self {
        self.token_refresher = Some(refresher);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = Some(threshold);
        self
    }

    /// # Errors
    /// Returns `HeatmappError::Config` if the base URL is invalid and
    /// `HeatmappError::Network` if the HTTP backend cannot be created.
    pub fn build(self) -> Result<ApiClient, HeatmappError> {
        let http = Arc::new(
            HttpClient::builder(self.api.base_url.clone())
                .timeout(self.api.timeout())
                .user_agent(concat!("heatmapp-client/", env!("CARGO_PKG_VERSION")))
                .build()?,
        );

        let refresher = self
            .token_refresher
            .unwrap_or_else(|| Arc::new(TokenEndpoint::new(Arc::clone(&http))));

        let header_sink: Arc<dyn AuthHeaderSink> = Arc::<HttpClient>::clone(&http);
        let mut tokens = TokenLifecycleManager::builder(refresher).header_sink(header_sink);
        if let Some(clock) = self.clock {
            tokens = tokens.clock(clock);
        }
        if let Some(threshold) = self.refresh_threshold {
            tokens = tokens.refresh_threshold(threshold);
        }

        let image_optimizer = self
            .image_optimizer
            .unwrap_or_else(|| Arc::new(JpegImageOptimizer::new(self.image)));

        Ok(ApiClient { http, tokens: tokens.build(), image_optimizer })
    }
}
