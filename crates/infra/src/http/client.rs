use std::time::Duration;

use heatmapp_common::auth::AuthHeaderSink;
use heatmapp_domain::constants::DEFAULT_API_TIMEOUT_MS;
use heatmapp_domain::{ApiConfig, HeatmappError};
use parking_lot::RwLock;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::Client as ReqwestClient;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::request::{ApiRequest, RawResponse};
use crate::errors::InfraError;

/// Transport-level failure (no HTTP status was obtained)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("cannot connect: {0}")]
    Connect(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport failure: {0}")]
    Other(String),
}

/// HTTP client bound to a base URL with a mutable Authorization header.
///
/// Every request is bounded by the configured timeout. The client never
/// retries on its own; retry policy belongs to the orchestrator.
pub struct HttpClient {
    client: ReqwestClient,
    base_url: Url,
    timeout: Duration,
    authorization: RwLock<Option<HeaderValue>>,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder(base_url: impl Into<String>) -> HttpClientBuilder {
        HttpClientBuilder::new(base_url)
    }

    /// Build a client from API configuration.
    ///
    /// # Errors
    /// Returns `HeatmappError::Config` for an invalid base URL and
    /// `HeatmappError::Network` if the TLS backend cannot be initialised.
    pub fn from_config(config: &ApiConfig) -> Result<Self, HeatmappError> {
        Self::builder(config.base_url.clone()).timeout(config.timeout()).build()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether an Authorization header is currently installed.
    pub fn has_authorization(&self) -> bool {
        self.authorization.read().is_some()
    }

    /// Resolve a request path against the base URL.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidRequest`] if the path cannot be joined.
    pub fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| TransportError::InvalidRequest(format!("{path}: {err}")))
    }

    /// Send a request and buffer the full response.
    ///
    /// Any HTTP status, including errors, is returned as a [`RawResponse`];
    /// only failures that produced no status are errors.
    ///
    /// # Errors
    /// Returns [`TransportError`] on timeout, connection failure, or an
    /// unbuildable request.
    pub async fn send(&self, request: &ApiRequest) -> Result<RawResponse, TransportError> {
        let url = self.url_for(request.path())?;
        let method = request.method().clone();

        let mut builder = self.client.request(method.clone(), url.clone());
        if !request.query_pairs().is_empty() {
            builder = builder.query(request.query_pairs());
        }
        if request.is_authenticated() {
            let authorization = self.authorization.read().clone();
            if let Some(value) = authorization {
                builder = builder.header(AUTHORIZATION, value);
            }
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        debug!(%method, path = url.path(), "sending HTTP request");

        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                debug!(%method, path = url.path(), error = %err, "HTTP request failed");
                return Err(err.into());
            }
        };

        let status = response.status();
        let body = response.bytes().await?;
        debug!(%method, path = url.path(), %status, bytes = body.len(), "received HTTP response");

        Ok(RawResponse::new(status, body.to_vec()))
    }
}

impl AuthHeaderSink for HttpClient {
    fn set_access_token(&self, token: Option<&str>) {
        let value = token.and_then(|token| match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                Some(value)
            }
            Err(_) => {
                warn!("Access token is not a valid header value; Authorization header removed");
                None
            }
        });
        *self.authorization.write() = value;
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url.as_str())
            .field("timeout", &self.timeout)
            .field("has_authorization", &self.has_authorization())
            .finish_non_exhaustive()
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    base_url: String,
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
}

impl HttpClientBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_millis(DEFAULT_API_TIMEOUT_MS),
            user_agent: None,
            default_headers: None,
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Build the client.
    ///
    /// The base URL gets a trailing `/` so relative paths resolve beneath it.
    ///
    /// # Errors
    /// Returns `HeatmappError::Config` for an invalid base URL and
    /// `HeatmappError::Network` if reqwest cannot build its client.
    pub fn build(self) -> Result<HttpClient, HeatmappError> {
        let base_url = normalize_base_url(&self.base_url)?;

        let mut headers = self.default_headers.unwrap_or_default();
        headers.entry(ACCEPT).or_insert_with(|| HeaderValue::from_static("application/json"));

        let mut builder =
            ReqwestClient::builder().timeout(self.timeout).default_headers(headers).no_proxy();
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(|err| HeatmappError::from(InfraError::from(err)))?;

        Ok(HttpClient { client, base_url, timeout: self.timeout, authorization: RwLock::new(None) })
    }
}

fn normalize_base_url(raw: &str) -> Result<Url, HeatmappError> {
    let trimmed = raw.trim();
    let with_slash =
        if trimmed.ends_with('/') { trimmed.to_string() } else { format!("{trimmed}/") };
    let url = Url::parse(&with_slash)
        .map_err(|err| HeatmappError::Config(format!("Invalid API base URL '{raw}': {err}")))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(HeatmappError::Config(format!("API base URL must be http(s): '{raw}'")));
    }
    Ok(url)
}
