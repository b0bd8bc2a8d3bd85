//! Refresh endpoint adapter

use std::sync::Arc;

use async_trait::async_trait;
use heatmapp_common::auth::{RefreshError, RefreshedTokens, TokenRefresher};
use heatmapp_domain::{LoginResponse, RefreshRequest};
use reqwest::StatusCode;
use tracing::debug;

use super::paths;
use crate::http::{ApiRequest, HttpClient};

/// [`TokenRefresher`] backed by `POST token/refresh/`
///
/// Talks to the transport directly, bypassing the orchestrator, and never
/// sends the (possibly expired) Authorization header.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    http: Arc<HttpClient>,
}

impl TokenEndpoint {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl TokenRefresher for TokenEndpoint {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshedTokens, RefreshError> {
        let request = ApiRequest::post(paths::TOKEN_REFRESH)
            .without_auth()
            .json(&RefreshRequest { refresh: refresh_token.to_string() })
            .map_err(|err| RefreshError::Transient(err.to_string()))?;

        let response = self
            .http
            .send(&request)
            .await
            .map_err(|err| RefreshError::Transient(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(RefreshError::Rejected { status: status.as_u16() });
        }
        if !status.is_success() {
            return Err(RefreshError::Transient(format!("refresh endpoint returned HTTP {status}")));
        }

        let body: LoginResponse = response.json().map_err(|err| {
            debug!(error = %err, "refresh response body did not match");
            RefreshError::Transient(format!("malformed refresh response: {err}"))
        })?;

        Ok(RefreshedTokens { access: body.access, refresh: body.refresh })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use wiremock::matchers::{body_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    async fn endpoint(server: &MockServer) -> TokenEndpoint {
        let http = HttpClient::builder(server.uri())
            .timeout(Duration::from_millis(500))
            .build()
            .unwrap();
        TokenEndpoint::new(Arc::new(http))
    }

    #[tokio::test]
    async fn successful_refresh_returns_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token/refresh/"))
            .and(body_json(serde_json::json!({"refresh": "refresh-1"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access": "access-2", "refresh": "refresh-2"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let tokens = endpoint(&server).await.refresh("refresh-1").await.unwrap();

        assert_eq!(tokens.access, "access-2");
        assert_eq!(tokens.refresh.as_deref(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn refresh_never_sends_authorization() {
        let server = MockServer::start().await;
        Mock::given(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"access": "a"})))
            .mount(&server)
            .await;

        let endpoint = endpoint(&server).await;
        heatmapp_common::auth::AuthHeaderSink::set_access_token(
            endpoint.http.as_ref(),
            Some("expired"),
        );

        let tokens = endpoint.refresh("r").await.unwrap();
        assert_eq!(tokens.refresh, None);
    }

    #[tokio::test]
    async fn client_errors_400_and_401_are_rejections() {
        for status in [400u16, 401] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status))
                .mount(&server)
                .await;

            let err = endpoint(&server).await.refresh("r").await.unwrap_err();
            assert_eq!(err, RefreshError::Rejected { status });
        }
    }

    #[tokio::test]
    async fn other_failures_are_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let err = endpoint(&server).await.refresh("r").await.unwrap_err();
        assert!(matches!(err, RefreshError::Transient(_)));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;
        let err = endpoint(&server).await.refresh("r").await.unwrap_err();
        assert!(matches!(err, RefreshError::Transient(_)));

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"access": "a"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;
        let err = endpoint(&server).await.refresh("r").await.unwrap_err();
        assert!(matches!(err, RefreshError::Transient(_)));
    }
}
