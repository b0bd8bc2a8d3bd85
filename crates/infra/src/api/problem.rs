//! Request-level problem taxonomy
//!
//! Every orchestrated call returns [`ApiResult`]; expected failures (HTTP
//! errors, unreachable server, malformed bodies) are values, never panics.

use heatmapp_domain::{DetailResponse, HeatmappError};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::http::{RawResponse, TransportError};

/// Result of an orchestrated API call
pub type ApiResult<T> = Result<T, ApiProblem>;

/// Why an API call did not produce data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiProblem {
    /// The request exceeded the configured timeout
    #[error("request timed out")]
    Timeout,

    /// The server could not be reached
    #[error("cannot connect to server")]
    CannotConnect,

    /// 5xx response
    #[error("server error (HTTP {status})")]
    Server { status: u16 },

    /// 401 response that survived the refresh-and-retry
    #[error("not authorized")]
    Unauthorized,

    /// 403 response
    #[error("forbidden")]
    Forbidden,

    /// 404 response
    #[error("not found")]
    NotFound,

    /// Any other 4xx response; `detail` is the server's `{"detail": ...}`
    #[error("request rejected (HTTP {status}){}", .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    Rejected { status: u16, detail: Option<String> },

    /// Unclassified transport failure or unexpected status
    #[error("unknown error")]
    Unknown,

    /// Success status but an absent, null, or malformed body
    #[error("bad data in response")]
    BadData,
}

impl ApiProblem {
    /// Stable label for this problem kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::CannotConnect => "cannot-connect",
            Self::Server { .. } => "server",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not-found",
            Self::Rejected { .. } => "rejected",
            Self::Unknown => "unknown",
            Self::BadData => "bad-data",
        }
    }

    /// Whether retrying later might succeed without user action
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Timeout | Self::CannotConnect | Self::Unknown)
    }

    /// Classify a non-success response; `None` for 2xx.
    pub fn from_response(response: &RawResponse) -> Option<Self> {
        let status = response.status();
        if status.is_success() {
            return None;
        }

        let problem = match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized,
            StatusCode::FORBIDDEN => Self::Forbidden,
            StatusCode::NOT_FOUND => Self::NotFound,
            s if s.is_server_error() => Self::Server { status: s.as_u16() },
            s if s.is_client_error() => Self::Rejected {
                status: s.as_u16(),
                detail: response.json::<DetailResponse>().ok().map(|body| body.detail),
            },
            _ => Self::Unknown,
        };
        Some(problem)
    }

    /// Normalize a final response into data or a problem.
    ///
    /// # Errors
    /// Returns the classified problem for non-2xx statuses and
    /// [`ApiProblem::BadData`] for missing or undecodable bodies.
    pub fn decode<T: DeserializeOwned>(response: &RawResponse) -> ApiResult<T> {
        if let Some(problem) = Self::from_response(response) {
            return Err(problem);
        }
        if response.has_no_data() {
            debug!(status = %response.status(), "response carried no data");
            return Err(Self::BadData);
        }
        response.json().map_err(|err| {
            debug!(error = %err, "response body did not match the expected shape");
            Self::BadData
        })
    }
}

impl From<TransportError> for ApiProblem {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => Self::Timeout,
            TransportError::Connect(_) => Self::CannotConnect,
            TransportError::InvalidRequest(_) | TransportError::Other(_) => Self::Unknown,
        }
    }
}

impl From<serde_json::Error> for ApiProblem {
    /// Request bodies that cannot be serialized count as bad data.
    fn from(_: serde_json::Error) -> Self {
        Self::BadData
    }
}

impl From<ApiProblem> for HeatmappError {
    fn from(problem: ApiProblem) -> Self {
        match problem {
            ApiProblem::Unauthorized | ApiProblem::Forbidden => {
                HeatmappError::Auth(problem.to_string())
            }
            ApiProblem::Rejected { .. } => HeatmappError::InvalidInput(problem.to_string()),
            ApiProblem::BadData => HeatmappError::Internal(problem.to_string()),
            ApiProblem::Timeout
            | ApiProblem::CannotConnect
            | ApiProblem::Server { .. }
            | ApiProblem::NotFound
            | ApiProblem::Unknown => HeatmappError::Network(problem.to_string()),
        }
    }
}
