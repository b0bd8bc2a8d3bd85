//! Conversions from external infrastructure errors into domain errors.

use heatmapp_common::auth::TokenStoreError;
use heatmapp_domain::HeatmappError;
use reqwest::Error as HttpError;

use crate::http::TransportError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub HeatmappError);

impl From<InfraError> for HeatmappError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<HeatmappError> for InfraError {
    fn from(value: HeatmappError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TransportError */
/* -------------------------------------------------------------------------- */

impl From<HttpError> for TransportError {
    fn from(err: HttpError) -> Self {
        if err.is_timeout() {
            return TransportError::Timeout;
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            if err.is_connect() {
                return TransportError::Connect(err.to_string());
            }
        }
        if err.is_builder() {
            return TransportError::InvalidRequest(err.to_string());
        }
        TransportError::Other(err.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(err: HttpError) -> Self {
        InfraError(TransportError::from(err).into())
    }
}

impl From<TransportError> for HeatmappError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidRequest(message) => HeatmappError::InvalidInput(message),
            other => HeatmappError::Network(other.to_string()),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Storage errors */
/* -------------------------------------------------------------------------- */

impl From<TokenStoreError> for InfraError {
    fn from(err: TokenStoreError) -> Self {
        InfraError(HeatmappError::Storage(err.0))
    }
}
