//! Heatmapp backend API client
//!
//! # Architecture
//!
//! - [`ApiClient`] orchestrates every request: pre-emptive refresh, a single
//!   retry after a forced refresh on HTTP 401, problem normalization
//! - [`TokenEndpoint`] performs the refresh call directly on the transport
//! - Endpoint wrappers live in `commands` as `ApiClient` methods
//! - [`AuthSession`] persists token changes and tracks the logged-in user

pub mod client;
pub mod commands;
pub mod paths;
pub mod problem;
pub mod refresh;
pub mod session;

pub use client::{ApiClient, ApiClientBuilder};
pub use problem::{ApiProblem, ApiResult};
pub use refresh::TokenEndpoint;
pub use session::AuthSession;
