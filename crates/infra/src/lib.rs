//! # Heatmapp Infrastructure
//!
//! Everything in the client that performs I/O.
//!
//! This crate contains:
//! - HTTP transport (reqwest) with a mutable Authorization header
//! - The request orchestrator ([`api::ApiClient`]) and endpoint wrappers
//! - Auth session wiring the token lifecycle to a persistent token store
//! - JPEG image optimizer for green-area uploads
//! - Configuration loading and tracing initialisation
//!
//! ## Architecture
//! - Token lifecycle rules live in `heatmapp-common`
//! - Wire types and configuration structs live in `heatmapp-domain`
//! - This crate supplies the concrete transport and storage behind them

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod imaging;
pub mod observability;
pub mod storage;

// Re-export commonly used items
pub use api::{ApiClient, ApiClientBuilder, ApiProblem, ApiResult, AuthSession, TokenEndpoint};
pub use http::{ApiRequest, HttpClient, HttpClientBuilder, RawResponse, TransportError};
pub use imaging::{ImageOptimizer, ImageSource, JpegImageOptimizer, OptimizedImage};
pub use storage::FileTokenStore;
