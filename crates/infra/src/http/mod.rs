//! HTTP transport

pub mod client;
pub mod request;

pub use client::{HttpClient, HttpClientBuilder, TransportError};
pub use request::{ApiRequest, RawResponse};
