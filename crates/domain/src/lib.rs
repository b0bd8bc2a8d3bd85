//! # Heatmapp Domain
//!
//! Business domain types for the Heatmapp client.
//!
//! This crate contains:
//! - Wire types for every backend endpoint (auth, users, icons, posts)
//! - Domain error types and Result definitions
//! - Configuration structures
//! - Domain constants and input validation
//!
//! ## Architecture
//! - No dependencies on other Heatmapp crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;
pub mod validation;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
pub use validation::validate_username;
