//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Token lifecycle
pub const ACCESS_TOKEN_REFRESH_THRESHOLD_SECS: i64 = 60;

// Transport
pub const DEFAULT_API_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api/";

// Green area image upload
pub const DEFAULT_IMAGE_MAX_WIDTH: u32 = 1280;
pub const DEFAULT_IMAGE_MAX_HEIGHT: u32 = 1280;
pub const DEFAULT_IMAGE_QUALITY: u8 = 70;
pub const OPTIMIZED_IMAGE_CONTENT_TYPE: &str = "image/jpeg";

// Noise heatmap: readings at or above this level get full weight
pub const HEATMAP_MAX_DECIBELS: f64 = 120.0;

// Usernames
pub const MIN_USERNAME_LENGTH: usize = 3;
