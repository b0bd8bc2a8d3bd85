//! Wire types exchanged with the Heatmapp backend
//!
//! Field names mirror the backend serializers exactly; they are part of the
//! wire contract and must not be renamed.

pub mod auth;
pub mod heatmap;
pub mod icon;
pub mod post;
pub mod user;

pub use auth::{LoginRequest, LoginResponse, RefreshRequest, RegisterRequest};
pub use heatmap::{HeatmapDataResponse, HeatmapPoint};
pub use icon::{DetailResponse, Icone, PurchasedIcon};
pub use post::{
    AudioSubmission, GreenAreaPost, GreenAreaPostRequest, GreenAreaSubmission, NoisePost,
    NoisePostCreated, NoisePostRequest, Reward,
};
pub use user::{UpdateIconRequest, UserData};
