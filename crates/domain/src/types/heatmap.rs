use serde::{Deserialize, Serialize};

use crate::constants::HEATMAP_MAX_DECIBELS;
use crate::types::NoisePost;

/// One weighted point on the noise heatmap
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapPoint {
    pub latitude: f64,
    pub longitude: f64,
    /// Normalized intensity in `[0, 1]`
    pub weight: f64,
}

impl HeatmapPoint {
    /// Map a noise post onto the heatmap, scaling decibels into `[0, 1]`.
    ///
    /// Returns `None` for posts with non-finite coordinates or readings.
    #[must_use]
    pub fn from_noise_post(post: &NoisePost) -> Option<Self> {
        if !(post.local_latitude.is_finite()
            && post.local_longitude.is_finite()
            && post.decibeis.is_finite())
        {
            return None;
        }
        Some(Self {
            latitude: post.local_latitude,
            longitude: post.local_longitude,
            weight: (post.decibeis / HEATMAP_MAX_DECIBELS).clamp(0.0, 1.0),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeatmapDataResponse {
    pub points: Vec<HeatmapPoint>,
}

impl HeatmapDataResponse {
    #[must_use]
    pub fn from_noise_posts(posts: &[NoisePost]) -> Self {
        Self { points: posts.iter().filter_map(HeatmapPoint::from_noise_post).collect() }
    }
}
