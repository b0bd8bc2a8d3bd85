use std::io::Cursor;
use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use heatmapp_domain::constants::OPTIMIZED_IMAGE_CONTENT_TYPE;
use heatmapp_domain::{HeatmappError, ImageConfig};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageFormat;
use tracing::debug;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";
const FALLBACK_FILE_NAME: &str = "image";

/// Raw photo as picked by the user
#[derive(Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub bytes: Vec<u8>,
    pub file_name: String,
    /// Content type reported by the picker, if any
    pub content_type: Option<String>,
}

impl ImageSource {
    pub fn new(bytes: Vec<u8>, file_name: impl Into<String>, content_type: Option<String>) -> Self {
        Self { bytes, file_name: file_name.into(), content_type }
    }

    /// Upload payload built from the original bytes, unmodified.
    ///
    /// Used when optimization fails. The content type falls back to a
    /// guess from the file extension.
    pub fn passthrough(&self) -> OptimizedImage {
        let content_type = self
            .content_type
            .clone()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| {
                ImageFormat::from_path(&self.file_name)
                    .ok()
                    .map(|format| format.to_mime_type().to_string())
            })
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());

        OptimizedImage {
            base64: STANDARD.encode(&self.bytes),
            content_type,
            file_name: self.file_name.clone(),
        }
    }
}

impl std::fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSource")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Image ready to embed in a JSON upload
#[derive(Clone, PartialEq, Eq)]
pub struct OptimizedImage {
    /// Standard base64 of the encoded bytes
    pub base64: String,
    pub content_type: String,
    pub file_name: String,
}

impl std::fmt::Debug for OptimizedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OptimizedImage")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("base64_len", &self.base64.len())
            .finish()
    }
}

/// Shrinks and re-encodes photos before upload
#[async_trait]
pub trait ImageOptimizer: Send + Sync {
    /// # Errors
    /// Returns `HeatmappError::Image` if the source cannot be decoded or
    /// re-encoded.
    async fn optimize(&self, source: &ImageSource) -> Result<OptimizedImage, HeatmappError>;
}

/// JPEG re-encoder bounded by an [`ImageConfig`]
///
/// Images larger than the bounds are downscaled preserving aspect ratio.
/// Smaller images keep their size. Output is always JPEG.
#[derive(Debug, Clone, Copy)]
pub struct JpegImageOptimizer {
    config: ImageConfig,
}

impl JpegImageOptimizer {
    pub fn new(config: ImageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ImageConfig {
        self.config
    }
}

impl Default for JpegImageOptimizer {
    fn default() -> Self {
        Self::new(ImageConfig::default())
    }
}

#[async_trait]
impl ImageOptimizer for JpegImageOptimizer {
    async fn optimize(&self, source: &ImageSource) -> Result<OptimizedImage, HeatmappError> {
        let bytes = source.bytes.clone();
        let config = self.config;

        let encoded = tokio::task::spawn_blocking(move || reencode(&bytes, config))
            .await
            .map_err(|err| HeatmappError::Internal(format!("image task failed: {err}")))?
            .map_err(|err| HeatmappError::Image(format!("{err:#}")))?;

        debug!(
            original = source.bytes.len(),
            optimized = encoded.len(),
            "Re-encoded image as JPEG"
        );

        Ok(OptimizedImage {
            base64: STANDARD.encode(&encoded),
            content_type: OPTIMIZED_IMAGE_CONTENT_TYPE.to_string(),
            file_name: jpeg_file_name(&source.file_name),
        })
    }
}

fn reencode(bytes: &[u8], config: ImageConfig) -> anyhow::Result<Vec<u8>> {
    let mut image = image::load_from_memory(bytes).context("decoding source image")?;

    let max_width = config.max_width.max(1);
    let max_height = config.max_height.max(1);
    if image.width() > max_width || image.height() > max_height {
        image = image.resize(max_width, max_height, FilterType::Triangle);
    }

    let rgb = image.to_rgb8();
    let mut out = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut out, config.quality.clamp(1, 100))
        .encode_image(&rgb)
        .context("encoding JPEG")?;
    Ok(out.into_inner())
}

fn jpeg_file_name(original: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());
    format!("{stem}.jpg")
}
