//! Proof-of-delivery photo compression pipeline
//!
//! Turns a captured photo into a JPEG that fits a byte budget:
//!
//! 1. **Decode** the source into a raster (the encoded input is released right after)
//! 2. **Resize** once, uniformly, so the longer side fits `max_dimension` (never upscales)
//! 3. **Render** onto an RGB surface of the target size
//! 4. **Encode** at decreasing qualities until the output fits `max_size_bytes`
//!    or the quality floor is reached
//!
//! Overshooting the budget at the floor is not an error: the floor-quality
//! encoding is returned as a best-effort result so the courier's workflow is
//! never blocked. Only undecodable input and encoder failures are fatal.
//!
//! ```rust,no_run
//! use estela_pod::compression::{ImageCompressor, CompressionConfig, SourceImage};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let compressor = ImageCompressor::new(CompressionConfig::default())?;
//! let photo = compressor.compress(SourceImage::from_path("parcel.jpg").await?).await?;
//! assert_eq!(photo.mime_type(), "image/jpeg");
//! # Ok(())
//! # }
//! ```

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use image::RgbImage;
use tracing::debug;

pub mod encoder;
pub mod quality;
pub mod raster;

pub use encoder::{JpegRasterEncoder, RasterEncoder};
pub use quality::QualitySchedule;
pub use raster::target_dimensions;

use crate::config::CompressionSettings;
use crate::config::defaults::*;
use crate::errors::{CompressionError, CompressionResult};
use crate::utils::format_bytes;
use raster::{DecodeScope, render};

pub const JPEG_MIME_TYPE: &str = "image/jpeg";

/// Pipeline parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionConfig {
    pub max_size_bytes: usize,
    pub max_dimension: u32,
    pub quality_start: f32,
    pub quality_step: f32,
    pub quality_min: f32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_PHOTO_SIZE_BYTES,
            max_dimension: DEFAULT_MAX_PHOTO_DIMENSION,
            quality_start: DEFAULT_PHOTO_QUALITY_START,
            quality_step: DEFAULT_PHOTO_QUALITY_STEP,
            quality_min: DEFAULT_PHOTO_QUALITY_MIN,
        }
    }
}

impl From<&CompressionSettings> for CompressionConfig {
    fn from(settings: &CompressionSettings) -> Self {
        Self {
            max_size_bytes: settings.max_size_bytes,
            max_dimension: settings.max_dimension,
            quality_start: settings.quality_start,
            quality_step: settings.quality_step,
            quality_min: settings.quality_min,
        }
    }
}

impl CompressionConfig {
    pub fn validate(&self) -> CompressionResult<()> {
        if self.max_size_bytes == 0 {
            return Err(CompressionError::InvalidConfig(
                "max_size_bytes must be positive".to_string(),
            ));
        }
        if self.max_dimension == 0 {
            return Err(CompressionError::InvalidConfig(
                "max_dimension must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.quality_start) || !(0.0..=1.0).contains(&self.quality_min)
        {
            return Err(CompressionError::InvalidConfig(format!(
                "qualities must be within [0, 1] (start {}, min {})",
                self.quality_start, self.quality_min
            )));
        }
        if self.quality_min > self.quality_start {
            return Err(CompressionError::InvalidConfig(format!(
                "quality_min {} exceeds quality_start {}",
                self.quality_min, self.quality_start
            )));
        }
        if !(self.quality_step.is_finite() && self.quality_step > 0.0) {
            return Err(CompressionError::InvalidConfig(format!(
                "quality_step must be a positive number, got {}",
                self.quality_step
            )));
        }
        Ok(())
    }

    /// The qualities the encode loop may try, in order
    pub fn schedule(&self) -> QualitySchedule {
        QualitySchedule::new(self.quality_start, self.quality_step, self.quality_min)
    }
}

/// A captured photo awaiting compression
#[derive(Debug, Clone)]
pub struct SourceImage {
    bytes: Bytes,
    name: Option<String>,
}

impl SourceImage {
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub async fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::from_bytes(bytes).with_name(path.display().to_string()))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| "<memory>".to_string())
    }
}

/// The pipeline's output; ownership passes to the caller
#[derive(Debug, Clone)]
pub struct CompressedImage {
    pub bytes: Bytes,
    pub width: u32,
    pub height: u32,
    pub source_width: u32,
    pub source_height: u32,
    /// Quality of the returned encoding
    pub quality: f32,
    /// Every quality that was encoded, in order
    pub attempts: Vec<f32>,
}

impl CompressedImage {
    pub fn mime_type(&self) -> &'static str {
        JPEG_MIME_TYPE
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_within(&self, max_size_bytes: usize) -> bool {
        self.bytes.len() <= max_size_bytes
    }

    pub fn was_resized(&self) -> bool {
        (self.width, self.height) != (self.source_width, self.source_height)
    }
}

/// Size-bounded JPEG compressor
pub struct ImageCompressor<E: RasterEncoder = JpegRasterEncoder> {
    config: CompressionConfig,
    encoder: Arc<E>,
}

impl<E: RasterEncoder> Clone for ImageCompressor<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            encoder: Arc::clone(&self.encoder),
        }
    }
}

impl ImageCompressor<JpegRasterEncoder> {
    pub fn new(config: CompressionConfig) -> CompressionResult<Self> {
        Self::with_encoder(config, JpegRasterEncoder)
    }
}

impl<E: RasterEncoder> ImageCompressor<E> {
    pub fn with_encoder(config: CompressionConfig, encoder: E) -> CompressionResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            encoder: Arc::new(encoder),
        })
    }

    pub fn config(&self) -> &CompressionConfig {
        &self.config
    }

    /// Run the full pipeline on `source`
    ///
    /// Decode and render run on the blocking pool; the encode loop runs one
    /// encode at a time from the same raster.
    pub async fn compress(&self, source: SourceImage) -> CompressionResult<CompressedImage> {
        let label = source.label();
        let input_len = source.len();
        let max_dimension = self.config.max_dimension;

        let scope = DecodeScope::new(source.bytes, label.clone());
        let (raster, source_width, source_height) = tokio::task::spawn_blocking(move || {
            let decoded = scope.decode()?;
            let (source_width, source_height) = (decoded.width(), decoded.height());
            let (width, height) = target_dimensions(source_width, source_height, max_dimension);
            Ok::<_, CompressionError>((render(decoded, width, height), source_width, source_height))
        })
        .await
        .map_err(|e| CompressionError::Task(e.to_string()))??;

        let raster = Arc::new(raster);
        let (width, height) = raster.dimensions();
        debug!(
            "Compressing '{}' ({}): {}x{} -> {}x{}",
            label,
            format_bytes(input_len),
            source_width,
            source_height,
            width,
            height
        );

        let mut attempts = Vec::new();
        let mut best: Option<(f32, Vec<u8>)> = None;

        for quality in self.config.schedule() {
            let encoded = self.encode(Arc::clone(&raster), quality).await?;
            attempts.push(quality);

            let fits = encoded.len() <= self.config.max_size_bytes;
            debug!(
                "Encoded '{}' at quality {:.2}: {} (budget {})",
                label,
                quality,
                format_bytes(encoded.len()),
                format_bytes(self.config.max_size_bytes)
            );
            best = Some((quality, encoded));

            if fits {
                break;
            }
        }

        let (quality, encoded) = best.ok_or_else(|| {
            CompressionError::InvalidConfig("quality schedule produced no attempts".to_string())
        })?;

        if encoded.len() > self.config.max_size_bytes {
            debug!(
                "'{}' still exceeds budget at quality floor {:.2}; returning best effort",
                label, quality
            );
        }

        Ok(CompressedImage {
            bytes: Bytes::from(encoded),
            width,
            height,
            source_width,
            source_height,
            quality,
            attempts,
        })
    }

    async fn encode(&self, raster: Arc<RgbImage>, quality: f32) -> CompressionResult<Vec<u8>> {
        let encoder = Arc::clone(&self.encoder);
        tokio::task::spawn_blocking(move || encoder.encode(&raster, quality))
            .await
            .map_err(|e| CompressionError::Task(e.to_string()))?
    }
}

/// Compress with the default quality schedule and custom size/dimension bounds
pub async fn compress_image(
    source: SourceImage,
    max_size_bytes: usize,
    max_dimension: u32,
) -> CompressionResult<CompressedImage> {
    let compressor = ImageCompressor::new(CompressionConfig {
        max_size_bytes,
        max_dimension,
        ..CompressionConfig::default()
    })?;
    compressor.compress(source).await
}
