//! Raster encoders used by the compression pipeline

use image::{RgbImage, codecs::jpeg::JpegEncoder};

use crate::errors::{CompressionError, CompressionResult};

/// Encodes a rendered raster at a given quality in `[0, 1]`
///
/// The pipeline only depends on this trait, which keeps the quality search
/// testable without real JPEG output sizes.
pub trait RasterEncoder: Send + Sync + 'static {
    fn encode(&self, raster: &RgbImage, quality: f32) -> CompressionResult<Vec<u8>>;
}

/// Baseline JPEG encoder backed by the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegRasterEncoder;

/// Map a `[0, 1]` quality onto the encoder's `1..=100` scale
pub fn jpeg_quality(quality: f32) -> u8 {
    ((quality * 100.0).round() as i32).clamp(1, 100) as u8
}

impl RasterEncoder for JpegRasterEncoder {
    fn encode(&self, raster: &RgbImage, quality: f32) -> CompressionResult<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality(quality));

        raster
            .write_with_encoder(encoder)
            .map_err(|e| CompressionError::Encode(e.to_string()))?;

        if buffer.is_empty() {
            return Err(CompressionError::Encode(
                "encoder produced an empty buffer".to_string(),
            ));
        }

        Ok(buffer)
    }
}
