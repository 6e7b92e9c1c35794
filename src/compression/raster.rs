//! Decode and render stages of the compression pipeline

use std::io::Cursor;

use bytes::Bytes;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage, imageops::FilterType};
use tracing::trace;

use crate::errors::{CompressionError, CompressionResult};

/// Compute output dimensions that fit inside `max_dimension` on both sides
///
/// Returns the input unchanged when it already fits; never upscales. Both
/// sides are scaled by the same factor and rounded to the nearest pixel.
pub fn target_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width <= max_dimension && height <= max_dimension {
        return (width, height);
    }

    let ratio = f64::min(
        max_dimension as f64 / width as f64,
        max_dimension as f64 / height as f64,
    );
    let scaled = |side: u32| ((side as f64 * ratio).round() as u32).clamp(1, max_dimension);

    (scaled(width), scaled(height))
}

/// Owns the encoded input for exactly as long as decoding needs it
///
/// `decode` consumes the scope, so the encoded buffer is released as soon as the
/// raster exists, whether decoding succeeded or not.
pub(crate) struct DecodeScope {
    encoded: Bytes,
    label: String,
}

impl DecodeScope {
    pub(crate) fn new(encoded: Bytes, label: String) -> Self {
        Self { encoded, label }
    }

    pub(crate) fn decode(self) -> CompressionResult<DynamicImage> {
        let decode_error = |e: image::ImageError| CompressionError::Decode(e.to_string());

        let reader = ImageReader::new(Cursor::new(self.encoded.as_ref()))
            .with_guessed_format()
            .map_err(|e| CompressionError::Decode(e.to_string()))?;
        if reader.format().is_none() {
            return Err(CompressionError::Decode(format!(
                "unrecognised image format for '{}'",
                self.label
            )));
        }

        let mut decoder = reader.into_decoder().map_err(decode_error)?;
        let orientation = decoder.orientation().map_err(decode_error)?;
        let mut image = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
        image.apply_orientation(orientation);

        trace!(
            "Decoded '{}' ({} encoded bytes) into {}x{} raster",
            self.label,
            self.encoded.len(),
            image.width(),
            image.height()
        );

        Ok(image)
    }
}

/// Draw the decoded image onto an RGB surface of the target size
///
/// JPEG has no alpha channel, so any transparency is dropped here.
pub(crate) fn render(image: DynamicImage, width: u32, height: u32) -> RgbImage {
    if image.width() == width && image.height() == height {
        image.into_rgb8()
    } else {
        image.resize_exact(width, height, FilterType::Triangle).into_rgb8()
    }
}
