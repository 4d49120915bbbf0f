//! Decode-once, resize-N, encode-N transcoding.

use std::sync::Arc;

use crate::config::{LimitsConfig, TranscodeConfig};
use crate::error::PipelineError;
use crate::types::VariantFormat;

use super::decode::{DecodedImage, ImageDecoder};
use super::validate::Validator;
use super::{encode, resize};

/// Turns source bytes into encoded variants.
///
/// `decode` is async because it runs on the blocking pool under a timeout;
/// `resize` and `encode` are CPU-bound and synchronous, and `render` runs both
/// on the blocking pool for one variant.
pub struct Transcoder {
    validator: Validator,
    decoder: ImageDecoder,
    max_dimension: u32,
    jpeg_quality: u8,
}

impl Transcoder {
    /// Create a transcoder with the given limits and encoder settings.
    pub fn new(limits: LimitsConfig, transcode: &TranscodeConfig) -> Self {
        Self {
            max_dimension: limits.max_image_dimension,
            validator: Validator::new(limits.clone()),
            decoder: ImageDecoder::new(limits, transcode.apply_orientation),
            jpeg_quality: transcode.jpeg_quality,
        }
    }

    /// Validate and decode source bytes.
    ///
    /// Fails with `UnsupportedFormat` or `CorruptData` when the bytes are not
    /// an image; neither is worth retrying.
    pub async fn decode(&self, bytes: Vec<u8>) -> Result<DecodedImage, PipelineError> {
        self.validator.validate(&bytes)?;
        self.decoder.decode(bytes).await
    }

    /// Resize to `target_width`, preserving aspect ratio.
    pub fn resize(&self, image: &DecodedImage, target_width: u32) -> DecodedImage {
        resize::resize(image, target_width)
    }

    /// Encode an image as `format`.
    pub fn encode(
        &self,
        image: &DecodedImage,
        format: VariantFormat,
    ) -> Result<Vec<u8>, PipelineError> {
        encode::encode(&image.image, format, self.jpeg_quality)
    }

    /// Check that a `target_width` variant of `source` stays within the
    /// dimension limit before any pixels are allocated.
    pub fn check_variant_size(
        &self,
        source: &DecodedImage,
        target_width: u32,
    ) -> Result<(), PipelineError> {
        let width = target_width.max(1);
        let height = resize::scaled_height(source.width, source.height, width);
        if width > self.max_dimension || height > self.max_dimension {
            return Err(PipelineError::ImageTooLarge {
                width,
                height,
                max_dim: self.max_dimension,
            });
        }
        Ok(())
    }

    /// Resize and encode one variant on the blocking pool.
    ///
    /// Fails with `ImageTooLarge` when the variant would exceed the dimension
    /// limit, which upscaling a narrow source can do.
    pub async fn render(
        &self,
        source: Arc<DecodedImage>,
        target_width: u32,
        format: VariantFormat,
    ) -> Result<Vec<u8>, PipelineError> {
        self.check_variant_size(&source, target_width)?;
        let jpeg_quality = self.jpeg_quality;
        tokio::task::spawn_blocking(move || {
            let resized = resize::resize(&source, target_width);
            encode::encode(&resized.image, format, jpeg_quality)
        })
        .await
        .map_err(|e| PipelineError::Encode {
            width: target_width,
            message: format!("Render task failed: {}", e),
        })?
    }
}
