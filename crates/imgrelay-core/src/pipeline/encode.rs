//! Variant encoding.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

use crate::error::PipelineError;
use crate::types::VariantFormat;

/// Encode `image` as `format`.
///
/// JPEG has no alpha channel, so images are flattened to RGB first.
pub fn encode(
    image: &DynamicImage,
    format: VariantFormat,
    jpeg_quality: u8,
) -> Result<Vec<u8>, PipelineError> {
    let mut buffer = Vec::new();
    let result = match format {
        VariantFormat::Jpeg => {
            let rgb = image.to_rgb8();
            JpegEncoder::new_with_quality(&mut buffer, jpeg_quality).encode_image(&rgb)
        }
        VariantFormat::Png => image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png),
    };

    result.map_err(|e| PipelineError::Encode {
        width: image.width(),
        message: e.to_string(),
    })?;
    Ok(buffer)
}
