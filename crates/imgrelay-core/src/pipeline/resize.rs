//! Width-targeted resizing that preserves aspect ratio.

use image::imageops::FilterType;

use super::decode::DecodedImage;

/// Height of a `target_width` variant of a `width`x`height` image.
///
/// Rounds to the nearest pixel and never returns 0.
pub fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    if width == 0 {
        return height.max(1);
    }
    let scaled = (height as f64 * target_width as f64 / width as f64).round();
    (scaled as u32).max(1)
}

/// Resize to exactly `target_width` pixels wide with a Lanczos3 filter.
///
/// Upscales when the source is narrower than the target. The result keeps the
/// source format so variants stay traceable to their origin.
pub fn resize(source: &DecodedImage, target_width: u32) -> DecodedImage {
    let target_width = target_width.max(1);
    let target_height = scaled_height(source.width, source.height, target_width);
    let image = source
        .image
        .resize_exact(target_width, target_height, FilterType::Lanczos3);
    DecodedImage::new(image, source.format, source.source_size)
}
