//! EXIF orientation handling.
//!
//! Cameras store pixels in sensor order and record the intended rotation in
//! the `Orientation` tag; variants are produced from the upright image.

use exif::{In, Reader, Tag, Value};
use image::DynamicImage;
use std::io::Cursor;

/// Read the EXIF orientation (1-8) from encoded image bytes.
///
/// Returns `None` if the container has no EXIF block or no orientation tag.
pub fn read_orientation(bytes: &[u8]) -> Option<u32> {
    let mut cursor = Cursor::new(bytes);
    let exif = Reader::new().read_from_container(&mut cursor).ok()?;
    let field = exif.get_field(Tag::Orientation, In::PRIMARY)?;
    match &field.value {
        Value::Short(v) => v.first().map(|&x| x as u32),
        Value::Long(v) => v.first().copied(),
        _ => None,
    }
}

/// Rotate/flip `image` so that it displays upright for the given orientation.
pub fn apply_orientation(image: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => image.fliph(),
        3 => image.rotate180(),
        4 => image.flipv(),
        5 => image.rotate90().fliph(),
        6 => image.rotate90(),
        7 => image.rotate270().fliph(),
        8 => image.rotate270(),
        _ => image,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_quarter_turns_swap_dimensions() {
        for orientation in [5, 6, 7, 8] {
            let rotated = apply_orientation(DynamicImage::new_rgb8(40, 20), orientation);
            assert_eq!(rotated.dimensions(), (20, 40), "orientation {orientation}");
        }
    }

    #[test]
    fn test_other_orientations_keep_dimensions() {
        for orientation in [0, 1, 2, 3, 4, 9] {
            let image = apply_orientation(DynamicImage::new_rgb8(40, 20), orientation);
            assert_eq!(image.dimensions(), (40, 20), "orientation {orientation}");
        }
    }

    #[test]
    fn test_no_exif_in_plain_png() {
        let mut bytes = Vec::new();
        DynamicImage::new_rgb8(4, 4)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        assert_eq!(read_orientation(&bytes), None);
    }
}
