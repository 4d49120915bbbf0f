//! Cheap checks on fetched bytes before a full decode.

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Validates source bytes before decoding.
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Reject oversized sources and bytes with no recognizable image signature.
    pub fn validate(&self, bytes: &[u8]) -> Result<(), PipelineError> {
        let max_bytes = self.limits.max_file_size_mb * 1024 * 1024;
        if bytes.len() as u64 > max_bytes {
            return Err(PipelineError::SourceTooLarge {
                size_mb: bytes.len() as u64 / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        if bytes.len() < 4 {
            return Err(PipelineError::CorruptData {
                message: "Source too small to be a valid image".to_string(),
            });
        }

        if !Self::is_valid_image_header(bytes) {
            return Err(PipelineError::UnsupportedFormat {
                message: "Unrecognized image format (invalid magic bytes)".to_string(),
            });
        }

        Ok(())
    }

    /// Check if the leading bytes match a known image format.
    fn is_valid_image_header(header: &[u8]) -> bool {
        match header {
            // JPEG
            [0xFF, 0xD8, 0xFF, ..] => true,
            // PNG
            [0x89, b'P', b'N', b'G', ..] => true,
            // GIF
            [b'G', b'I', b'F', b'8', ..] => true,
            // WebP: RIFF....WEBP
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => true,
            // Truncated RIFF header, let the decoder decide
            [b'R', b'I', b'F', b'F', rest @ ..] if rest.len() < 8 => true,
            // BMP
            [b'B', b'M', ..] => true,
            // TIFF, little- and big-endian
            [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => true,
            // HEIC/HEIF/AVIF: ftyp box at offset 4
            [_, _, _, _, b'f', b't', b'y', b'p', _, _, _, _, ..] => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> Validator {
        Validator::new(LimitsConfig::default())
    }

    #[test]
    fn test_magic_bytes_jpeg() {
        let header = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
        assert!(Validator::is_valid_image_header(&header));
    }

    #[test]
    fn test_magic_bytes_png() {
        let header = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        assert!(Validator::is_valid_image_header(&header));
    }

    #[test]
    fn test_magic_bytes_webp() {
        let header = [b'R', b'I', b'F', b'F', 0, 0, 0, 0, b'W', b'E', b'B', b'P'];
        assert!(Validator::is_valid_image_header(&header));
    }

    #[test]
    fn test_riff_without_webp_rejected() {
        let header = [b'R', b'I', b'F', b'F', 0, 0, 0, 0, b'W', b'A', b'V', b'E'];
        assert!(!Validator::is_valid_image_header(&header));
    }

    #[test]
    fn test_bare_tiff_marker_rejected() {
        let header = [b'I', b'I', 0x00, 0x00, 0, 0, 0, 0];
        assert!(!Validator::is_valid_image_header(&header));
    }

    #[test]
    fn test_text_is_unsupported() {
        let err = validator().validate(b"hello, world").unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_tiny_source_is_corrupt() {
        let err = validator().validate(&[0xFF, 0xD8]).unwrap_err();
        assert!(matches!(err, PipelineError::CorruptData { .. }));
    }

    #[test]
    fn test_oversized_source_rejected() {
        let limits = LimitsConfig {
            max_file_size_mb: 1,
            ..LimitsConfig::default()
        };
        let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        bytes.resize(2 * 1024 * 1024, 0);
        let err = Validator::new(limits).validate(&bytes).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::SourceTooLarge {
                size_mb: 2,
                max_mb: 1
            }
        ));
    }
}
