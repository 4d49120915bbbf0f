//! Image decoding with format detection, limits, and timeout support.

use image::{DynamicImage, GenericImageView, ImageError, ImageFormat, ImageReader, Limits};
use std::io::Cursor;
use std::time::Duration;
use tokio::time::timeout;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

use super::orientation;

/// Image decoder with configurable limits and timeout.
pub struct ImageDecoder {
    limits: LimitsConfig,
    apply_orientation: bool,
}

/// An in-memory pixel buffer.
///
/// Owned by a single delivery coordinator invocation; never cached.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    /// The decoded image data
    pub image: DynamicImage,
    /// Format the source was encoded in
    pub format: ImageFormat,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Size of the encoded source in bytes
    pub source_size: u64,
}

impl DecodedImage {
    /// Wrap a decoded image, reading its dimensions.
    pub fn new(image: DynamicImage, format: ImageFormat, source_size: u64) -> Self {
        let (width, height) = image.dimensions();
        Self {
            image,
            format,
            width,
            height,
            source_size,
        }
    }
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig, apply_orientation: bool) -> Self {
        Self {
            limits,
            apply_orientation,
        }
    }

    /// Decode an in-memory byte buffer on the blocking pool, bounded by the decode timeout.
    ///
    /// A timed-out decode still holds its caller until the blocking task
    /// finishes, so the worker's pool slot covers the CPU and memory it uses.
    pub async fn decode(&self, bytes: Vec<u8>) -> Result<DecodedImage, PipelineError> {
        let timeout_ms = self.limits.decode_timeout_ms;
        let apply_orientation = self.apply_orientation;
        let max_dim = self.limits.max_image_dimension;

        let mut task = tokio::task::spawn_blocking(move || {
            Self::decode_sync(bytes, apply_orientation, max_dim)
        });

        let joined = match timeout(Duration::from_millis(timeout_ms), &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(timeout_ms, "Decode timed out, waiting for the blocking task to finish");
                let _ = task.await;
                return Err(PipelineError::Timeout {
                    stage: "decode".to_string(),
                    timeout_ms,
                });
            }
        };

        joined.map_err(|e| PipelineError::CorruptData {
            message: format!("Decode task failed: {}", e),
        })?
    }

    /// Synchronous decode (runs in spawn_blocking).
    ///
    /// Dimensions are read from the header and checked against `max_dim`
    /// before any pixel buffer is allocated.
    pub(crate) fn decode_sync(
        bytes: Vec<u8>,
        apply_orientation: bool,
        max_dim: u32,
    ) -> Result<DecodedImage, PipelineError> {
        let source_size = bytes.len() as u64;
        let orientation = if apply_orientation {
            orientation::read_orientation(&bytes)
        } else {
            None
        };

        let (width, height) = open_reader(&bytes)?
            .into_dimensions()
            .map_err(|e| classify_decode_error(e, (0, 0), max_dim))?;
        if width > max_dim || height > max_dim {
            return Err(PipelineError::ImageTooLarge {
                width,
                height,
                max_dim,
            });
        }

        let mut reader = open_reader(&bytes)?;
        let format = reader
            .format()
            .ok_or_else(|| PipelineError::UnsupportedFormat {
                message: "Cannot detect image format".to_string(),
            })?;
        let mut limits = Limits::default();
        limits.max_image_width = Some(max_dim);
        limits.max_image_height = Some(max_dim);
        reader.limits(limits);

        let mut image = reader
            .decode()
            .map_err(|e| classify_decode_error(e, (width, height), max_dim))?;
        if let Some(orientation) = orientation {
            tracing::trace!("Applying EXIF orientation {}", orientation);
            image = orientation::apply_orientation(image, orientation);
        }

        Ok(DecodedImage::new(image, format, source_size))
    }
}

fn open_reader(bytes: &[u8]) -> Result<ImageReader<Cursor<&[u8]>>, PipelineError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| PipelineError::CorruptData {
            message: format!("Cannot read image header: {}", e),
        })?;
    if reader.format().is_none() {
        return Err(PipelineError::UnsupportedFormat {
            message: "Cannot detect image format".to_string(),
        });
    }
    Ok(reader)
}

fn classify_decode_error(
    error: ImageError,
    (width, height): (u32, u32),
    max_dim: u32,
) -> PipelineError {
    match error {
        ImageError::Unsupported(e) => PipelineError::UnsupportedFormat {
            message: e.to_string(),
        },
        ImageError::Limits(_) => PipelineError::ImageTooLarge {
            width,
            height,
            max_dim,
        },
        other => PipelineError::CorruptData {
            message: other.to_string(),
        },
    }
}
