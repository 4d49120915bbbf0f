//! Transcoding pipeline components.
//!
//! Stages, leaves first:
//! - **validate**: Size limit and magic-byte sniffing before decoding
//! - **decode**: Decode once on the blocking pool, with timeout and dimension limits
//! - **orientation**: EXIF orientation correction
//! - **resize**: Aspect-preserving Lanczos3 resize
//! - **encode**: JPEG/PNG encoding
//! - **transcoder**: Decode-once, render-per-variant facade over the above
//! - **coordinator**: Fetch, transcode and upload every variant of one object
//! - **hash**: Source content digest
//! - **retry**: Backoff schedules for store calls and redelivery

pub mod coordinator;
pub mod decode;
pub mod encode;
pub mod hash;
pub mod orientation;
pub mod resize;
pub mod retry;
pub mod transcoder;
pub mod validate;

pub use coordinator::DeliveryCoordinator;
pub use decode::{DecodedImage, ImageDecoder};
pub use transcoder::Transcoder;
pub use validate::Validator;
