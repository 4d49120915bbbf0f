//! Error types for the imgrelay pipeline.
//!
//! Store and transcoder failures share one taxonomy ([`PipelineError`]) so the
//! delivery coordinator can classify every failure before the orchestrator
//! decides whether a notification is acknowledged.

use thiserror::Error;

/// Top-level error type for imgrelay operations.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Notification queue errors
    #[error("Consumer error: {0}")]
    Consumer(#[from] ConsumerError),

    /// Dead-letter sink errors
    #[error("Dead-letter error: {0}")]
    DeadLetter(#[from] DeadLetterError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// How the orchestrator should treat a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Redelivery may succeed (network, throttling, timeouts).
    Retryable,
    /// Redelivery cannot help; the object is permanently failed.
    Permanent,
    /// Authorization or configuration problem; stop the orchestrator.
    Fatal,
}

/// Store and transcoder failures for one object or variant.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Source object does not exist
    #[error("Object not found: {container}/{key}")]
    NotFound { container: String, key: String },

    /// Network, timeout, throttling or server-side failure talking to a store
    #[error("Transient {operation} failure for {target}: {message}")]
    TransientIo {
        operation: &'static str,
        target: String,
        message: String,
    },

    /// Authorization or configuration failure talking to a store
    #[error("Fatal {operation} failure for {target}: {message}")]
    Fatal {
        operation: &'static str,
        target: String,
        message: String,
    },

    /// Bytes are not in an image format the transcoder understands
    #[error("Unsupported image format: {message}")]
    UnsupportedFormat { message: String },

    /// Bytes claim to be an image but cannot be decoded
    #[error("Corrupt image data: {message}")]
    CorruptData { message: String },

    /// Encoding a resized variant failed
    #[error("Encode failed for {width}px variant: {message}")]
    Encode { width: u32, message: String },

    /// Decoded dimensions exceed the configured limit
    #[error("Image too large: {width}x{height} > {max_dim}")]
    ImageTooLarge {
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Source object exceeds the configured size limit
    #[error("Source too large: {size_mb}MB > {max_mb}MB")]
    SourceTooLarge { size_mb: u64, max_mb: u64 },

    /// Operation timed out
    #[error("Timeout in {stage} stage after {timeout_ms}ms")]
    Timeout { stage: String, timeout_ms: u64 },
}

impl PipelineError {
    /// Classify this failure for acknowledgment decisions.
    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::TransientIo { .. } | PipelineError::Timeout { .. } => {
                ErrorClass::Retryable
            }
            PipelineError::Fatal { .. } => ErrorClass::Fatal,
            PipelineError::NotFound { .. }
            | PipelineError::UnsupportedFormat { .. }
            | PipelineError::CorruptData { .. }
            | PipelineError::Encode { .. }
            | PipelineError::ImageTooLarge { .. }
            | PipelineError::SourceTooLarge { .. } => ErrorClass::Permanent,
        }
    }

    /// Whether redelivering the notification could succeed.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    /// Whether this failure must halt the orchestrator.
    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::Fatal
    }

    /// Encoder failures point at a transcoder bug rather than bad input.
    pub fn needs_operator(&self) -> bool {
        matches!(self, PipelineError::Encode { .. })
    }
}

/// Notification queue errors.
#[derive(Error, Debug)]
pub enum ConsumerError {
    /// The queue call failed but may succeed later
    #[error("Queue {operation} failed: {message}")]
    Transient {
        operation: &'static str,
        message: String,
    },

    /// The queue rejected the call (missing queue, denied access)
    #[error("Queue {operation} rejected: {message}")]
    Fatal {
        operation: &'static str,
        message: String,
    },

    /// A trigger event could not be parsed
    #[error("Malformed trigger event: {0}")]
    Event(#[from] serde_json::Error),
}

impl ConsumerError {
    /// Whether the receive loop should stop instead of backing off.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConsumerError::Fatal { .. })
    }
}

/// Dead-letter sink errors.
#[derive(Error, Debug)]
pub enum DeadLetterError {
    /// Writing the record failed
    #[error("Failed to write dead-letter record: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing the record failed
    #[error("Failed to serialize dead-letter record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience type alias for imgrelay results.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
