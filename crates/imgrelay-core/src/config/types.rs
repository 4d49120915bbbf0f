//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::{VariantFormat, Visibility};

/// Where source objects are read from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Container used when a key is given without one (e.g. `imgrelay process`).
    /// Notifications carry their own container.
    pub container: String,
}

/// Where variants are written to.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// Destination container
    pub container: String,

    /// Keyspace prefix prepended to every variant key (e.g. "resized/")
    pub prefix: String,

    /// Access level of written variants ("private" or "public-read")
    pub visibility: Visibility,
}

/// One entry of the variant catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantConfig {
    /// Target width in pixels; height follows the source aspect ratio
    pub width: u32,

    /// Output encoding
    #[serde(default)]
    pub format: VariantFormat,

    /// Extension used in the destination key (defaults to the format's)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extension: Option<String>,
}

impl VariantConfig {
    pub fn jpeg(width: u32) -> Self {
        Self {
            width,
            format: VariantFormat::Jpeg,
            extension: None,
        }
    }
}

/// The catalog produced for every source image.
pub fn default_variants() -> Vec<VariantConfig> {
    vec![
        VariantConfig::jpeg(100),
        VariantConfig::jpeg(500),
        VariantConfig::jpeg(1000),
    ]
}

/// Encoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,

    /// Rotate/flip according to the EXIF orientation tag before resizing
    pub apply_orientation: bool,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 75,
            apply_orientation: true,
        }
    }
}

/// Orchestrator settings: concurrency, batching and retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Max delivery coordinator invocations running at once
    pub concurrency: usize,

    /// Max notifications requested per receive call (SQS caps this at 10)
    pub batch_size: usize,

    /// Deliveries of one notification before it is dead-lettered
    pub max_attempts: u32,

    /// In-process retries of a single transient fetch/put
    pub store_retry_attempts: u32,

    /// Base delay for exponential backoff in milliseconds
    pub retry_delay_ms: u64,

    /// Pause after an empty receive in milliseconds
    pub idle_backoff_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            batch_size: 10,
            max_attempts: 5,
            store_retry_attempts: 2,
            retry_delay_ms: 200,
            idle_backoff_ms: 500,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum source object size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum decoded image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 10000,
            decode_timeout_ms: 10000,
        }
    }
}

/// Pull-loop queue settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// SQS queue URL
    pub url: String,

    /// Long-poll wait time in seconds (0-20)
    pub wait_time_secs: i32,

    /// Visibility timeout applied to received messages; queue default if unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility_timeout_secs: Option<i32>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            wait_time_secs: 20,
            visibility_timeout_secs: None,
        }
    }
}

/// AWS client settings. Credentials come from the default provider chain.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    /// Region override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Custom endpoint (MinIO, LocalStack); enables path-style S3 addressing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
}

/// Dead-letter sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadLetterConfig {
    /// JSON Lines file that permanently failed objects are appended to
    pub path: PathBuf,
}

impl Default for DeadLetterConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.imgrelay/dead-letter.jsonl"),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,

    /// Log format (pretty, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
