//! Configuration management for imgrelay.
//!
//! Configuration is loaded from a TOML file with defaults for every section.
//! Container names and the queue URL can be overridden from the environment.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use crate::types::{NamingRule, VariantSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding `source.container`.
pub const ENV_SOURCE_CONTAINER: &str = "IMGRELAY_SOURCE_CONTAINER";
/// Environment variable overriding `destination.container`.
pub const ENV_DESTINATION_CONTAINER: &str = "IMGRELAY_DESTINATION_CONTAINER";
/// Environment variable overriding `queue.url`.
pub const ENV_QUEUE_URL: &str = "IMGRELAY_QUEUE_URL";

/// Root configuration structure for imgrelay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source store settings
    pub source: SourceConfig,

    /// Destination store settings
    pub destination: DestinationConfig,

    /// Encoder settings
    pub transcode: TranscodeConfig,

    /// Concurrency, batching and retry settings
    pub pipeline: PipelineConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Pull-loop queue settings
    pub queue: QueueConfig,

    /// AWS client settings
    pub aws: AwsConfig,

    /// Dead-letter sink settings
    pub dead_letter: DeadLetterConfig,

    /// Logging settings
    pub logging: LoggingConfig,

    /// Variant catalog
    pub variants: Vec<VariantConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            destination: DestinationConfig::default(),
            transcode: TranscodeConfig::default(),
            pipeline: PipelineConfig::default(),
            limits: LimitsConfig::default(),
            queue: QueueConfig::default(),
            aws: AwsConfig::default(),
            dead_letter: DeadLetterConfig::default(),
            logging: LoggingConfig::default(),
            variants: default_variants(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration (plus environment overrides) if the file
    /// doesn't exist. Defaults are not validated: the destination container
    /// has no sensible default.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string without validating it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Get the default config file path.
    ///
    /// Uses platform-appropriate directories, falling back to
    /// `~/.imgrelay/config.toml` if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("dev", "imgrelay", "imgrelay")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".imgrelay").join("config.toml")
            })
    }

    /// Override container names and queue URL from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(container) = std::env::var(ENV_SOURCE_CONTAINER) {
            self.source.container = container;
        }
        if let Ok(container) = std::env::var(ENV_DESTINATION_CONTAINER) {
            self.destination.container = container;
        }
        if let Ok(url) = std::env::var(ENV_QUEUE_URL) {
            self.queue.url = url;
        }
    }

    /// Get the resolved dead-letter path (with ~ expansion).
    pub fn dead_letter_path(&self) -> PathBuf {
        let path_str = self.dead_letter.path.to_string_lossy();
        let expanded = shellexpand::tilde(&path_str);
        PathBuf::from(expanded.into_owned())
    }

    /// Build the variant catalog with the destination naming rule applied.
    pub fn variant_specs(&self) -> Vec<VariantSpec> {
        self.variants
            .iter()
            .map(|v| {
                let rule = NamingRule {
                    prefix: self.destination.prefix.clone(),
                    extension: v.extension.clone(),
                };
                VariantSpec::new(v.width, v.format, rule)
            })
            .collect()
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{VariantFormat, Visibility};

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pipeline.concurrency, 4);
        assert_eq!(config.pipeline.batch_size, 10);
        assert_eq!(config.limits.max_file_size_mb, 100);
        let widths: Vec<u32> = config.variants.iter().map(|v| v.width).collect();
        assert_eq!(widths, vec![100, 500, 1000]);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[destination]"));
        assert!(toml.contains("[pipeline]"));
        assert!(toml.contains("[[variants]]"));
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = Config::from_toml(
            r#"
            [destination]
            container = "resized"
            prefix = "resized/"
            visibility = "public-read"

            [[variants]]
            width = 320

            [[variants]]
            width = 640
            format = "png"
            "#,
        )
        .unwrap();

        assert_eq!(config.destination.visibility, Visibility::PublicRead);
        assert_eq!(config.pipeline.concurrency, 4);
        assert_eq!(config.variants.len(), 2);
        assert_eq!(config.variants[0].format, VariantFormat::Jpeg);
        assert_eq!(config.variants[1].format, VariantFormat::Png);
    }

    #[test]
    fn test_variant_specs_apply_prefix() {
        let mut config = Config::default();
        config.destination.prefix = "resized/".to_string();
        let specs = config.variant_specs();
        let object = crate::types::ObjectReference::new("uploads", "cat.png");
        assert_eq!(specs[0].destination_key(&object), "resized/cat.png/100.jpg");
        assert_eq!(specs[2].destination_key(&object), "resized/cat.png/1000.jpg");
    }

    #[test]
    fn test_toml_roundtrip_keeps_catalog() {
        let mut config = Config::default();
        config.destination.container = "out".to_string();
        let parsed = Config::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed.variants, config.variants);
        assert_eq!(parsed.destination.container, "out");
    }
}
