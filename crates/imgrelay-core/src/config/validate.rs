//! Configuration validation with range checks.

use std::collections::HashSet;

use crate::error::ConfigError;
use crate::types::ObjectReference;

use super::Config;

/// SQS accepts at most this many messages per receive.
const MAX_BATCH_SIZE: usize = 10;

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.destination.container.trim().is_empty() {
            return Err(invalid("destination.container must be set"));
        }
        if self.source.container == self.destination.container
            && self.destination.prefix.is_empty()
        {
            return Err(invalid(
                "destination.prefix must be set when source and destination share a bucket, \
                 or variant uploads would be processed as new sources",
            ));
        }
        if self.pipeline.concurrency == 0 {
            return Err(invalid("pipeline.concurrency must be > 0"));
        }
        if self.pipeline.batch_size == 0 || self.pipeline.batch_size > MAX_BATCH_SIZE {
            return Err(invalid("pipeline.batch_size must be between 1 and 10"));
        }
        if self.pipeline.max_attempts == 0 {
            return Err(invalid("pipeline.max_attempts must be > 0"));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(invalid("limits.max_file_size_mb must be > 0"));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(invalid("limits.max_image_dimension must be > 0"));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(invalid("limits.decode_timeout_ms must be > 0"));
        }
        if !(1..=100).contains(&self.transcode.jpeg_quality) {
            return Err(invalid("transcode.jpeg_quality must be between 1 and 100"));
        }
        if !(0..=20).contains(&self.queue.wait_time_secs) {
            return Err(invalid("queue.wait_time_secs must be between 0 and 20"));
        }
        if let Some(timeout) = self.queue.visibility_timeout_secs {
            if !(0..=43_200).contains(&timeout) {
                return Err(invalid(
                    "queue.visibility_timeout_secs must be between 0 and 43200",
                ));
            }
        }
        self.validate_variants()
    }

    /// The catalog must be non-empty and map every variant to its own key.
    fn validate_variants(&self) -> Result<(), ConfigError> {
        if self.variants.is_empty() {
            return Err(invalid("variants must contain at least one entry"));
        }
        if self.variants.iter().any(|v| v.width == 0) {
            return Err(invalid("variants.width must be > 0"));
        }
        if self.variants.iter().any(|v| v.width > self.limits.max_image_dimension) {
            return Err(invalid(
                "variants.width must not exceed limits.max_image_dimension",
            ));
        }

        let sample = ObjectReference::new("sample", "sample");
        let mut seen = HashSet::new();
        for spec in self.variant_specs() {
            let key = spec.destination_key(&sample);
            if !seen.insert(key) {
                return Err(ConfigError::ValidationError(format!(
                    "variants: {}px {:?} collides with another variant's destination key",
                    spec.target_width, spec.format
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VariantConfig;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.destination.container = "resized".to_string();
        config
    }

    #[test]
    fn test_valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_default_config_requires_destination() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("destination.container"));
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = valid_config();
        config.pipeline.concurrency = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_validate_rejects_oversized_batch() {
        let mut config = valid_config();
        config.pipeline.batch_size = 11;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_validate_rejects_zero_attempts() {
        let mut config = valid_config();
        config.pipeline.max_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_validate_rejects_invalid_quality() {
        let mut config = valid_config();
        config.transcode.jpeg_quality = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("jpeg_quality"));
    }

    #[test]
    fn test_validate_rejects_zero_width() {
        let mut config = valid_config();
        config.variants.push(VariantConfig::jpeg(0));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("width"));
    }

    #[test]
    fn test_validate_rejects_colliding_variants() {
        let mut config = valid_config();
        config.variants.push(VariantConfig::jpeg(500));
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("collides"));
    }

    #[test]
    fn test_same_width_different_extension_is_allowed() {
        let mut config = valid_config();
        config.variants.push(VariantConfig {
            width: 500,
            format: crate::types::VariantFormat::Png,
            extension: None,
        });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_shared_bucket_requires_prefix() {
        let mut config = valid_config();
        config.source.container = "resized".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("destination.prefix"));

        config.destination.prefix = "variants/".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_catalog() {
        let mut config = valid_config();
        config.variants.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }
}
