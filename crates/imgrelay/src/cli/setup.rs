//! Shared wiring: config loading and AWS-backed components.

use anyhow::Context;
use imgrelay_core::aws::SdkConfig;
use imgrelay_core::{Config, DeadLetterSink, JsonlDeadLetter, ObjectStore, S3Store};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Expand `~` in a user-supplied path.
pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

/// Load configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            let path = expand_path(path);
            Config::load_from(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => Ok(Config::load()?),
    }
}

/// Fail early on configuration that cannot process anything.
pub fn require_valid(config: &Config) -> anyhow::Result<()> {
    config.validate().with_context(|| {
        format!(
            "Configuration is incomplete.\n\n  Hint: set destination.container in {} or export {}.",
            Config::default_path().display(),
            imgrelay_core::config::ENV_DESTINATION_CONTAINER
        )
    })
}

/// S3 store for the configured region and endpoint.
pub fn object_store(config: &Config, sdk_config: &SdkConfig) -> Arc<dyn ObjectStore> {
    let path_style = config.aws.endpoint_url.is_some();
    Arc::new(S3Store::from_sdk_config(sdk_config, path_style))
}

/// JSON Lines dead-letter file from `[dead_letter]`.
pub fn dead_letter_sink(config: &Config) -> Arc<dyn DeadLetterSink> {
    let path = config.dead_letter_path();
    tracing::debug!("Dead-letter records go to {}", path.display());
    Arc::new(JsonlDeadLetter::new(path))
}
