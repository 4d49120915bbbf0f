//! imgrelay core - queue-driven image variant pipeline.
//!
//! Objects uploaded to a source store produce notifications. For each one the
//! pipeline fetches the original, decodes it once, renders a fixed catalog of
//! resized variants, writes them to a destination store, and acknowledges the
//! notification only once every variant is persisted or the retry policy is
//! exhausted.
//!
//! # Architecture
//!
//! ```text
//! Consumer → Orchestrator → DeliveryCoordinator → ObjectStore
//!                 │                 │
//!                 │                 └─ Transcoder: decode once → resize N → encode N
//!                 └─ ack / release / dead-letter
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use imgrelay_core::{Config, JsonlDeadLetter, Orchestrator, S3Store, SqsConsumer};
//!
//! #[tokio::main]
//! async fn main() -> imgrelay_core::Result<()> {
//!     let config = Config::load()?;
//!     let sdk = imgrelay_core::aws::load_sdk_config(&config.aws).await;
//!     let orchestrator = Orchestrator::from_config(
//!         &config,
//!         Arc::new(SqsConsumer::from_sdk_config(&sdk, &config.queue)),
//!         Arc::new(S3Store::from_sdk_config(&sdk, false)),
//!         Arc::new(JsonlDeadLetter::new(config.dead_letter_path())),
//!     );
//!     let (_tx, rx) = tokio::sync::watch::channel(false);
//!     orchestrator.run(rx).await?;
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod aws;
pub mod config;
pub mod consumer;
pub mod dead_letter;
pub mod error;
pub mod orchestrator;
pub mod output;
pub mod pipeline;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use config::Config;
pub use consumer::{BatchConsumer, BatchResponse, Consumer, MemoryConsumer, SqsConsumer};
pub use dead_letter::{
    DeadLetterReason, DeadLetterRecord, DeadLetterSink, JsonlDeadLetter, MemoryDeadLetter,
};
pub use error::{
    ConfigError, ConsumerError, DeadLetterError, ErrorClass, PipelineError, PipelineResult,
    RelayError, Result,
};
pub use orchestrator::{Delivery, Orchestrator, OrchestratorOptions, Tally};
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{DeliveryCoordinator, Transcoder};
pub use store::{MemoryStore, ObjectStore, PutOptions, S3Store};
pub use types::{
    Disposition, NamingRule, Notification, ObjectReference, OutcomeReport, Overall,
    ProcessingOutcome, Receipt, VariantFormat, VariantSpec, Visibility,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_catalog_matches_default_widths() {
        let widths: Vec<u32> = Config::default()
            .variant_specs()
            .iter()
            .map(|s| s.target_width)
            .collect();
        assert_eq!(widths, vec![100, 500, 1000]);
    }
}
