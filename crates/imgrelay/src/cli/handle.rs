//! The `imgrelay handle` command: one push-trigger invocation.
//!
//! Reads an SQS event (as a function runtime would deliver it), processes
//! every message, and prints the partial batch response on stdout so only
//! the unacknowledged messages are redelivered.

use anyhow::Context;
use clap::Args;
use imgrelay_core::{BatchConsumer, Config, Orchestrator, OutputFormat, OutputWriter};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use super::setup;

/// Arguments for the `handle` command.
#[derive(Args, Debug)]
pub struct HandleArgs {
    /// File containing the SQS event JSON (reads stdin if omitted)
    #[arg(short, long)]
    pub event: Option<PathBuf>,
}

fn read_event(path: Option<&PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(path) => {
            let path = setup::expand_path(path);
            std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read event from {}", path.display()))
        }
        None => {
            let mut event = String::new();
            std::io::stdin()
                .read_to_string(&mut event)
                .context("Failed to read event from stdin")?;
            Ok(event)
        }
    }
}

/// Execute the handle command.
pub async fn execute(args: HandleArgs, config: Config) -> anyhow::Result<()> {
    setup::require_valid(&config)?;

    let event = read_event(args.event.as_ref())?;
    let consumer = Arc::new(BatchConsumer::from_json(&event)?);
    tracing::info!(messages = consumer.outstanding(), "Handling batch");

    let sdk_config = imgrelay_core::aws::load_sdk_config(&config.aws).await;
    let orchestrator = Orchestrator::from_config(
        &config,
        consumer.clone(),
        setup::object_store(&config, &sdk_config),
        setup::dead_letter_sink(&config),
    );

    // A fatal failure fails the whole invocation so the runtime retries the batch
    let deliveries = orchestrator.drain().await?;

    let response = consumer.response();
    tracing::info!(
        processed = deliveries.len(),
        failures = response.batch_item_failures.len(),
        "Batch handled"
    );

    let mut writer = OutputWriter::new(std::io::stdout().lock(), OutputFormat::Json);
    writer.record(&response)?;
    writer.flush()?;
    Ok(())
}
