//! The `imgrelay process` command: one-shot processing of source keys.

use clap::{Args, ValueEnum};
use imgrelay_core::output::OutputFormat as CoreOutputFormat;
use imgrelay_core::{
    Config, Delivery, Disposition, MemoryConsumer, ObjectReference, Orchestrator, OutputWriter,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use super::setup;

/// Report format.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// One JSON array
    Json,
    /// One JSON object per line
    #[default]
    Jsonl,
}

impl From<OutputFormat> for CoreOutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => CoreOutputFormat::Json,
            OutputFormat::Jsonl => CoreOutputFormat::JsonLines,
        }
    }
}

/// Arguments for the `process` command.
#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Source object keys
    #[arg(required = true)]
    pub keys: Vec<String>,

    /// Source bucket (overrides source.container)
    #[arg(long)]
    pub container: Option<String>,

    /// Report file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "jsonl")]
    pub format: OutputFormat,
}

/// Final delivery per object: the last attempt recorded for each receipt.
fn final_deliveries(deliveries: Vec<Delivery>) -> Vec<Delivery> {
    let mut finals: Vec<Delivery> = Vec::new();
    for delivery in deliveries {
        match finals.iter_mut().find(|d| d.receipt == delivery.receipt) {
            Some(existing) => *existing = delivery,
            None => finals.push(delivery),
        }
    }
    finals
}

/// Objects that did not end acknowledged, counting those with no delivery at
/// all (a worker that panicked settles nothing).
fn failed_count(finals: &[Delivery], expected: usize) -> usize {
    let unacknowledged = finals
        .iter()
        .filter(|d| d.disposition != Disposition::Acknowledged)
        .count();
    unacknowledged + expected.saturating_sub(finals.len())
}

/// Execute the process command.
pub async fn execute(args: ProcessArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(container) = args.container {
        config.source.container = container;
    }
    setup::require_valid(&config)?;
    if config.source.container.is_empty() {
        anyhow::bail!(
            "No source bucket configured.\n\n  Hint: set source.container, export {}, or pass --container.",
            imgrelay_core::config::ENV_SOURCE_CONTAINER
        );
    }

    let consumer = Arc::new(MemoryConsumer::new());
    for key in &args.keys {
        consumer.push(ObjectReference::new(config.source.container.clone(), key.clone()));
    }

    let sdk_config = imgrelay_core::aws::load_sdk_config(&config.aws).await;
    let orchestrator = Orchestrator::from_config(
        &config,
        consumer,
        setup::object_store(&config, &sdk_config),
        setup::dead_letter_sink(&config),
    );

    let deliveries = final_deliveries(orchestrator.drain().await?);

    let sink: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(setup::expand_path(path))?)),
        None => Box::new(std::io::stdout().lock()),
    };
    let mut writer = OutputWriter::new(sink, args.format.into()).pretty(true);
    writer.records(&deliveries)?;
    writer.flush()?;

    let failed = failed_count(&deliveries, args.keys.len());
    if failed > 0 {
        anyhow::bail!(
            "{failed} of {} object(s) failed; see {}",
            args.keys.len(),
            config.dead_letter_path().display()
        );
    }

    tracing::info!(objects = deliveries.len(), "All variants delivered");
    Ok(())
}
