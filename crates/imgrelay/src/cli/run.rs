//! The `imgrelay run` command: long-running SQS pull loop.

use clap::Args;
use imgrelay_core::{Config, Orchestrator, SqsConsumer};
use std::sync::Arc;
use tokio::sync::watch;

use super::setup;

/// Arguments for the `run` command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Queue URL (overrides queue.url)
    #[arg(long)]
    pub queue_url: Option<String>,

    /// Maximum concurrent objects (overrides pipeline.concurrency)
    #[arg(short = 'j', long)]
    pub concurrency: Option<usize>,
}

/// Execute the run command.
pub async fn execute(args: RunArgs, mut config: Config) -> anyhow::Result<()> {
    if let Some(url) = args.queue_url {
        config.queue.url = url;
    }
    if let Some(concurrency) = args.concurrency {
        config.pipeline.concurrency = concurrency;
    }
    setup::require_valid(&config)?;
    if config.queue.url.is_empty() {
        anyhow::bail!(
            "No queue configured.\n\n  Hint: set queue.url, export {}, or pass --queue-url.",
            imgrelay_core::config::ENV_QUEUE_URL
        );
    }

    let sdk_config = imgrelay_core::aws::load_sdk_config(&config.aws).await;
    let consumer = Arc::new(SqsConsumer::from_sdk_config(&sdk_config, &config.queue));
    let orchestrator = Orchestrator::from_config(
        &config,
        consumer,
        setup::object_store(&config, &sdk_config),
        setup::dead_letter_sink(&config),
    );

    tracing::info!(
        queue = %config.queue.url,
        destination = %config.destination.container,
        variants = config.variants.len(),
        "imgrelay running (Ctrl-C to stop)"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Interrupt received, finishing in-flight work"),
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {e}"),
        }
        let _ = shutdown_tx.send(true);
    });

    let tally = orchestrator.run(shutdown_rx).await?;
    tracing::info!(
        acknowledged = tally.acknowledged,
        awaiting_redelivery = tally.awaiting_redelivery,
        dead_lettered = tally.dead_lettered,
        "Stopped"
    );
    Ok(())
}
