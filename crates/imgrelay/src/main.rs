//! imgrelay CLI - queue-driven image variant pipeline.
//!
//! Consumes object-created notifications, renders a catalog of resized JPEG
//! variants per source image, writes them to a destination bucket, and
//! acknowledges each notification only once every variant is stored.
//!
//! # Usage
//!
//! ```bash
//! # Long-running pull loop against an SQS queue (Ctrl-C drains and exits)
//! imgrelay run
//!
//! # Push-trigger invocation: process one SQS event, print the partial batch response
//! imgrelay handle --event event.json
//!
//! # One-shot processing of keys in the source bucket
//! imgrelay process photos/cat.png photos/dog.jpg
//!
//! # View configuration
//! imgrelay config show
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// imgrelay - Fetch, resize, deliver, acknowledge.
#[derive(Parser, Debug)]
#[command(name = "imgrelay")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "IMGRELAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the pull loop against the configured queue until interrupted
    Run(cli::run::RunArgs),

    /// Process one push-delivered SQS event and print the partial batch response
    Handle(cli::handle::HandleArgs),

    /// Process source keys directly, without a queue
    Process(cli::process::ProcessArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let loaded = cli::setup::load_config(cli.config.as_deref());
    if let Err(e) = &loaded {
        eprintln!(
            "Warning: Failed to load config: {e:#}\n  \
             Check your config file with `imgrelay config path`."
        );
    }
    let log_config = loaded.as_ref().cloned().unwrap_or_default();
    logging::init_from_config(&log_config, cli.verbose, cli.json_logs);

    tracing::debug!("imgrelay v{}", imgrelay_core::VERSION);

    match cli.command {
        Commands::Config(args) => cli::config::execute(args, cli.config).await,
        Commands::Run(args) => cli::run::execute(args, loaded?).await,
        Commands::Handle(args) => cli::handle::execute(args, loaded?).await,
        Commands::Process(args) => cli::process::execute(args, loaded?).await,
    }
}
