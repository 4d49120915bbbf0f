//! The `imgrelay config` command for configuration management.

use clap::{Args, Subcommand};
use imgrelay_core::Config;
use std::path::PathBuf;

use super::setup;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display the effective configuration (file plus environment overrides)
    Show,

    /// Show config file path
    Path,

    /// Write a config file with defaults
    Init {
        /// Destination bucket to write into the new file
        #[arg(long)]
        destination: Option<String>,

        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs, config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let path = config_path
        .as_deref()
        .map(setup::expand_path)
        .unwrap_or_else(Config::default_path);

    match args.command {
        ConfigCommand::Show => {
            let config = setup::load_config(config_path.as_deref())?;
            println!("{}", config.to_toml()?);
        }

        ConfigCommand::Path => {
            println!("{}", path.display());
        }

        ConfigCommand::Init { destination, force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }

            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let mut config = Config::default();
            if let Some(destination) = destination {
                config.destination.container = destination;
            }
            std::fs::write(&path, config.to_toml()?)?;

            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
        }
    }

    Ok(())
}
