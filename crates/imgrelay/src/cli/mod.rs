//! Subcommand implementations.

pub mod config;
pub mod handle;
pub mod process;
pub mod run;
pub mod setup;
