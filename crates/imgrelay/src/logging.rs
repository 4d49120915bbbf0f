//! Logging initialization.
//!
//! Uses the `tracing` ecosystem with human-readable or JSON output. Logs go
//! to stderr; stdout carries reports and batch responses.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// AWS SDK internals are chatty at debug level.
const QUIET_DEPENDENCIES: &str = "aws_config=warn,aws_smithy_runtime=warn,hyper=warn";

/// Build the filter, respecting RUST_LOG if set.
fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(format!("{level},{QUIET_DEPENDENCIES}"))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Initialize the logging subsystem at `level` (e.g. "info", "debug").
pub fn init(level: &str, json_format: bool) {
    let filter = filter(level);

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize logging from the `[logging]` section, with CLI overrides.
pub fn init_from_config(
    config: &imgrelay_core::Config,
    verbose_override: bool,
    json_logs_override: bool,
) {
    let level = if verbose_override {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let json_format = json_logs_override || config.logging.format == "json";
    init(level, json_format);
}
