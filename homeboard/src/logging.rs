//! Log output for the relay process
//!
//! The level filter comes from `HOMEBOARD_LOG_LEVEL`, then `RUST_LOG`, then
//! the `--log-level` flag.

use clap::ValueEnum;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogMode {
    /// One line per event, no module paths
    Compact,
    /// Multi-line output with thread ids and source locations
    Pretty,
    /// Newline-delimited JSON for log collectors
    Json,
}

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid log filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },
}

pub fn init(mode: LogMode, default_level: &str) -> Result<(), LoggingError> {
    let filter = env_filter(default_level)?;
    let registry = Registry::default().with(filter);

    let result = match mode {
        LogMode::Compact => registry
            .with(fmt::layer().with_target(false).compact())
            .try_init(),
        LogMode::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogMode::Json => registry.with(fmt::layer().json()).try_init(),
    };
    result.map_err(|e| LoggingError::TracingInit(e.to_string()))
}

fn env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let filter = std::env::var("HOMEBOARD_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());
    parse_filter(&filter)
}

fn parse_filter(filter: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(filter).map_err(|e| LoggingError::InvalidFilter {
        filter: filter.to_string(),
        reason: e.to_string(),
    })
}
