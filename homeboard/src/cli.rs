use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use crate::logging::LogMode;

/// Home dashboard relay
///
/// Serves the dashboard, relays client requests to the configured
/// integrations and pushes their results to every connected screen.
#[derive(Parser, Debug)]
#[command(name = "homeboard", version)]
pub struct Args {
    /// Configuration file (JSON)
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Listen port, overriding `web.socket`
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Static file directory, overriding `web.root`
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value = "compact")]
    pub log_mode: LogMode,

    /// Log filter when neither HOMEBOARD_LOG_LEVEL nor RUST_LOG is set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Parse the command line, then apply `HOMEBOARD_CONFIG` and
    /// `HOMEBOARD_PORT` when set.
    pub fn from_env() -> Result<Self> {
        let mut args = Args::parse();

        if let Ok(path) = std::env::var("HOMEBOARD_CONFIG") {
            args.config = PathBuf::from(path);
        }
        if let Ok(port) = std::env::var("HOMEBOARD_PORT") {
            args.port = Some(
                port.parse()
                    .context("Invalid HOMEBOARD_PORT environment variable")?,
            );
        }

        Ok(args)
    }
}
