//! homeboard: serves the dashboard and relays its integrations

mod cli;
mod logging;
mod transport;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use tracing::{info, warn};

use homeboard_relay::{Config, Homeboard};

use crate::cli::Args;
use crate::transport::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::from_env()?;
    logging::init(args.log_mode, &args.log_level).context("Failed to initialize logging")?;

    let config = load_config(&args)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.web.socket));
    let origins = config.web.origins.clone();
    let root = config.web.root.clone();

    let homeboard = Homeboard::start(config).await;
    let routes = transport::routes(AppState::new(homeboard.registry().clone(), origins), root);

    let (addr, server) = warp::serve(routes)
        .try_bind_ephemeral(addr)
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "dashboard listening");
    let server = tokio::spawn(server);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("shutting down");

    server.abort();
    homeboard.shutdown().await;
    Ok(())
}

/// Read the config file, falling back to defaults when it does not exist,
/// then apply command line overrides.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = if args.config.exists() {
        Config::load(&args.config)
            .with_context(|| format!("Failed to load {}", args.config.display()))?
    } else {
        warn!(path = %args.config.display(), "config file not found, using defaults");
        Config::default()
    };

    if let Some(port) = args.port {
        config.web.socket = port;
    }
    if let Some(root) = &args.root {
        config.web.root = Some(root.clone());
    }
    Ok(config)
}
