mod config;
mod logging;
mod routes;
mod state;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use crate::config::Settings;
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "webcal-proxy")]
#[command(about = "Filter, merge and preview remote webcal feeds")]
pub struct Cli {
    /// Config file (TOML). Defaults to <config dir>/webcal-proxy/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 0.0.0.0:8080
    #[arg(long)]
    addr: Option<String>,

    /// Upstream fetches allowed in flight at once
    #[arg(long)]
    max_conns: Option<usize>,

    /// Upstream fetch timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Log filter, e.g. "info" or "webcal_proxy_core=debug"
    #[arg(long)]
    log_level: Option<String>,

    /// Append logs to this file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Allow fetching from loopback addresses (local testing only)
    #[arg(long)]
    allow_loopback: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(&cli)?;
    logging::init(&settings.logging)?;

    tracing::info!(settings = ?settings, "Configuration loaded");

    let state = AppState::new(settings.fetch.clone());
    let app = routes::router(state);

    let listener = tokio::net::TcpListener::bind(&settings.server.addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.server.addr))?;
    tracing::info!("webcal-proxy listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c");
        return;
    }
    tracing::info!("Shutting down");
}
