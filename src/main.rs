mod config;
mod demand;
mod server;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::parse();

    // A missing or malformed dataset is fatal at startup
    let table = demand::load(&config.data)
        .with_context(|| format!("failed to load {}", config.data.display()))?;

    server::start_server(&config, AppState::new(table)).await
}
