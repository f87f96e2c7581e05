//! roadcache agent entry point.
//!
//! Boots the offline cache agent on a stdio transport. Frames are newline
//! delimited JSON on stdin/stdout; logging goes to stderr so it never mixes
//! with the frame stream.

use std::sync::Arc;

use anyhow::{Context, Result};
use roadcache_client::{FetchClient, FetchConfig};
use roadcache_core::{AppConfig, CacheDb};
use tokio::io::BufReader;
use tracing_subscriber::EnvFilter;

mod agent;
mod error;
mod handlers;
mod protocol;
mod registry;
mod runtime;
#[cfg(test)]
mod testing;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(
        generation = %config.cache_version,
        origin = %config.origin,
        db = %config.db_path.display(),
        "starting roadcache agent on stdio transport"
    );

    let store = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening cache at {}", config.db_path.display()))?;
    let network = FetchClient::new(FetchConfig::from_app(&config)?)?;

    let agent = agent::Agent::start(&config, Arc::new(store), Arc::new(network)).await?;
    runtime::serve(Arc::new(agent), BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;

    tracing::info!("roadcache agent stopped");
    Ok(())
}
