//! trailcache server entry point.
//!
//! Boots the offline worker against the configured store and origin, then
//! serves it as MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;
use trailcache_client::{FetchConfig, HttpFetcher, OfflineWorker, WorkerSettings};
use trailcache_core::{AppConfig, CacheDb};

mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let settings = WorkerSettings::from_config(&config)?;
    tracing::info!(
        generation = %settings.generation,
        origin = %settings.origin,
        db = %config.db_path.display(),
        "Starting trailcache server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path).await?;
    let network = HttpFetcher::new(FetchConfig::from(&config), settings.origin.clone())?;
    let worker = Arc::new(OfflineWorker::new(db, Arc::new(network), settings));

    match worker.register().await {
        Ok(state) => tracing::info!(%state, "worker registered"),
        Err(e) => tracing::error!("worker registration failed: {e}"),
    }

    let handler = handler::TrailCacheServer::new(worker);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
