//! orc-mcp server entry point.
//!
//! Loads configuration, opens the store database, installs / activates the
//! configured version and serves the cache tools over stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use orc_client::{FetchClient, FetchConfig, OfflineCache, TracingNotifier};
use orc_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(
        version = %config.cache_version,
        db = %config.db_path.display(),
        origin = %config.origin,
        "Starting orc-mcp server on stdio transport"
    );

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("opening store database {}", config.db_path.display()))?;
    let transport = FetchClient::new(FetchConfig::from(&config))?;
    let cache = OfflineCache::new(config, db, Arc::new(transport), Arc::new(TracingNotifier)).await?;

    if let Err(e) = cache.start().await {
        tracing::warn!(error = %e, "install on startup failed");
    }

    let handler = handler::OrcServer::new(Arc::new(cache));
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
