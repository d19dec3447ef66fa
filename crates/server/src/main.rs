//! courier server entry point.
//!
//! Boots the relay against the configured store and backend, activates it and
//! serves the MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use anyhow::Result;
use courier_client::{Relay, Trigger};
use courier_core::AppConfig;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use std::sync::Arc;
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

    let config = AppConfig::load()?;
    tracing::info!(
        db_path = %config.db_path.display(),
        backend_url = %config.backend_url,
        cache_version = %config.cache_version,
        "Starting courier on stdio transport"
    );

    let relay = Arc::new(Relay::from_config(config).await?);

    // A failed purge leaves the relay serving from the network only.
    if let Err(e) = relay.dispatch(Trigger::LifecycleActivate).await {
        tracing::warn!(error = %e, "activation failed, cache disabled until restart");
    }

    let handler = handler::CourierServer::new(relay);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
