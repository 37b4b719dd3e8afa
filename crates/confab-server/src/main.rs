//! # confab-server
//!
//! The single authority for a set of conversations.
//!
//! This binary provides:
//! - **The conversation register**: every conversation lives here, each
//!   behind its own mutex so distinct conversations mutate in parallel
//! - **The request service**: membership-gated mutations and polled
//!   delta queries over the shared register
//! - **A framed TCP endpoint**: length-prefixed bincode requests, one
//!   task per client connection
//!
//! Clients hold mirrors (see `confab-client`) and catch up by polling
//! deltas; the server never pushes.

mod config;
mod error;
mod net;
mod registry;
mod service;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::registry::SharedRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,confab_server=debug")),
        )
        .init();

    info!("Starting Confab server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Build the shared register and bind the listener
    // -----------------------------------------------------------------------
    let registry = Arc::new(SharedRegistry::new());
    let listener = TcpListener::bind(config.listen_addr).await?;
    info!(
        instance = %config.instance_name,
        addr = %config.listen_addr,
        "Listening for clients"
    );

    // -----------------------------------------------------------------------
    // 4. Serve until shutdown
    // -----------------------------------------------------------------------
    tokio::select! {
        result = net::serve(registry, listener, config.max_frame_len) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Server failed");
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
