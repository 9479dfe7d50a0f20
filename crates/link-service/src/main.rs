//! # Link Service
//!
//! Entry point for the account-link backend.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG`, default `info`)
//! 2. Load configuration (file from `LINK_CONFIG`, then `LINK_*` overrides)
//! 3. Validate configuration
//! 4. Start the gateway bridge
//! 5. Serve HTTP until Ctrl+C
//! 6. Shut the bridge down

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use link_service::{InMemoryUserStore, LinkRuntime, ServiceConfig, TurnstileClient};
use onebot_bridge::WebSocketConnector;

fn load_config() -> Result<ServiceConfig> {
    let path = ServiceConfig::path_from_env();
    let mut config = ServiceConfig::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config
        .apply_env()
        .context("Invalid environment override")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let config = load_config()?;
    let addr = config.http.socket_addr();

    let captcha = TurnstileClient::new(&config.captcha).context("Failed to build captcha client")?;
    let runtime = LinkRuntime::start(
        config,
        Arc::new(WebSocketConnector),
        Arc::new(InMemoryUserStore::new()),
        Arc::new(captcha),
    );

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Link service is running. Press Ctrl+C to stop.");
    let served = runtime
        .serve(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            }
        })
        .await;

    // Graceful shutdown
    runtime.shutdown().await;
    served.context("HTTP server failed")?;

    Ok(())
}
