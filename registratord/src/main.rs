mod bridge;
mod config;
mod error;
mod events;
mod mesos;
mod registry;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use anyhow::{Context, Result};
use crate::bridge::Bridge;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("registratord=info"))
        )
        .init();

    tracing::info!("Starting registratord");

    // Load config
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "/etc/registratord/registratord.toml".to_string());

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path))?;

    tracing::info!("Loaded config from {}", config_path);

    let hostname = hostname::get()
        .context("Failed to get system hostname")?
        .to_string_lossy()
        .to_string();

    // Build the registry adapter
    let adapter = registry::new_adapter(&config.registry.uri, &config.mesos.master_url, &hostname)
        .with_context(|| format!("Failed to create adapter for {}", config.registry.uri))?;

    let bridge = Bridge::new(adapter, config.bridge.clone(), hostname);

    bridge
        .ping()
        .await
        .with_context(|| format!("Registry {} unreachable", config.registry.uri))?;

    bridge.sync().await;

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();

    // Spawn container event reader
    let (events_tx, events_rx) = mpsc::channel(256);
    let reader_cancel = cancel.clone();
    let reader_handle = tokio::spawn(async move {
        if let Err(e) = events::read_events(tokio::io::stdin(), events_tx, reader_cancel).await {
            tracing::error!("Event reader error: {}", e);
        }
    });

    // Spawn bridge task
    let bridge_cancel = cancel.clone();
    let bridge_handle = tokio::spawn(async move {
        if let Err(e) = bridge::run(bridge, events_rx, bridge_cancel).await {
            tracing::error!("Bridge error: {}", e);
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutdown signal received");

    // Trigger cancellation
    cancel.cancel();

    // Wait for all tasks to complete
    let _ = tokio::join!(reader_handle, bridge_handle);

    tracing::info!("Shutdown complete");
    Ok(())
}
