/// Dialog messaging node - main entry point
use dialog_core::api::start_api_server;
use dialog_core::cursors::ReadCursorStore;
use dialog_core::directory::SledDirectory;
use dialog_core::http_api::start_http_api;
use dialog_core::ledger::MessageLedger;
use dialog_core::{Config, SyncService};
use std::env;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse configuration
    let args: Vec<String> = env::args().collect();
    let config =
        Config::from_args(&args).map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;

    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // Open the stores and wire the service
    let ledger = MessageLedger::new(&data_dir)?;
    let cursors = ReadCursorStore::new(&data_dir)?;
    let directory = SledDirectory::new(&data_dir)?;
    let service = SyncService::new(ledger, cursors, Arc::new(directory.clone()));

    info!("🚀 Starting Dialog messaging node");
    info!("   Data dir: {}", data_dir.display());
    info!("   HTTP sync API: {}", config.http_addr);
    info!("   Command API: {}", config.api_addr);

    // Persist the command API port for the CLI to discover
    if let Ok(home) = std::env::var("HOME") {
        let path = std::path::Path::new(&home).join(".dialog_api_port");
        let _ = std::fs::write(&path, config.api_addr.port().to_string());
    }

    let api_handle = {
        let service = service.clone();
        let directory = directory.clone();
        let addr = config.api_addr;
        tokio::spawn(async move {
            if let Err(e) = start_api_server(service, directory, addr).await {
                error!("API server error: {}", e);
            }
        })
    };

    let http_handle = {
        let service = service.clone();
        let addr = config.http_addr;
        tokio::spawn(async move {
            if let Err(e) = start_http_api(service, addr).await {
                error!("HTTP API error: {}", e);
            }
        })
    };

    wait_for_shutdown().await;
    info!("Shutdown signal received, stopping node...");

    api_handle.abort();
    http_handle.abort();
    service.flush()?;
    directory.flush()?;

    info!("Node stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn wait_for_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Ctrl+C received");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
        info!("SIGTERM received");
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
