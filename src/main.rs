//! pairchat - Entry Point
//!
//! Starts the TCP listener and the gateway actor, accepting connections.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pairchat::{handle_connection, ChatGateway, Config, RestBackend};

/// Channel buffer size for gateway commands
const CHANNEL_BUFFER_SIZE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Honor a local .env file for platform credentials
    dotenv::dotenv().ok();

    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=pairchat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pairchat=info")),
        )
        .init();

    let config = Config::from_env()?;

    // External collaborator: hosted auth + table store
    let backend = Arc::new(RestBackend::new(
        config.backend_url.clone(),
        config.backend_api_key.clone(),
    ));

    // Start TCP listener
    let listener = TcpListener::bind(&config.addr).await?;
    info!("pairchat relay listening on {}", config.addr);

    // Create gateway actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
    let gateway = ChatGateway::new(cmd_rx, Arc::clone(&backend));
    tokio::spawn(gateway.run());

    info!("ChatGateway actor started");

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();
                let backend = Arc::clone(&backend);

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, cmd_tx, backend).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
