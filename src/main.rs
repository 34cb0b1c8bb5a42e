//! 1:1 Random Pairing WebSocket Chat Server - Entry Point
//!
//! Starts the TCP listener and SessionCoordinator actor, accepting connections.

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pairing_chat_server::{accept_loop, server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::parse();

    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=pairing_chat_server=trace
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pairing_chat_server=info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!("Pairing Chat Server listening on {}", config.listen_addr);

    let cmd_tx = server::spawn(config.metrics_interval(), config.command_buffer);
    info!("SessionCoordinator actor started");

    accept_loop(listener, cmd_tx, config.connection_settings()).await;

    Ok(())
}
