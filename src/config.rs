//! Server configuration
//!
//! Command line flags with environment variable fallbacks.

use std::time::Duration;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "pairing_chat_server", about = "Random 1:1 pairing WebSocket chat server")]
pub struct ServerConfig {
    /// Address to bind the WebSocket listener to
    #[arg(long, env = "LISTEN_ADDR", default_value = "127.0.0.1:8080")]
    pub listen_addr: String,

    /// Seconds between statistics ticks (also sweeps stale presence)
    #[arg(long, env = "METRICS_INTERVAL_SECS", default_value_t = 30)]
    pub metrics_interval_secs: u64,

    /// Seconds between WebSocket pings
    #[arg(long, env = "PING_INTERVAL_SECS", default_value_t = 25)]
    pub ping_interval_secs: u64,

    /// Close a connection after this many seconds without any inbound frame
    #[arg(long, env = "IDLE_TIMEOUT_SECS", default_value_t = 60)]
    pub idle_timeout_secs: u64,

    /// Buffer size of the coordinator command channel
    #[arg(long, env = "COMMAND_BUFFER", default_value_t = 256)]
    pub command_buffer: usize,

    /// Buffer size of each connection's outbound channel
    #[arg(long, env = "CLIENT_BUFFER", default_value_t = 32)]
    pub client_buffer: usize,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl ServerConfig {
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_secs.max(1))
    }

    /// Per-connection settings handed to each handler task
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            ping_interval: Duration::from_secs(self.ping_interval_secs.max(1)),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs.max(1)),
            client_buffer: self.client_buffer.max(1),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::parse_from(["pairing_chat_server"])
    }
}

/// Heartbeat and buffering settings for one connection
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub ping_interval: Duration,
    pub idle_timeout: Duration,
    pub client_buffer: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        ServerConfig::default().connection_settings()
    }
}
