//! 1:1 Random Pairing WebSocket Chat Server Library
//!
//! Pairs anonymous users into one-to-one conversations and manages each
//! session's lifecycle. Nothing is persisted; all state lives for the
//! lifetime of the process.
//!
//! # Features
//! - First-fit matching on mutual sex, age range and block lists
//! - Deterministic, order-independent session ids
//! - Presence tracking to reject duplicate simultaneous sessions
//! - Reconnection to an existing session, evicting stale duplicate tabs
//! - Message and typing-indicator relay
//! - Periodic statistics and presence sweep
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `SessionCoordinator` is the central actor owning all state
//! - Each connection has a `handler` task communicating with the coordinator
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use pairing_chat_server::{accept_loop, server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let listener = TcpListener::bind(&config.listen_addr).await.unwrap();
//!     let cmd_tx = server::spawn(config.metrics_interval(), config.command_buffer);
//!     accept_loop(listener, cmd_tx, config.connection_settings()).await;
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod matcher;
pub mod message;
pub mod participant;
pub mod presence;
pub mod queue;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::{Client, ConnectionState};
pub use config::{ConnectionSettings, ServerConfig};
pub use error::{AppError, SendError};
pub use handler::{accept_loop, handle_connection};
pub use message::{ClientMessage, ErrorCode, ServerMessage};
pub use participant::{MatchCriteria, Participant, Sex, UserAttributes};
pub use presence::PresenceRegistry;
pub use queue::WaitingQueue;
pub use room::Room;
pub use server::{ServerCommand, SessionCoordinator, Stats};
pub use types::{ConnectionId, SessionId, UserId};
