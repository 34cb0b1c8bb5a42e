//! Error types for the pairing server
//!
//! Defines application-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::SessionId;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// rejected intents (sent back to the client as a notification).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error (fatal)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Handshake did not carry a user identity
    #[error("Missing userId")]
    MissingUserId,

    /// Identity already holds a session or queue slot elsewhere
    #[error("User already has an active session")]
    AlreadyActive,

    /// Reconnect target holds two other connections
    #[error("Session is full: {0}")]
    SessionFull(SessionId),

    /// Connection is not bound to the named session
    #[error("Not in session")]
    NotInSession,
}

/// Message send errors
///
/// Occurs when attempting to send messages through closed or full channels.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The outbound buffer is full (the client stopped reading)
    #[error("Channel full")]
    Full,
}
