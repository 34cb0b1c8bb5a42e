//! WebSocket connection handler
//!
//! Handles individual connections: WebSocket handshake (including the
//! `userId` query parameter), message parsing, heartbeat and
//! bidirectional communication with the SessionCoordinator.

use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use url::form_urlencoded;

use crate::config::ConnectionSettings;
use crate::error::AppError;
use crate::message::{ClientMessage, ServerMessage};
use crate::server::ServerCommand;
use crate::types::{ConnectionId, UserId};

/// Identity declared in the upgrade request query string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub user_id: UserId,
    /// `leftPrevious` flag: supersede an existing session of this identity
    pub supersede: bool,
}

impl Handshake {
    /// Parse `userId` and `leftPrevious` from a raw query string
    pub fn from_query(query: &str) -> Result<Self, AppError> {
        let mut user_id = None;
        let mut supersede = false;

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "userId" if !value.is_empty() => user_id = Some(UserId(value.into_owned())),
                "leftPrevious" => supersede = matches!(value.as_ref(), "true" | "1"),
                _ => {}
            }
        }

        Ok(Self {
            user_id: user_id.ok_or(AppError::MissingUserId)?,
            supersede,
        })
    }
}

/// Accept TCP connections forever, spawning a handler task for each
pub async fn accept_loop(
    listener: TcpListener,
    cmd_tx: mpsc::Sender<ServerCommand>,
    settings: ConnectionSettings,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, cmd_tx, settings).await {
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

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, registers with the coordinator and
/// pumps frames both ways until either side closes.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
    settings: ConnectionSettings,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake, capturing the declared identity
    let handshake = Arc::new(Mutex::new(None));
    let captured = Arc::clone(&handshake);
    let ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        move |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
            match Handshake::from_query(req.uri().query().unwrap_or("")) {
                Ok(parsed) => {
                    if let Ok(mut slot) = captured.lock() {
                        *slot = Some(parsed);
                    }
                    Ok(response)
                }
                Err(e) => {
                    let mut rejection = ErrorResponse::new(Some(e.to_string()));
                    *rejection.status_mut() = StatusCode::BAD_REQUEST;
                    Err(rejection)
                }
            }
        },
    )
    .await?;

    let handshake = handshake
        .lock()
        .ok()
        .and_then(|mut slot| slot.take())
        .ok_or(AppError::MissingUserId)?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let connection_id = ConnectionId::new();
    info!(
        "Connection {} from {} as {}",
        connection_id, peer_addr, handshake.user_id
    );

    // Channel for coordinator -> client messages
    let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(settings.client_buffer);

    // Register with the coordinator, which replies with `connected`
    // or `already-active`
    if cmd_tx
        .send(ServerCommand::Connect {
            connection_id,
            user_id: handshake.user_id.clone(),
            supersede: handshake.supersede,
            sender: msg_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register connection {} - coordinator closed", connection_id);
        return Err(AppError::ChannelSend);
    }

    let cmd_tx_read = cmd_tx.clone();
    let user_id = handshake.user_id;
    let idle_timeout = settings.idle_timeout;

    // Spawn read task (WebSocket -> ServerCommand)
    let mut read_task = tokio::spawn(async move {
        loop {
            let next = match time::timeout(idle_timeout, ws_receiver.next()).await {
                Ok(Some(next)) => next,
                Ok(None) => break,
                Err(_) => {
                    info!("Connection {} idle for {:?}, closing", connection_id, idle_timeout);
                    break;
                }
            };

            let cmd = match next {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => client_message_to_command(connection_id, &user_id, client_msg),
                    Err(e) => {
                        warn!("Invalid JSON from {}: {}", connection_id, e);
                        ServerCommand::InvalidMessage {
                            connection_id,
                            reason: format!("Invalid message format: {}", e),
                        }
                    }
                },
                Ok(Message::Close(_)) => {
                    debug!("Connection {} sent close frame", connection_id);
                    break;
                }
                Ok(Message::Pong(_)) => {
                    debug!("Pong from {}", connection_id);
                    continue;
                }
                Ok(_) => {
                    // Ping is answered by tungstenite; binary frames are ignored
                    continue;
                }
                Err(e) => {
                    error!("WebSocket error for {}: {}", connection_id, e);
                    break;
                }
            };

            if cmd_tx_read.send(cmd).await.is_err() {
                debug!("Coordinator closed, ending read task for {}", connection_id);
                break;
            }
        }
        debug!("Read task ended for {}", connection_id);
    });

    let ping_interval = settings.ping_interval;

    // Spawn write task (ServerMessage -> WebSocket, plus heartbeat pings)
    let mut write_task = tokio::spawn(async move {
        let mut ping = time::interval(ping_interval);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ping.tick().await; // skip first immediate tick

        loop {
            tokio::select! {
                msg = msg_rx.recv() => {
                    let Some(msg) = msg else {
                        break;
                    };
                    match serde_json::to_string(&msg) {
                        Ok(json) => {
                            if ws_sender.send(Message::Text(json)).await.is_err() {
                                debug!("WebSocket send failed, ending write task");
                                break;
                            }
                        }
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            // Continue - don't break on serialization errors
                        }
                    }
                }
                _ = ping.tick() => {
                    if ws_sender.send(Message::Ping(Vec::new())).await.is_err() {
                        debug!("Ping failed, ending write task");
                        break;
                    }
                }
            }
        }
        debug!("Write task ended for connection");

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete
    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", connection_id);
            write_task.abort();
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", connection_id);
            read_task.abort();
        }
    }

    let _ = cmd_tx
        .send(ServerCommand::Disconnect { connection_id })
        .await;

    info!("Connection {} closed", connection_id);

    Ok(())
}

/// Convert a ClientMessage to a ServerCommand
///
/// The coordinator acts on the identity declared at handshake time; a
/// payload naming a different user is logged and otherwise ignored.
fn client_message_to_command(
    connection_id: ConnectionId,
    user_id: &UserId,
    msg: ClientMessage,
) -> ServerCommand {
    let check = |claimed: &UserId| {
        if claimed != user_id {
            warn!(
                "Connection {} ({}) sent payload for {}",
                connection_id, user_id, claimed
            );
        }
    };

    match msg {
        ClientMessage::FindPairing {
            user_id,
            attributes,
            criteria,
            left_previous,
        } => {
            check(&user_id);
            ServerCommand::FindPairing {
                connection_id,
                attributes,
                criteria,
                supersede: left_previous,
            }
        }
        ClientMessage::ReconnectToSession {
            session_id,
            user_id,
            attributes,
            criteria,
        } => {
            check(&user_id);
            ServerCommand::ReconnectToSession {
                connection_id,
                session_id,
                attributes,
                criteria,
            }
        }
        ClientMessage::LeaveSession {
            user_id,
            session_id,
        } => {
            check(&user_id);
            ServerCommand::LeaveSession {
                connection_id,
                session_id,
            }
        }
        ClientMessage::SendMessage {
            session_id,
            user_id,
            message,
            created_at,
        } => {
            check(&user_id);
            ServerCommand::SendMessage {
                connection_id,
                session_id,
                message,
                created_at,
            }
        }
        ClientMessage::TypingIndicator {
            user_id,
            is_typing,
            session_id,
        } => {
            check(&user_id);
            ServerCommand::TypingIndicator {
                connection_id,
                session_id,
                is_typing,
            }
        }
        ClientMessage::ClearPresence => ServerCommand::ClearPresence { connection_id },
    }
}
