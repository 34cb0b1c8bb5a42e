//! SessionCoordinator actor implementation
//!
//! The central actor that owns all pairing state: connections, rooms, the
//! waiting queue and the presence registry. Connection handlers talk to it
//! through `ServerCommand`s; each command runs to completion before the
//! next, so matching and queue mutation never interleave.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::client::{Client, ConnectionState};
use crate::error::{AppError, SendError};
use crate::message::{ErrorCode, ServerMessage};
use crate::participant::{MatchCriteria, Participant, UserAttributes};
use crate::presence::PresenceRegistry;
use crate::queue::WaitingQueue;
use crate::room::Room;
use crate::types::{ConnectionId, SessionId, UserId};

/// Commands sent from handlers to the SessionCoordinator actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection with its declared identity
    Connect {
        connection_id: ConnectionId,
        user_id: UserId,
        supersede: bool,
        sender: mpsc::Sender<ServerMessage>,
    },
    /// Connection closed by the transport
    Disconnect {
        connection_id: ConnectionId,
    },
    /// Request a pairing
    FindPairing {
        connection_id: ConnectionId,
        attributes: UserAttributes,
        criteria: MatchCriteria,
        supersede: bool,
    },
    /// Rejoin a previously paired session
    ReconnectToSession {
        connection_id: ConnectionId,
        session_id: Option<SessionId>,
        attributes: UserAttributes,
        criteria: MatchCriteria,
    },
    /// Leave the session or stop waiting
    LeaveSession {
        connection_id: ConnectionId,
        session_id: Option<SessionId>,
    },
    /// Relay a chat message
    SendMessage {
        connection_id: ConnectionId,
        session_id: SessionId,
        message: String,
        created_at: i64,
    },
    /// Relay a typing indicator
    TypingIndicator {
        connection_id: ConnectionId,
        session_id: SessionId,
        is_typing: bool,
    },
    /// Drop the connection's identity from the presence registry
    ClearPresence {
        connection_id: ConnectionId,
    },
    /// Client sent a frame that could not be parsed
    InvalidMessage {
        connection_id: ConnectionId,
        reason: String,
    },
}

/// Aggregate counters reported on every tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub connections: usize,
    pub queue_length: usize,
    pub active_identities: usize,
    pub sessions: usize,
}

/// Spawn the coordinator actor, returning its command channel
pub fn spawn(metrics_interval: Duration, buffer: usize) -> mpsc::Sender<ServerCommand> {
    let (cmd_tx, cmd_rx) = mpsc::channel(buffer.max(1));
    tokio::spawn(SessionCoordinator::new(cmd_rx, metrics_interval).run());
    cmd_tx
}

/// The pairing and session-lifecycle actor
pub struct SessionCoordinator {
    /// All live connections: ConnectionId -> Client
    clients: HashMap<ConnectionId, Client>,
    /// Non-empty rooms: SessionId -> Room
    rooms: HashMap<SessionId, Room>,
    /// Participants awaiting a match
    queue: WaitingQueue,
    /// Identities holding a session or queue slot
    presence: PresenceRegistry,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
    /// Period of the stats/sweep tick
    metrics_interval: Duration,
}

impl SessionCoordinator {
    /// Create a new coordinator with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>, metrics_interval: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            rooms: HashMap::new(),
            queue: WaitingQueue::new(),
            presence: PresenceRegistry::new(),
            receiver,
            metrics_interval,
        }
    }

    /// Run the coordinator event loop
    ///
    /// Processes commands until all senders are dropped, interleaved with
    /// the periodic stats tick.
    pub async fn run(mut self) {
        info!("SessionCoordinator started");

        let mut ticker = tokio::time::interval(self.metrics_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // skip first immediate tick

        loop {
            tokio::select! {
                cmd = self.receiver.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                _ = ticker.tick() => self.handle_tick().await,
            }
        }

        info!("SessionCoordinator shutting down");
    }

    /// Current aggregate counters
    pub fn stats(&self) -> Stats {
        Stats {
            connections: self.clients.len(),
            queue_length: self.queue.len(),
            active_identities: self.presence.len(),
            sessions: self.rooms.len(),
        }
    }

    /// Process a single command
    async fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect {
                connection_id,
                user_id,
                supersede,
                sender,
            } => {
                self.handle_connect(connection_id, user_id, supersede, sender)
                    .await;
            }
            ServerCommand::Disconnect { connection_id } => {
                self.handle_disconnect(connection_id).await;
            }
            ServerCommand::FindPairing {
                connection_id,
                attributes,
                criteria,
                supersede,
            } => {
                self.handle_find_pairing(connection_id, attributes, criteria, supersede)
                    .await;
            }
            ServerCommand::ReconnectToSession {
                connection_id,
                session_id,
                attributes,
                criteria,
            } => {
                self.handle_reconnect(connection_id, session_id, attributes, criteria)
                    .await;
            }
            ServerCommand::LeaveSession {
                connection_id,
                session_id,
            } => {
                self.handle_leave_session(connection_id, session_id).await;
            }
            ServerCommand::SendMessage {
                connection_id,
                session_id,
                message,
                created_at,
            } => {
                self.handle_send_message(connection_id, session_id, message, created_at)
                    .await;
            }
            ServerCommand::TypingIndicator {
                connection_id,
                session_id,
                is_typing,
            } => {
                self.handle_typing(connection_id, session_id, is_typing).await;
            }
            ServerCommand::ClearPresence { connection_id } => {
                self.handle_clear_presence(connection_id);
            }
            ServerCommand::InvalidMessage {
                connection_id,
                reason,
            } => {
                self.send_to(
                    connection_id,
                    ServerMessage::Error {
                        code: ErrorCode::InvalidMessage,
                        message: reason,
                    },
                );
            }
        }
    }

    /// Handle new connection
    ///
    /// Rejected connections are never registered; dropping their sender
    /// closes the socket once `already-active` is flushed.
    async fn handle_connect(
        &mut self,
        connection_id: ConnectionId,
        user_id: UserId,
        supersede: bool,
        sender: mpsc::Sender<ServerMessage>,
    ) {
        let client = Client::new(connection_id, user_id.clone(), sender);

        if !supersede && self.is_held_elsewhere(&user_id, connection_id) {
            warn!(
                "Rejecting connection {}: user {} already active",
                connection_id, user_id
            );
            deliver(&client, AppError::AlreadyActive.into());
            return;
        }

        info!("Connection {} connected as {}", connection_id, user_id);
        self.presence.mark_active(user_id, connection_id);

        deliver(
            &client,
            ServerMessage::Connected {
                connection_id: connection_id.to_string(),
            },
        );
        self.clients.insert(connection_id, client);

        debug!(
            "Total connections: {}, queue length: {}",
            self.clients.len(),
            self.queue.len()
        );
    }

    /// Handle transport disconnection
    async fn handle_disconnect(&mut self, connection_id: ConnectionId) {
        let Some(mut client) = self.clients.remove(&connection_id) else {
            return;
        };
        info!("Connection {} ({}) disconnected", connection_id, client.user_id);

        self.queue.remove_connection(connection_id);
        self.release_presence(&client.user_id, connection_id);

        if let Some(session_id) = client.unbind() {
            self.leave_room(&session_id, connection_id);
            self.broadcast(
                &session_id,
                ServerMessage::SessionEnded {
                    user_id: client.user_id.clone(),
                },
            );
            self.notify_member_count(&session_id);
        }

        debug!(
            "Total connections: {}, queue length: {}, rooms: {}",
            self.clients.len(),
            self.queue.len(),
            self.rooms.len()
        );
    }

    /// Handle a pairing request
    async fn handle_find_pairing(
        &mut self,
        connection_id: ConnectionId,
        attributes: UserAttributes,
        criteria: MatchCriteria,
        supersede: bool,
    ) {
        let Some(client) = self.clients.get(&connection_id) else {
            return;
        };
        let user_id = client.user_id.clone();

        let busy = client.is_engaged() || self.is_held_elsewhere(&user_id, connection_id);
        if busy && !supersede {
            warn!(
                "Pairing request from {} rejected: user {} already active",
                connection_id, user_id
            );
            self.send_to(connection_id, AppError::AlreadyActive.into());
            return;
        }

        if supersede {
            self.abandon_engagements(&user_id).await;
        }

        self.presence.mark_active(user_id.clone(), connection_id);
        let candidate = Participant::new(user_id, connection_id, attributes, criteria);
        self.pair_or_enqueue(candidate).await;
    }

    /// Handle reconnection to a known session
    async fn handle_reconnect(
        &mut self,
        connection_id: ConnectionId,
        session_id: Option<SessionId>,
        attributes: UserAttributes,
        criteria: MatchCriteria,
    ) {
        let Some(client) = self.clients.get(&connection_id) else {
            return;
        };
        let user_id = client.user_id.clone();
        let current = client.session().cloned();

        let Some(session_id) = session_id else {
            debug!("Reconnect from {} without session, pairing instead", connection_id);
            self.handle_find_pairing(connection_id, attributes, criteria, false)
                .await;
            return;
        };

        let (member_count, is_member) = match self.rooms.get(&session_id) {
            Some(room) => (
                room.member_count(),
                room.has_user(&user_id, |id| self.clients.get(&id).map(|c| &c.user_id)),
            ),
            None => (0, false),
        };

        if member_count >= 2 && !is_member {
            warn!(
                "Connection {} ({}) refused: session {} is full",
                connection_id, user_id, session_id
            );
            self.send_to(connection_id, AppError::SessionFull(session_id).into());
            self.handle_disconnect(connection_id).await;
            return;
        }

        if current.as_ref() != Some(&session_id) {
            let notice = ServerMessage::Left {
                user_id: user_id.clone(),
            };
            self.detach(connection_id, notice).await;
        }
        self.dequeue_user(&user_id);

        self.reconcile(&session_id, &user_id, Some(connection_id))
            .await;
        self.join_room(&session_id, connection_id);
        self.presence.mark_active(user_id.clone(), connection_id);

        info!("Connection {} ({}) rejoined session {}", connection_id, user_id, session_id);

        self.broadcast(&session_id, ServerMessage::Rejoined { user_id });
        self.notify_member_count(&session_id);
    }

    /// Handle voluntary leaving of a session or the queue
    async fn handle_leave_session(
        &mut self,
        connection_id: ConnectionId,
        session_id: Option<SessionId>,
    ) {
        let Some(client) = self.clients.get(&connection_id) else {
            return;
        };
        let user_id = client.user_id.clone();
        let was_waiting = client.state == ConnectionState::Waiting;
        let target = session_id.or_else(|| client.session().cloned());

        self.dequeue_user(&user_id);

        let joined = target.filter(|session_id| {
            self.rooms
                .get(session_id)
                .is_some_and(|room| room.contains(connection_id))
        });

        let left = ServerMessage::Left {
            user_id: user_id.clone(),
        };

        if let Some(session_id) = joined {
            self.leave_room(&session_id, connection_id);
            info!("Connection {} ({}) left session {}", connection_id, user_id, session_id);

            self.broadcast(&session_id, left.clone());
            self.send_to(connection_id, left);
            self.notify_member_count(&session_id);
        } else if was_waiting {
            if let Some(client) = self.clients.get_mut(&connection_id) {
                client.unbind();
            }
            info!("Connection {} ({}) stopped waiting", connection_id, user_id);
            self.send_to(connection_id, left);
        } else {
            self.send_to(connection_id, AppError::NotInSession.into());
            return;
        }

        if self.presence.owner(&user_id) == Some(connection_id) {
            self.presence.clear(&user_id);
        }
    }

    /// Relay a chat message to the named session
    async fn handle_send_message(
        &mut self,
        connection_id: ConnectionId,
        session_id: SessionId,
        message: String,
        created_at: i64,
    ) {
        let Some(client) = self.clients.get(&connection_id) else {
            return;
        };

        let msg = ServerMessage::ReceiveMessage {
            user_id: client.user_id.clone(),
            message,
            created_at,
            session_id: session_id.clone(),
            pending: false,
        };
        self.broadcast(&session_id, msg);
    }

    /// Relay a typing indicator to the named session
    async fn handle_typing(
        &mut self,
        connection_id: ConnectionId,
        session_id: SessionId,
        is_typing: bool,
    ) {
        let Some(client) = self.clients.get(&connection_id) else {
            return;
        };

        let msg = ServerMessage::UserTyping {
            user_id: client.user_id.clone(),
            is_typing,
        };
        self.broadcast(&session_id, msg);
    }

    /// Handle explicit presence release
    fn handle_clear_presence(&mut self, connection_id: ConnectionId) {
        let Some(client) = self.clients.get(&connection_id) else {
            return;
        };

        if self.presence.owner(&client.user_id) == Some(connection_id) {
            self.presence.clear(&client.user_id);
            debug!("Presence of {} cleared by {}", client.user_id, connection_id);
        }
    }

    /// Periodic tick: sweep presence and publish statistics
    async fn handle_tick(&mut self) {
        let clients = &self.clients;
        let swept = self
            .presence
            .sweep(|user_id, _| clients.values().any(|c| &c.user_id == user_id));
        if !swept.is_empty() {
            info!("Swept {} stale presence entries", swept.len());
        }

        let stats = self.stats();
        info!(
            "Stats: {} connections, {} waiting, {} active identities, {} sessions",
            stats.connections, stats.queue_length, stats.active_identities, stats.sessions
        );

        let msg = ServerMessage::Metrics {
            timestamp: chrono::Utc::now().timestamp_millis(),
            connection_count: stats.connections,
            queue_length: stats.queue_length,
            active_identity_count: stats.active_identities,
        };
        for client in self.clients.values() {
            deliver(client, msg.clone());
        }
    }

    /// Match the candidate against the queue, or enqueue it
    async fn pair_or_enqueue(&mut self, candidate: Participant) {
        let partner = loop {
            match self.queue.find_match(&candidate).cloned() {
                Some(p) if !self.clients.contains_key(&p.connection_id) => {
                    warn!("Dropping stale queue entry for {}", p.user_id);
                    self.queue.remove_connection(p.connection_id);
                }
                other => break other,
            }
        };

        match partner {
            Some(partner) => self.create_session(candidate, partner).await,
            None => {
                let connection_id = candidate.connection_id;
                debug!("No match for {}, queueing", candidate.user_id);
                if let Some(replaced) = self.queue.enqueue(candidate) {
                    self.release_queue_slot(replaced.connection_id);
                }
                if let Some(client) = self.clients.get_mut(&connection_id) {
                    client.set_waiting();
                }
                self.send_to(connection_id, ServerMessage::Queued);
            }
        }
    }

    /// Join two matched participants into their session
    async fn create_session(&mut self, candidate: Participant, partner: Participant) {
        let session_id = SessionId::from_pair(&candidate.user_id, &partner.user_id);

        self.dequeue_user(&candidate.user_id);
        self.dequeue_user(&partner.user_id);

        self.join_room(&session_id, candidate.connection_id);
        self.join_room(&session_id, partner.connection_id);

        self.reconcile(&session_id, &candidate.user_id, Some(candidate.connection_id))
            .await;
        self.reconcile(&session_id, &partner.user_id, Some(partner.connection_id))
            .await;

        info!(
            "Paired {} with {} in session {}",
            candidate.user_id, partner.user_id, session_id
        );

        self.broadcast(
            &session_id,
            ServerMessage::Paired {
                session_id: session_id.clone(),
                user_a: candidate.user_id,
                user_b: partner.user_id,
            },
        );
        self.notify_member_count(&session_id);
    }

    /// Evict every connection of `user_id` in the session except `keep`
    ///
    /// Returns how many connections were evicted. A failed notification
    /// does not stop the remaining evictions.
    async fn reconcile(
        &mut self,
        session_id: &SessionId,
        user_id: &UserId,
        keep: Option<ConnectionId>,
    ) -> usize {
        let stale = match self.rooms.get(session_id) {
            Some(room) => {
                room.stale_connections(user_id, keep, |id| {
                    self.clients.get(&id).map(|c| &c.user_id)
                })
            }
            None => return 0,
        };

        for connection_id in &stale {
            info!(
                "Removing duplicate connection {} for {} from session {}",
                connection_id, user_id, session_id
            );
            self.leave_room(session_id, *connection_id);

            self.send_to(
                *connection_id,
                ServerMessage::Left {
                    user_id: user_id.clone(),
                },
            );
        }

        stale.len()
    }

    /// End whatever every connection of `user_id` is engaged in
    async fn abandon_engagements(&mut self, user_id: &UserId) {
        self.dequeue_user(user_id);

        let engaged: Vec<ConnectionId> = self
            .clients
            .values()
            .filter(|c| &c.user_id == user_id && c.is_engaged())
            .map(|c| c.id)
            .collect();

        for connection_id in engaged {
            debug!("Superseding previous engagement of {} on {}", user_id, connection_id);
            self.detach(
                connection_id,
                ServerMessage::Left {
                    user_id: user_id.clone(),
                },
            )
            .await;
        }
    }

    /// Return a connection to `Connected`, telling its old room `notice`
    async fn detach(&mut self, connection_id: ConnectionId, notice: ServerMessage) {
        let Some(client) = self.clients.get_mut(&connection_id) else {
            return;
        };
        let Some(session_id) = client.unbind() else {
            return;
        };

        self.leave_room(&session_id, connection_id);
        self.broadcast(&session_id, notice);
        self.notify_member_count(&session_id);
    }

    /// Drop a user's queue entry, returning its connection to `Connected`
    fn dequeue_user(&mut self, user_id: &UserId) {
        if let Some(entry) = self.queue.remove_user(user_id) {
            self.release_queue_slot(entry.connection_id);
        }
    }

    /// Reset a connection that lost its queue slot
    fn release_queue_slot(&mut self, connection_id: ConnectionId) {
        if let Some(client) = self.clients.get_mut(&connection_id) {
            if client.state == ConnectionState::Waiting {
                client.unbind();
            }
        }
    }

    /// Add a connection to a room and bind it to the session
    fn join_room(&mut self, session_id: &SessionId, connection_id: ConnectionId) {
        self.rooms
            .entry(session_id.clone())
            .or_insert_with(|| Room::new(session_id.clone()))
            .join(connection_id);

        if let Some(client) = self.clients.get_mut(&connection_id) {
            client.bind_session(session_id.clone());
        }
    }

    /// Remove a connection from a room, unbinding it and dropping empty rooms
    fn leave_room(&mut self, session_id: &SessionId, connection_id: ConnectionId) -> bool {
        let Some(room) = self.rooms.get_mut(session_id) else {
            return false;
        };
        let removed = room.leave(connection_id);

        if room.is_empty() {
            self.rooms.remove(session_id);
            debug!("Room {} deleted (empty)", session_id);
        }

        if let Some(client) = self.clients.get_mut(&connection_id) {
            if client.session() == Some(session_id) {
                client.unbind();
            }
        }

        removed
    }

    /// Whether `user_id` is active under a different live connection
    fn is_held_elsewhere(&self, user_id: &UserId, connection_id: ConnectionId) -> bool {
        match self.presence.owner(user_id) {
            Some(owner) if owner != connection_id => self.clients.contains_key(&owner),
            _ => false,
        }
    }

    /// Release presence held by a departing connection
    ///
    /// Ownership passes to another live connection of the same identity
    /// if one remains.
    fn release_presence(&mut self, user_id: &UserId, connection_id: ConnectionId) {
        if self.presence.owner(user_id) != Some(connection_id) {
            return;
        }

        let successor = self
            .clients
            .values()
            .find(|c| &c.user_id == user_id && c.id != connection_id)
            .map(|c| c.id);

        match successor {
            Some(next) => self.presence.mark_active(user_id.clone(), next),
            None => self.presence.clear(user_id),
        }
    }

    /// Broadcast the current member count to a session
    fn notify_member_count(&self, session_id: &SessionId) {
        let count = self
            .rooms
            .get(session_id)
            .map(Room::member_count)
            .unwrap_or(0);
        self.broadcast(session_id, ServerMessage::MemberCount { count });
    }

    /// Send a message to every connection joined to a session
    fn broadcast(&self, session_id: &SessionId, msg: ServerMessage) {
        let Some(room) = self.rooms.get(session_id) else {
            return;
        };

        for connection_id in room.members() {
            if let Some(client) = self.clients.get(connection_id) {
                deliver(client, msg.clone());
            }
        }
    }

    /// Send a message to a single connection
    fn send_to(&self, connection_id: ConnectionId, msg: ServerMessage) {
        if let Some(client) = self.clients.get(&connection_id) {
            deliver(client, msg);
        }
    }
}

/// Queue a message for one client without waiting
///
/// A client whose buffer is full loses the message; the coordinator never
/// blocks on a single slow reader.
fn deliver(client: &Client, msg: ServerMessage) {
    match client.send(msg) {
        Ok(()) => {}
        Err(SendError::Full) => {
            warn!("Outbound buffer of {} full, dropping message", client.id);
        }
        Err(SendError::ChannelClosed) => {
            debug!("Send to {} failed, channel closed", client.id);
        }
    }
}
