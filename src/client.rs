//! Client struct definition
//!
//! Represents one live connection: the identity it declared, its
//! outbound channel and where it stands in the pairing lifecycle.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::{ConnectionId, SessionId, UserId};

/// Pairing lifecycle of a single connection
///
/// `Disconnected` is terminal and represented by removing the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected, no queue slot and no session
    Connected,
    /// Waiting in the queue for a match
    Waiting,
    /// Joined to a session
    InSession(SessionId),
}

/// Connected client information
#[derive(Debug)]
pub struct Client {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Identity declared at connection time
    pub user_id: UserId,
    /// Server → Client message channel
    pub sender: mpsc::Sender<ServerMessage>,
    /// Current lifecycle state
    pub state: ConnectionState,
}

impl Client {
    /// Create a new client in the `Connected` state
    pub fn new(id: ConnectionId, user_id: UserId, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            user_id,
            sender,
            state: ConnectionState::Connected,
        }
    }

    /// Queue a message for this client without waiting
    ///
    /// Fails if the outbound buffer is full (client not reading) or the
    /// channel is closed (client disconnected).
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        self.sender.try_send(msg).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }

    /// Session this connection is bound to, if any
    pub fn session(&self) -> Option<&SessionId> {
        match &self.state {
            ConnectionState::InSession(session_id) => Some(session_id),
            _ => None,
        }
    }

    /// Whether the connection is waiting or in a session
    pub fn is_engaged(&self) -> bool {
        self.state != ConnectionState::Connected
    }

    pub fn bind_session(&mut self, session_id: SessionId) {
        self.state = ConnectionState::InSession(session_id);
    }

    pub fn set_waiting(&mut self) {
        self.state = ConnectionState::Waiting;
    }

    /// Return to `Connected`, handing back the previous session if any
    pub fn unbind(&mut self) -> Option<SessionId> {
        match std::mem::replace(&mut self.state, ConnectionState::Connected) {
            ConnectionState::InSession(session_id) => Some(session_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> (Client, mpsc::Receiver<ServerMessage>) {
        let (tx, rx) = mpsc::channel(32);
        (Client::new(ConnectionId::new(), UserId::from("alice"), tx), rx)
    }

    #[tokio::test]
    async fn test_client_creation() {
        let (client, _rx) = client();

        assert_eq!(client.state, ConnectionState::Connected);
        assert!(client.session().is_none());
        assert!(!client.is_engaged());
    }

    #[tokio::test]
    async fn test_client_state_transitions() {
        let (mut client, _rx) = client();

        client.set_waiting();
        assert!(client.is_engaged());
        assert!(client.session().is_none());

        client.bind_session(SessionId::from("alice_bob"));
        assert_eq!(client.session(), Some(&SessionId::from("alice_bob")));

        assert_eq!(client.unbind(), Some(SessionId::from("alice_bob")));
        assert_eq!(client.state, ConnectionState::Connected);
        assert_eq!(client.unbind(), None);
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped() {
        let (client, rx) = client();
        drop(rx);

        assert!(matches!(
            client.send(ServerMessage::Queued),
            Err(SendError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_send_to_full_buffer_does_not_wait() {
        let (tx, mut rx) = mpsc::channel(1);
        let client = Client::new(ConnectionId::new(), UserId::from("bob"), tx);

        assert!(client.send(ServerMessage::Queued).is_ok());
        assert!(matches!(
            client.send(ServerMessage::Queued),
            Err(SendError::Full)
        ));
        assert!(matches!(rx.recv().await, Some(ServerMessage::Queued)));
    }
}
