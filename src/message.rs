//! Message protocol definitions
//!
//! JSON-based bidirectional message protocol using Serde's tagged enum
//! for type-safe serialization/deserialization. Event names are
//! kebab-case, payload fields camelCase.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::participant::{MatchCriteria, UserAttributes};
use crate::types::{SessionId, UserId};

/// Client → Server message
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Ask to be paired with a compatible participant
    #[serde(rename_all = "camelCase")]
    FindPairing {
        user_id: UserId,
        attributes: UserAttributes,
        criteria: MatchCriteria,
        /// Supersede this identity's previous session or queue slot
        #[serde(default)]
        left_previous: bool,
    },
    /// Rejoin a known session after a reload or network drop
    #[serde(rename_all = "camelCase")]
    ReconnectToSession {
        #[serde(default)]
        session_id: Option<SessionId>,
        user_id: UserId,
        attributes: UserAttributes,
        criteria: MatchCriteria,
    },
    /// Leave the session (or stop waiting)
    #[serde(rename_all = "camelCase")]
    LeaveSession {
        user_id: UserId,
        #[serde(default)]
        session_id: Option<SessionId>,
    },
    /// Chat message to relay to the session
    #[serde(rename_all = "camelCase")]
    SendMessage {
        session_id: SessionId,
        user_id: UserId,
        message: String,
        created_at: i64,
    },
    /// Typing indicator to relay to the session
    #[serde(rename_all = "camelCase")]
    TypingIndicator {
        user_id: UserId,
        is_typing: bool,
        session_id: SessionId,
    },
    /// Drop this connection's identity from the presence registry
    ClearPresence,
}

/// Server → Client message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Connection accepted, connection ID issued
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: String },
    /// No match yet, waiting in the queue
    Queued,
    /// Two users were paired into a session
    #[serde(rename_all = "camelCase")]
    Paired {
        session_id: SessionId,
        user_a: UserId,
        user_b: UserId,
    },
    /// A user rejoined the session
    #[serde(rename_all = "camelCase")]
    Rejoined { user_id: UserId },
    /// The partner's connection went away
    #[serde(rename_all = "camelCase")]
    SessionEnded { user_id: UserId },
    /// A user left the session on purpose
    #[serde(rename_all = "camelCase")]
    Left { user_id: UserId },
    /// Current number of connections in the session
    MemberCount { count: usize },
    /// The identity already holds an active session elsewhere
    AlreadyActive,
    /// Relayed chat message
    #[serde(rename_all = "camelCase")]
    ReceiveMessage {
        user_id: UserId,
        message: String,
        created_at: i64,
        session_id: SessionId,
        pending: bool,
    },
    /// Relayed typing indicator
    #[serde(rename_all = "camelCase")]
    UserTyping { user_id: UserId, is_typing: bool },
    /// Periodic server statistics
    #[serde(rename_all = "camelCase")]
    Metrics {
        timestamp: i64,
        connection_count: usize,
        queue_length: usize,
        active_identity_count: usize,
    },
    /// Error occurred
    Error { code: ErrorCode, message: String },
}

/// Error codes for ServerMessage::Error
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Reconnect target is held by two other connections
    SessionFull,
    /// Connection is not part of the named session
    NotInSession,
    /// Invalid message format
    InvalidMessage,
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let (code, message) = match &err {
            AppError::AlreadyActive => return ServerMessage::AlreadyActive,
            AppError::SessionFull(session_id) => (
                ErrorCode::SessionFull,
                format!("Session '{}' is full", session_id),
            ),
            AppError::NotInSession => {
                (ErrorCode::NotInSession, "You are not in this session".to_string())
            }
            AppError::Json(e) => {
                (ErrorCode::InvalidMessage, format!("Invalid message format: {}", e))
            }
            // Fatal errors are not typically converted (connection closes)
            _ => (ErrorCode::InvalidMessage, "Internal error".to_string()),
        };
        ServerMessage::Error { code, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::participant::Sex;

    #[test]
    fn test_find_pairing_deserialize() {
        let json = r#"{
            "type": "find-pairing",
            "userId": "alice",
            "attributes": {"age": 25, "sex": "male", "blockList": ["mallory"]},
            "criteria": {"sexWanted": "female", "ageFrom": 20, "ageTo": 30}
        }"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::FindPairing {
                user_id,
                attributes,
                criteria,
                left_previous,
            } => {
                assert_eq!(user_id, UserId::from("alice"));
                assert!(attributes.blocks(&UserId::from("mallory")));
                assert_eq!(criteria.sex_wanted, Sex::Female);
                assert!(!left_previous);
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_reconnect_without_session_id() {
        let json = r#"{
            "type": "reconnect-to-session",
            "userId": "alice",
            "attributes": {"age": 25, "sex": "male"},
            "criteria": {"sexWanted": "female", "ageFrom": 20, "ageTo": 30}
        }"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::ReconnectToSession { session_id: None, .. }
        ));
    }

    #[test]
    fn test_clear_presence_deserialize() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type": "clear-presence"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::ClearPresence));
    }

    #[test]
    fn test_paired_serialize() {
        let msg = ServerMessage::Paired {
            session_id: SessionId::from("a_b"),
            user_a: UserId::from("a"),
            user_b: UserId::from("b"),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"paired\""));
        assert!(json.contains("\"sessionId\":\"a_b\""));
        assert!(json.contains("\"userA\":\"a\""));
    }

    #[test]
    fn test_unit_variant_serialize() {
        let json = serde_json::to_string(&ServerMessage::AlreadyActive).unwrap();
        assert_eq!(json, r#"{"type":"already-active"}"#);
    }

    #[test]
    fn test_error_code_serialize() {
        let msg: ServerMessage = AppError::SessionFull(SessionId::from("a_b")).into();
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"code\":\"session_full\""));
    }

    #[test]
    fn test_already_active_error_maps_to_notification() {
        let msg: ServerMessage = AppError::AlreadyActive.into();
        assert!(matches!(msg, ServerMessage::AlreadyActive));
    }
}
