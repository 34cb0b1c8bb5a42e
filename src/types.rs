//! Basic type definitions for the pairing server
//!
//! Provides newtype wrappers for type safety:
//! - `ConnectionId`: UUID-based identifier of one live WebSocket connection
//! - `UserId`: opaque, client-supplied user identity
//! - `SessionId`: deterministic identifier of a paired conversation

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique connection identifier (newtype pattern)
///
/// Issued once per accepted WebSocket and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque user identity
///
/// Supplied by the client at connection time and never authenticated.
/// One user may hold several connections at once (tabs, reconnects).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Session (room) identifier
///
/// Derived from the two paired identities, so both sides compute the same
/// value and a reconnecting client can name its room again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    /// Build the session id for a pair of users
    ///
    /// Sorts both identifiers and joins them with `_`, so
    /// `from_pair(a, b) == from_pair(b, a)`.
    pub fn from_pair(a: &UserId, b: &UserId) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{}_{}", first, second))
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_session_id_is_symmetric() {
        let alice = UserId::from("alice");
        let bob = UserId::from("bob");
        assert_eq!(
            SessionId::from_pair(&alice, &bob),
            SessionId::from_pair(&bob, &alice)
        );
    }

    #[test]
    fn test_session_id_format() {
        let id = SessionId::from_pair(&UserId::from("zed"), &UserId::from("amy"));
        assert_eq!(id.0, "amy_zed");
    }

    #[test]
    fn test_session_id_differs_per_pair() {
        let a = UserId::from("a");
        let b = UserId::from("b");
        let c = UserId::from("c");
        assert_ne!(SessionId::from_pair(&a, &b), SessionId::from_pair(&a, &c));
    }

    #[test]
    fn test_user_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&UserId::from("u-1")).unwrap();
        assert_eq!(json, "\"u-1\"");
    }
}
