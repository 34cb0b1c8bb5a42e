//! Room struct definition
//!
//! A room is the set of connections joined under one `SessionId`.
//! Membership is per connection, so a user with a stale tab can appear
//! twice until the duplicate is reconciled away.

use crate::types::{ConnectionId, SessionId, UserId};

/// Paired chat room
#[derive(Debug)]
pub struct Room {
    /// Session this room belongs to
    pub id: SessionId,
    /// Joined connections, in join order
    members: Vec<ConnectionId>,
}

impl Room {
    /// Create an empty room
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            members: Vec::new(),
        }
    }

    /// Join a connection. Returns false if it was already a member.
    pub fn join(&mut self, connection_id: ConnectionId) -> bool {
        if self.contains(connection_id) {
            false
        } else {
            self.members.push(connection_id);
            true
        }
    }

    /// Remove a connection. Returns false if it was not a member.
    pub fn leave(&mut self, connection_id: ConnectionId) -> bool {
        let before = self.members.len();
        self.members.retain(|id| *id != connection_id);
        self.members.len() != before
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.members.contains(&connection_id)
    }

    pub fn members(&self) -> &[ConnectionId] {
        &self.members
    }

    /// Number of joined connections
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members bound to `user_id`, other than `keep`
    ///
    /// `user_of` resolves a connection to the identity it is bound to.
    /// These are the connections to evict when `user_id` (re)joins.
    pub fn stale_connections<'a, F>(
        &self,
        user_id: &UserId,
        keep: Option<ConnectionId>,
        user_of: F,
    ) -> Vec<ConnectionId>
    where
        F: Fn(ConnectionId) -> Option<&'a UserId>,
    {
        self.members
            .iter()
            .copied()
            .filter(|id| Some(*id) != keep)
            .filter(|id| user_of(*id) == Some(user_id))
            .collect()
    }

    /// Whether any member connection is bound to `user_id`
    pub fn has_user<'a, F>(&self, user_id: &UserId, user_of: F) -> bool
    where
        F: Fn(ConnectionId) -> Option<&'a UserId>,
    {
        self.members
            .iter()
            .any(|id| user_of(*id) == Some(user_id))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn room() -> Room {
        Room::new(SessionId::from("a_b"))
    }

    #[test]
    fn test_room_creation() {
        let room = room();
        assert_eq!(room.id, SessionId::from("a_b"));
        assert!(room.is_empty());
        assert_eq!(room.member_count(), 0);
    }

    #[test]
    fn test_join_and_leave() {
        let mut room = room();
        let c1 = ConnectionId::new();
        let c2 = ConnectionId::new();

        assert!(room.join(c1));
        assert!(!room.join(c1));
        assert!(room.join(c2));
        assert_eq!(room.member_count(), 2);
        assert_eq!(room.members(), &[c1, c2]);

        assert!(room.leave(c1));
        assert!(!room.leave(c1));
        assert!(!room.contains(c1));
        assert!(room.contains(c2));
        assert_eq!(room.member_count(), 1);
    }

    #[test]
    fn test_stale_connections_skip_kept_and_foreign() {
        let mut room = room();
        let alice = UserId::from("a");
        let bob = UserId::from("b");
        let old_tab = ConnectionId::new();
        let new_tab = ConnectionId::new();
        let bob_conn = ConnectionId::new();

        let bindings: HashMap<ConnectionId, UserId> = [
            (old_tab, alice.clone()),
            (new_tab, alice.clone()),
            (bob_conn, bob.clone()),
        ]
        .into_iter()
        .collect();

        room.join(old_tab);
        room.join(bob_conn);
        room.join(new_tab);

        let stale = room.stale_connections(&alice, Some(new_tab), |id| bindings.get(&id));
        assert_eq!(stale, vec![old_tab]);

        let all_alice = room.stale_connections(&alice, None, |id| bindings.get(&id));
        assert_eq!(all_alice, vec![old_tab, new_tab]);

        assert!(room.has_user(&bob, |id| bindings.get(&id)));
        assert!(!room.has_user(&UserId::from("c"), |id| bindings.get(&id)));
    }
}
