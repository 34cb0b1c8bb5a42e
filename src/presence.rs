//! Presence registry
//!
//! Tracks which user identities currently hold a session or queue slot,
//! and which connection owns that presence.

use std::collections::HashMap;

use crate::types::{ConnectionId, UserId};

/// UserId -> owning connection
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    active: HashMap<UserId, ConnectionId>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a user active, owned by `connection_id`
    ///
    /// Idempotent. Marking an already-active user moves ownership.
    pub fn mark_active(&mut self, user_id: UserId, connection_id: ConnectionId) {
        self.active.insert(user_id, connection_id);
    }

    /// Remove a user. No-op if absent.
    pub fn clear(&mut self, user_id: &UserId) {
        self.active.remove(user_id);
    }

    pub fn is_active(&self, user_id: &UserId) -> bool {
        self.active.contains_key(user_id)
    }

    /// Connection currently owning the user's presence
    pub fn owner(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.active.get(user_id).copied()
    }

    /// Drop every identity for which `is_live` reports no live connection
    ///
    /// Repairs entries left behind by connections that vanished without a
    /// disconnect event. Returns the removed identities.
    pub fn sweep<F>(&mut self, mut is_live: F) -> Vec<UserId>
    where
        F: FnMut(&UserId, ConnectionId) -> bool,
    {
        let stale: Vec<UserId> = self
            .active
            .iter()
            .filter(|(user_id, conn)| !is_live(*user_id, **conn))
            .map(|(user_id, _)| user_id.clone())
            .collect();

        for user_id in &stale {
            self.active.remove(user_id);
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
