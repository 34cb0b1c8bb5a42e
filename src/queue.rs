//! Waiting queue of unmatched participants

use std::collections::VecDeque;

use crate::matcher;
use crate::participant::Participant;
use crate::types::{ConnectionId, UserId};

/// Ordered queue of participants awaiting a match
///
/// Holds at most one entry per user identity: enqueueing a user that is
/// already waiting replaces the old entry in place.
#[derive(Debug, Default)]
pub struct WaitingQueue {
    entries: VecDeque<Participant>,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a participant, replacing any entry for the same user
    ///
    /// Returns the replaced entry, if there was one.
    pub fn enqueue(&mut self, participant: Participant) -> Option<Participant> {
        match self
            .entries
            .iter_mut()
            .find(|p| p.user_id == participant.user_id)
        {
            Some(existing) => Some(std::mem::replace(existing, participant)),
            None => {
                self.entries.push_back(participant);
                None
            }
        }
    }

    /// Find the first entry compatible with `candidate`
    pub fn find_match(&self, candidate: &Participant) -> Option<&Participant> {
        matcher::find_match(candidate, &self.entries)
    }

    /// Remove the entry of a user, returning it if present
    pub fn remove_user(&mut self, user_id: &UserId) -> Option<Participant> {
        let pos = self.entries.iter().position(|p| &p.user_id == user_id)?;
        self.entries.remove(pos)
    }

    /// Remove the entry owned by a connection, returning it if present
    pub fn remove_connection(&mut self, connection_id: ConnectionId) -> Option<Participant> {
        let pos = self
            .entries
            .iter()
            .position(|p| p.connection_id == connection_id)?;
        self.entries.remove(pos)
    }

    pub fn contains_user(&self, user_id: &UserId) -> bool {
        self.entries.iter().any(|p| &p.user_id == user_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Participant> {
        self.entries.iter()
    }
}
