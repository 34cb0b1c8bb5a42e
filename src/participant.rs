//! Participant records
//!
//! A participant is a pending pairing request: who the user is and who
//! they are looking for.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::{ConnectionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

/// Attributes a user declares about themselves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAttributes {
    pub age: u32,
    pub sex: Sex,
    /// Identities this user refuses to be matched with
    #[serde(default)]
    pub block_list: HashSet<UserId>,
}

impl UserAttributes {
    pub fn blocks(&self, user_id: &UserId) -> bool {
        self.block_list.contains(user_id)
    }
}

/// What a user is looking for in an interlocutor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCriteria {
    pub sex_wanted: Sex,
    pub age_from: u32,
    pub age_to: u32,
}

impl MatchCriteria {
    /// Inclusive age range check
    pub fn accepts_age(&self, age: u32) -> bool {
        age >= self.age_from && age <= self.age_to
    }
}

/// Pending pairing request held in the waiting queue
#[derive(Debug, Clone)]
pub struct Participant {
    pub user_id: UserId,
    pub connection_id: ConnectionId,
    pub attributes: UserAttributes,
    pub criteria: MatchCriteria,
}

impl Participant {
    pub fn new(
        user_id: UserId,
        connection_id: ConnectionId,
        attributes: UserAttributes,
        criteria: MatchCriteria,
    ) -> Self {
        Self {
            user_id,
            connection_id,
            attributes,
            criteria,
        }
    }
}

/// Build a participant with a fresh connection id (test helper)
#[cfg(test)]
pub(crate) fn sample(
    user: &str,
    age: u32,
    sex: Sex,
    sex_wanted: Sex,
    age_from: u32,
    age_to: u32,
) -> Participant {
    Participant::new(
        UserId::from(user),
        ConnectionId::new(),
        UserAttributes {
            age,
            sex,
            block_list: HashSet::new(),
        },
        MatchCriteria {
            sex_wanted,
            age_from,
            age_to,
        },
    )
}
