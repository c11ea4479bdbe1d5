use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::lifecycle::ChallengeStatus;

/// Aggregate challenge entity persisted by the storage layer.
///
/// All mutations go through the store as single conditional writes; nothing
/// else in the process holds a mutable copy of this record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChallengeEntity {
    /// Primary key of the challenge.
    pub id: Uuid,
    /// User who created the challenge; always present in `member_ids`.
    pub owner_id: String,
    /// Identifier of the external game this challenge tracks. Immutable.
    pub game_id: String,
    /// Display title chosen by the owner.
    pub title: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Current lifecycle status.
    pub status: ChallengeStatus,
    /// Participating user ids, in join order. Set semantics enforced by the
    /// store's conditional writes.
    pub member_ids: Vec<String>,
    /// Users invited but not yet joined; joining removes the id from here.
    pub invited_user_ids: Vec<String>,
    /// Ticket chosen by each member at join time, keyed by member id.
    pub ticket_ids: HashMap<String, String>,
    /// Optional membership cap (2..=50 when set).
    pub max_members: Option<u32>,
    /// Scheduled start of the tracked game, when known.
    pub game_start_time: Option<SystemTime>,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time any field of this entity changed.
    pub updated_at: SystemTime,
}

impl ChallengeEntity {
    /// Build a fresh `Pending` challenge with the owner auto-joined.
    pub fn new(owner_id: String, game_id: String, title: String) -> Self {
        let now = SystemTime::now();
        Self {
            id: Uuid::new_v4(),
            member_ids: vec![owner_id.clone()],
            owner_id,
            game_id,
            title,
            description: None,
            status: ChallengeStatus::Pending,
            invited_user_ids: Vec::new(),
            ticket_ids: HashMap::new(),
            max_members: None,
            game_start_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether `user_id` currently participates in the challenge.
    pub fn is_member(&self, user_id: &str) -> bool {
        self.member_ids.iter().any(|member| member == user_id)
    }

    /// Whether another member fits under `max_members` (unset = unbounded).
    pub fn has_capacity(&self) -> bool {
        match self.max_members {
            Some(cap) => (self.member_ids.len() as u32) < cap,
            None => true,
        }
    }
}
