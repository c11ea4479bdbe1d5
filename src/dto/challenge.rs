use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;
use validator::Validate;

use crate::{dao::models::ChallengeEntity, state::lifecycle::ChallengeStatus};

use super::format_system_time;

/// Payload accepted when an owner creates a challenge.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateChallengeRequest {
    /// Display title.
    #[validate(length(min = 1, max = 100, message = "title must be 1-100 characters"))]
    pub title: String,
    /// Optional longer description.
    #[validate(length(max = 500, message = "description must be at most 500 characters"))]
    pub description: Option<String>,
    /// External game the challenge tracks.
    #[validate(length(min = 1, message = "game id must not be empty"))]
    pub game_id: String,
    /// Optional membership cap.
    #[validate(range(min = 2, max = 50, message = "max members must be between 2 and 50"))]
    pub max_members: Option<u32>,
    /// Users to invite at creation time.
    #[serde(default)]
    pub invited_user_ids: Vec<String>,
    /// Ticket the owner plays, recorded since the owner is auto-joined.
    pub ticket_id: Option<String>,
    /// Scheduled start of the tracked game, when the client knows it.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub game_start_time: Option<OffsetDateTime>,
}

/// Read-model of a challenge shared with clients, both in replies and inside
/// event payloads.
#[derive(Debug, Clone, Serialize)]
pub struct ChallengeSummary {
    pub id: Uuid,
    pub owner_id: String,
    pub game_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: ChallengeStatus,
    pub member_ids: Vec<String>,
    pub invited_user_ids: Vec<String>,
    pub ticket_ids: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_members: Option<u32>,
    pub member_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_start_time: Option<String>,
    pub created_at: String,
    /// Coarse last-write marker; reconnecting clients compare it against
    /// their local copy instead of replaying missed events.
    pub updated_at: String,
}

impl From<ChallengeEntity> for ChallengeSummary {
    fn from(value: ChallengeEntity) -> Self {
        Self {
            id: value.id,
            owner_id: value.owner_id,
            game_id: value.game_id,
            title: value.title,
            description: value.description,
            status: value.status,
            member_count: value.member_ids.len(),
            member_ids: value.member_ids,
            invited_user_ids: value.invited_user_ids,
            ticket_ids: value.ticket_ids,
            max_members: value.max_members,
            game_start_time: value.game_start_time.map(format_system_time),
            created_at: format_system_time(value.created_at),
            updated_at: format_system_time(value.updated_at),
        }
    }
}
