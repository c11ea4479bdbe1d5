use std::collections::HashMap;

use mongodb::bson::{Binary, DateTime, Document, doc, spec::BinarySubtype};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::ChallengeEntity;
use crate::state::lifecycle::ChallengeStatus;

/// Persisted shape of a challenge in the `challenges` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoChallengeDocument {
    #[serde(rename = "_id")]
    id: Uuid,
    owner_id: String,
    game_id: String,
    title: String,
    description: Option<String>,
    status: ChallengeStatus,
    member_ids: Vec<String>,
    invited_user_ids: Vec<String>,
    #[serde(default)]
    ticket_ids: HashMap<String, String>,
    max_members: Option<u32>,
    game_start_time: Option<DateTime>,
    created_at: DateTime,
    updated_at: DateTime,
}

impl From<ChallengeEntity> for MongoChallengeDocument {
    fn from(value: ChallengeEntity) -> Self {
        Self {
            id: value.id,
            owner_id: value.owner_id,
            game_id: value.game_id,
            title: value.title,
            description: value.description,
            status: value.status,
            member_ids: value.member_ids,
            invited_user_ids: value.invited_user_ids,
            ticket_ids: value.ticket_ids,
            max_members: value.max_members,
            game_start_time: value.game_start_time.map(DateTime::from_system_time),
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl From<MongoChallengeDocument> for ChallengeEntity {
    fn from(value: MongoChallengeDocument) -> Self {
        Self {
            id: value.id,
            owner_id: value.owner_id,
            game_id: value.game_id,
            title: value.title,
            description: value.description,
            status: value.status,
            member_ids: value.member_ids,
            invited_user_ids: value.invited_user_ids,
            ticket_ids: value.ticket_ids,
            max_members: value.max_members,
            game_start_time: value.game_start_time.map(DateTime::to_system_time),
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        }
    }
}

pub fn uuid_as_binary(id: Uuid) -> Binary {
    Binary {
        subtype: BinarySubtype::Uuid,
        bytes: id.into_bytes().to_vec(),
    }
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": uuid_as_binary(id)}
}
