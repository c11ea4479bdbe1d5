use serde::Serialize;
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{dto::challenge::ChallengeSummary, state::lifecycle::ChallengeStatus};

/// Dispatched payload carried across broadcast topics.
///
/// `data` is the full wire envelope (`{"type": ..., ..., "message": ...}`)
/// already serialized, so fan-out paths clone a string instead of
/// re-serializing per subscriber.
#[derive(Clone, Debug)]
pub struct ServerEvent {
    /// Event name, duplicated inside `data` as the `type` field.
    pub event: String,
    /// Serialized JSON envelope.
    pub data: String,
}

impl ServerEvent {
    /// Serialize `payload` and stamp the event name into the envelope's
    /// `type` field.
    pub fn json<T>(event: &str, payload: &T) -> serde_json::Result<Self>
    where
        T: Serialize,
    {
        let mut value = serde_json::to_value(payload)?;
        if let Value::Object(fields) = &mut value {
            fields.insert("type".to_owned(), json!(event));
        }

        Ok(Self {
            event: event.to_owned(),
            data: value.to_string(),
        })
    }
}

/// Sent to the owner and every invited user when a challenge is created.
#[derive(Debug, Serialize)]
pub struct ChallengeCreatedEvent {
    pub challenge: ChallengeSummary,
    pub message: String,
}

/// Sent to the challenge topic after an owner-initiated update.
#[derive(Debug, Serialize)]
pub struct ChallengeUpdatedEvent {
    pub challenge: ChallengeSummary,
    pub message: String,
}

/// Sent to the challenge topic when a member joins.
#[derive(Debug, Serialize)]
pub struct UserJoinedEvent {
    pub challenge_id: Uuid,
    pub user_id: String,
    pub challenge: ChallengeSummary,
    pub message: String,
}

/// Sent to the challenge topic when a member leaves.
#[derive(Debug, Serialize)]
pub struct UserLeftEvent {
    pub challenge_id: Uuid,
    pub user_id: String,
    pub challenge: ChallengeSummary,
    pub message: String,
}

/// Sent to the challenge topic when the status-sync scheduler observes a
/// lifecycle transition.
#[derive(Debug, Serialize)]
pub struct StatusChangedEvent {
    pub challenge_id: Uuid,
    pub new_status: ChallengeStatus,
    pub challenge: ChallengeSummary,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_type_and_message() {
        #[derive(Serialize)]
        struct Payload {
            message: String,
        }

        let event = ServerEvent::json(
            "user_joined_challenge",
            &Payload {
                message: "u2 joined".into(),
            },
        )
        .unwrap();

        assert_eq!(event.event, "user_joined_challenge");
        let parsed: Value = serde_json::from_str(&event.data).unwrap();
        assert_eq!(parsed["type"], "user_joined_challenge");
        assert_eq!(parsed["message"], "u2 joined");
    }
}
