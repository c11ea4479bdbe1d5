//! Typed emission helpers for lifecycle and membership events.
//!
//! One helper per event name; each builds the `{"type", ..., "message"}`
//! envelope and picks the target topics. Serialization failures are logged
//! and swallowed since events are advisory.

use serde::Serialize;
use tracing::warn;

use crate::{
    dao::models::ChallengeEntity,
    dto::events::{
        ChallengeCreatedEvent, ChallengeUpdatedEvent, ServerEvent, StatusChangedEvent,
        UserJoinedEvent, UserLeftEvent,
    },
    state::EventBroadcaster,
};

const EVENT_CHALLENGE_CREATED: &str = "challenge_created";
const EVENT_CHALLENGE_UPDATED: &str = "challenge_updated";
const EVENT_USER_JOINED: &str = "user_joined_challenge";
const EVENT_USER_LEFT: &str = "user_left_challenge";
const EVENT_STATUS_CHANGED: &str = "challenge_status_changed";

/// Notify the owner and every invited user about a freshly created challenge.
pub fn broadcast_challenge_created(broadcaster: &EventBroadcaster, challenge: &ChallengeEntity) {
    let payload = ChallengeCreatedEvent {
        message: format!("Challenge `{}` created", challenge.title),
        challenge: challenge.clone().into(),
    };

    let Some(event) = build_event(EVENT_CHALLENGE_CREATED, &payload) else {
        return;
    };

    let recipients = std::iter::once(challenge.owner_id.as_str())
        .chain(challenge.invited_user_ids.iter().map(String::as_str));
    broadcaster.publish_to_users(recipients, event);
}

/// Notify watchers of a challenge about an owner-initiated update.
pub fn broadcast_challenge_updated(broadcaster: &EventBroadcaster, challenge: &ChallengeEntity) {
    let payload = ChallengeUpdatedEvent {
        message: format!("Challenge `{}` was updated", challenge.title),
        challenge: challenge.clone().into(),
    };

    if let Some(event) = build_event(EVENT_CHALLENGE_UPDATED, &payload) {
        broadcaster.publish_to_challenge(challenge.id, event);
    }
}

/// Notify watchers of a challenge that a member joined.
pub fn broadcast_user_joined(
    broadcaster: &EventBroadcaster,
    challenge: &ChallengeEntity,
    user_id: &str,
) {
    let payload = UserJoinedEvent {
        challenge_id: challenge.id,
        user_id: user_id.to_owned(),
        message: format!("{user_id} joined `{}`", challenge.title),
        challenge: challenge.clone().into(),
    };

    if let Some(event) = build_event(EVENT_USER_JOINED, &payload) {
        broadcaster.publish_to_challenge(challenge.id, event);
    }
}

/// Notify watchers of a challenge that a member left.
pub fn broadcast_user_left(
    broadcaster: &EventBroadcaster,
    challenge: &ChallengeEntity,
    user_id: &str,
) {
    let payload = UserLeftEvent {
        challenge_id: challenge.id,
        user_id: user_id.to_owned(),
        message: format!("{user_id} left `{}`", challenge.title),
        challenge: challenge.clone().into(),
    };

    if let Some(event) = build_event(EVENT_USER_LEFT, &payload) {
        broadcaster.publish_to_challenge(challenge.id, event);
    }
}

/// Notify watchers of a challenge that the scheduler observed a lifecycle
/// transition.
pub fn broadcast_status_changed(broadcaster: &EventBroadcaster, challenge: &ChallengeEntity) {
    let payload = StatusChangedEvent {
        challenge_id: challenge.id,
        new_status: challenge.status,
        message: format!("Challenge `{}` is now {}", challenge.title, challenge.status),
        challenge: challenge.clone().into(),
    };

    if let Some(event) = build_event(EVENT_STATUS_CHANGED, &payload) {
        broadcaster.publish_to_challenge(challenge.id, event);
    }
}

fn build_event(name: &str, payload: &impl Serialize) -> Option<ServerEvent> {
    match ServerEvent::json(name, payload) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(event = name, error = %err, "failed to serialize event payload");
            None
        }
    }
}
