//! Challenge lifecycle orchestration: validation, store calls, event fan-out.
//!
//! Handlers and the WebSocket layer call into here; nothing in this module
//! touches persistence directly except through the installed
//! [`ChallengeStore`]. Conflict semantics are coarse on purpose: the store
//! reports only that a conditional write matched nothing, and the message
//! enumerates the possible causes instead of re-reading to disambiguate.

use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::ChallengeEntity,
    dto::challenge::CreateChallengeRequest,
    error::ServiceError,
    services::broadcast_events,
    state::{SharedState, lifecycle::ChallengeStatus},
};

/// Reject user ids that cannot safely become BSON map keys. Ticket mappings
/// are stored keyed by user id, and the document backend interprets `.` in a
/// field path as nesting and a leading `$` as an operator.
fn ensure_plain_user_id(user_id: &str) -> Result<(), ServiceError> {
    if user_id.is_empty() || user_id.contains('.') || user_id.starts_with('$') {
        return Err(ServiceError::InvalidInput(format!(
            "invalid user id `{user_id}`"
        )));
    }
    Ok(())
}

/// Validate and persist a new challenge owned by `owner_id`, then notify the
/// owner and everyone invited.
pub async fn create_challenge(
    state: &SharedState,
    owner_id: &str,
    request: CreateChallengeRequest,
) -> Result<ChallengeEntity, ServiceError> {
    request.validate()?;
    ensure_plain_user_id(owner_id)?;
    for invitee in &request.invited_user_ids {
        ensure_plain_user_id(invitee)?;
    }

    let mut challenge = ChallengeEntity::new(
        owner_id.to_owned(),
        request.game_id,
        request.title,
    );
    challenge.description = request.description.filter(|text| !text.is_empty());
    challenge.max_members = request.max_members;
    challenge.game_start_time = request.game_start_time.map(SystemTime::from);

    for invitee in request.invited_user_ids {
        if invitee != owner_id && !challenge.invited_user_ids.contains(&invitee) {
            challenge.invited_user_ids.push(invitee);
        }
    }
    if let Some(ticket_id) = request.ticket_id {
        challenge
            .ticket_ids
            .insert(owner_id.to_owned(), ticket_id);
    }

    let store = state.require_challenge_store().await?;
    store.insert(challenge.clone()).await?;
    info!(challenge_id = %challenge.id, owner_id, "challenge created");

    broadcast_events::broadcast_challenge_created(state.broadcaster(), &challenge);
    Ok(challenge)
}

/// Join `user_id` into a challenge with the ticket they picked.
pub async fn join_challenge(
    state: &SharedState,
    id: Uuid,
    user_id: &str,
    ticket_id: &str,
) -> Result<ChallengeEntity, ServiceError> {
    ensure_plain_user_id(user_id)?;
    if ticket_id.is_empty() {
        return Err(ServiceError::InvalidInput("ticket id must not be empty".into()));
    }

    let store = state.require_challenge_store().await?;
    let updated = store
        .join(id, user_id.to_owned(), ticket_id.to_owned())
        .await?
        .ok_or_else(|| {
            ServiceError::Conflict(
                "join rejected: challenge missing, full, already joined, or no longer open".into(),
            )
        })?;

    info!(challenge_id = %id, user_id, "user joined challenge");
    broadcast_events::broadcast_user_joined(state.broadcaster(), &updated, user_id);
    Ok(updated)
}

/// Remove `user_id` from a challenge, dropping its ticket mapping.
pub async fn leave_challenge(
    state: &SharedState,
    id: Uuid,
    user_id: &str,
) -> Result<ChallengeEntity, ServiceError> {
    ensure_plain_user_id(user_id)?;
    let store = state.require_challenge_store().await?;
    let updated = store
        .leave(id, user_id.to_owned())
        .await?
        .ok_or_else(|| {
            ServiceError::Conflict(
                "leave rejected: challenge missing, not a member, owner, or no longer open".into(),
            )
        })?;

    info!(challenge_id = %id, user_id, "user left challenge");
    broadcast_events::broadcast_user_left(state.broadcaster(), &updated, user_id);
    Ok(updated)
}

/// Apply a manual status transition, optionally scoped to the owner.
///
/// Lifecycle edges are validated against the current record before the write;
/// the store predicate then enforces ownership atomically. Setting the status
/// it already has is a no-op returning the current record.
pub async fn update_status(
    state: &SharedState,
    id: Uuid,
    new_status: ChallengeStatus,
    owner_id: Option<&str>,
) -> Result<ChallengeEntity, ServiceError> {
    let store = state.require_challenge_store().await?;
    let current = store
        .find(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("challenge {id} not found")))?;

    if current.status == new_status {
        return Ok(current);
    }
    current
        .status
        .transition(new_status)
        .map_err(|err| ServiceError::Conflict(err.to_string()))?;

    let updated = store
        .update_status(id, new_status, owner_id.map(str::to_owned))
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("challenge {id} not found or not owned by caller"))
        })?;

    info!(challenge_id = %id, status = %new_status, "challenge status updated");
    broadcast_events::broadcast_challenge_updated(state.broadcaster(), &updated);
    Ok(updated)
}

/// Delete a challenge; only the owner may do so.
pub async fn delete_challenge(
    state: &SharedState,
    id: Uuid,
    owner_id: &str,
) -> Result<(), ServiceError> {
    let store = state.require_challenge_store().await?;
    let removed = store.delete(id, owner_id.to_owned()).await?;
    if !removed {
        return Err(ServiceError::NotFound(format!(
            "challenge {id} not found or not owned by caller"
        )));
    }
    info!(challenge_id = %id, owner_id, "challenge deleted");
    Ok(())
}

/// Fetch a single challenge.
pub async fn get_challenge(
    state: &SharedState,
    id: Uuid,
) -> Result<ChallengeEntity, ServiceError> {
    let store = state.require_challenge_store().await?;
    store
        .find(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("challenge {id} not found")))
}

/// List challenges, newest first. `page` is 1-based.
pub async fn list_challenges(
    state: &SharedState,
    page: u64,
    limit: i64,
) -> Result<Vec<ChallengeEntity>, ServiceError> {
    let store = state.require_challenge_store().await?;
    Ok(store.list(page.max(1), limit).await?)
}

/// Challenges `user_id` participates in, optionally filtered by status.
pub async fn challenges_for_user(
    state: &SharedState,
    user_id: &str,
    status: Option<ChallengeStatus>,
) -> Result<Vec<ChallengeEntity>, ServiceError> {
    let store = state.require_challenge_store().await?;
    Ok(store.find_for_user(user_id.to_owned(), status).await?)
}

/// Challenges tracking the given external game.
pub async fn challenges_for_game(
    state: &SharedState,
    game_id: &str,
) -> Result<Vec<ChallengeEntity>, ServiceError> {
    let store = state.require_challenge_store().await?;
    Ok(store.find_by_game(game_id.to_owned()).await?)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::challenge_store::{ChallengeStore, memory::MemoryChallengeStore},
        state::{AppState, EventBroadcaster, Topic},
    };

    async fn app_state() -> SharedState {
        let state = AppState::new(AppConfig::default(), Arc::new(EventBroadcaster::new(8)));
        state
            .install_challenge_store(Arc::new(MemoryChallengeStore::new()) as Arc<dyn ChallengeStore>)
            .await;
        state
    }

    fn request(title: &str) -> CreateChallengeRequest {
        CreateChallengeRequest {
            title: title.into(),
            description: None,
            game_id: "2024020001".into(),
            max_members: Some(4),
            invited_user_ids: vec![],
            ticket_id: None,
            game_start_time: None,
        }
    }

    #[tokio::test]
    async fn create_rejects_invalid_payloads() {
        let state = app_state().await;
        let result = create_challenge(&state, "u1", request("")).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn create_notifies_owner_and_invitees_and_dedups_invites() {
        let state = app_state().await;
        let mut owner_rx = state.broadcaster().subscribe(Topic::User("u1".into()));
        let mut invitee_rx = state.broadcaster().subscribe(Topic::User("u2".into()));

        let mut req = request("Friday picks");
        req.invited_user_ids = vec!["u2".into(), "u2".into(), "u1".into()];
        req.ticket_id = Some("ticket-owner".into());

        let challenge = create_challenge(&state, "u1", req).await.unwrap();
        assert_eq!(challenge.invited_user_ids, vec!["u2".to_string()]);
        assert_eq!(
            challenge.ticket_ids.get("u1"),
            Some(&"ticket-owner".to_string())
        );

        assert_eq!(owner_rx.recv().await.unwrap().event, "challenge_created");
        assert_eq!(invitee_rx.recv().await.unwrap().event, "challenge_created");
    }

    #[tokio::test]
    async fn join_emits_event_on_challenge_topic() {
        let state = app_state().await;
        let challenge = create_challenge(&state, "u1", request("picks")).await.unwrap();
        let mut rx = state
            .broadcaster()
            .subscribe(Topic::Challenge(challenge.id));

        let updated = join_challenge(&state, challenge.id, "u2", "ticket-a")
            .await
            .unwrap();
        assert!(updated.is_member("u2"));
        assert_eq!(rx.recv().await.unwrap().event, "user_joined_challenge");
    }

    #[tokio::test]
    async fn user_ids_with_path_characters_are_rejected() {
        let state = app_state().await;
        let challenge = create_challenge(&state, "u1", request("picks")).await.unwrap();

        // A dotted id would address a nested field in the ticket mapping.
        let result = join_challenge(&state, challenge.id, "a.b", "ticket").await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));

        let mut req = request("picks");
        req.invited_user_ids = vec!["$admin".into()];
        let result = create_challenge(&state, "u1", req).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));

        let result = create_challenge(&state, "a.b", request("picks")).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn join_conflicts_are_coarse() {
        let state = app_state().await;
        let challenge = create_challenge(&state, "u1", request("picks")).await.unwrap();

        // Owner is already a member.
        let result = join_challenge(&state, challenge.id, "u1", "ticket").await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));

        // Unknown challenge yields the same conflict shape.
        let result = join_challenge(&state, Uuid::new_v4(), "u2", "ticket").await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn leave_emits_event_and_owner_cannot_leave() {
        let state = app_state().await;
        let challenge = create_challenge(&state, "u1", request("picks")).await.unwrap();
        join_challenge(&state, challenge.id, "u2", "ticket-a")
            .await
            .unwrap();

        let mut rx = state
            .broadcaster()
            .subscribe(Topic::Challenge(challenge.id));

        let updated = leave_challenge(&state, challenge.id, "u2").await.unwrap();
        assert!(!updated.is_member("u2"));
        assert!(!updated.ticket_ids.contains_key("u2"));
        assert_eq!(rx.recv().await.unwrap().event, "user_left_challenge");

        let result = leave_challenge(&state, challenge.id, "u1").await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn manual_status_update_enforces_lifecycle_edges() {
        let state = app_state().await;
        let challenge = create_challenge(&state, "u1", request("picks")).await.unwrap();

        let updated = update_status(&state, challenge.id, ChallengeStatus::Active, Some("u1"))
            .await
            .unwrap();
        assert_eq!(updated.status, ChallengeStatus::Active);

        // Same status again is a no-op, not a conflict.
        let unchanged = update_status(&state, challenge.id, ChallengeStatus::Active, Some("u1"))
            .await
            .unwrap();
        assert_eq!(unchanged.status, ChallengeStatus::Active);

        let cancelled = update_status(&state, challenge.id, ChallengeStatus::Cancelled, Some("u1"))
            .await
            .unwrap();
        assert_eq!(cancelled.status, ChallengeStatus::Cancelled);

        // Terminal; nothing leaves CANCELLED.
        let result =
            update_status(&state, challenge.id, ChallengeStatus::Pending, Some("u1")).await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn manual_status_update_is_owner_scoped() {
        let state = app_state().await;
        let challenge = create_challenge(&state, "u1", request("picks")).await.unwrap();

        let result =
            update_status(&state, challenge.id, ChallengeStatus::Active, Some("u2")).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_is_owner_scoped() {
        let state = app_state().await;
        let challenge = create_challenge(&state, "u1", request("picks")).await.unwrap();

        let result = delete_challenge(&state, challenge.id, "u2").await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));

        delete_challenge(&state, challenge.id, "u1").await.unwrap();
        let result = get_challenge(&state, challenge.id).await;
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn operations_fail_cleanly_in_degraded_mode() {
        let state = AppState::new(AppConfig::default(), Arc::new(EventBroadcaster::new(8)));
        let result = create_challenge(&state, "u1", request("picks")).await;
        assert!(matches!(result, Err(ServiceError::Degraded)));
    }
}
