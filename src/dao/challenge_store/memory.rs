//! In-memory challenge store.
//!
//! Backs unit tests and feature-less builds. Each mutation takes the write
//! lock for its whole check-and-apply sequence, which gives the exact
//! observable semantics of the MongoDB backend's conditional filters.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::dao::challenge_store::ChallengeStore;
use crate::dao::models::ChallengeEntity;
use crate::dao::storage::StorageResult;
use crate::state::lifecycle::ChallengeStatus;

/// Process-local [`ChallengeStore`] backed by a `HashMap`.
#[derive(Clone, Default)]
pub struct MemoryChallengeStore {
    records: Arc<RwLock<HashMap<Uuid, ChallengeEntity>>>,
}

impl MemoryChallengeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChallengeStore for MemoryChallengeStore {
    fn insert(&self, challenge: ChallengeEntity) -> BoxFuture<'static, StorageResult<()>> {
        let records = self.records.clone();
        Box::pin(async move {
            records.write().await.insert(challenge.id, challenge);
            Ok(())
        })
    }

    fn join(
        &self,
        id: Uuid,
        user_id: String,
        ticket_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>> {
        let records = self.records.clone();
        Box::pin(async move {
            let mut guard = records.write().await;
            let Some(challenge) = guard.get_mut(&id) else {
                return Ok(None);
            };
            if !challenge.status.allows_join()
                || challenge.is_member(&user_id)
                || !challenge.has_capacity()
            {
                return Ok(None);
            }

            challenge.member_ids.push(user_id.clone());
            challenge.invited_user_ids.retain(|invited| invited != &user_id);
            challenge.ticket_ids.insert(user_id, ticket_id);
            challenge.updated_at = SystemTime::now();
            Ok(Some(challenge.clone()))
        })
    }

    fn leave(
        &self,
        id: Uuid,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>> {
        let records = self.records.clone();
        Box::pin(async move {
            let mut guard = records.write().await;
            let Some(challenge) = guard.get_mut(&id) else {
                return Ok(None);
            };
            if !challenge.status.allows_leave()
                || challenge.owner_id == user_id
                || !challenge.is_member(&user_id)
            {
                return Ok(None);
            }

            challenge.member_ids.retain(|member| member != &user_id);
            challenge.ticket_ids.remove(&user_id);
            challenge.updated_at = SystemTime::now();
            Ok(Some(challenge.clone()))
        })
    }

    fn update_status(
        &self,
        id: Uuid,
        status: ChallengeStatus,
        owner_id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>> {
        let records = self.records.clone();
        Box::pin(async move {
            let mut guard = records.write().await;
            let Some(challenge) = guard.get_mut(&id) else {
                return Ok(None);
            };
            if let Some(owner) = owner_id
                && challenge.owner_id != owner
            {
                return Ok(None);
            }

            challenge.status = status;
            challenge.updated_at = SystemTime::now();
            Ok(Some(challenge.clone()))
        })
    }

    fn delete(&self, id: Uuid, owner_id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let records = self.records.clone();
        Box::pin(async move {
            let mut guard = records.write().await;
            let owned = guard
                .get(&id)
                .is_some_and(|challenge| challenge.owner_id == owner_id);
            if owned {
                guard.remove(&id);
            }
            Ok(owned)
        })
    }

    fn find(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>> {
        let records = self.records.clone();
        Box::pin(async move { Ok(records.read().await.get(&id).cloned()) })
    }

    fn list(
        &self,
        page: u64,
        limit: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeEntity>>> {
        let records = self.records.clone();
        Box::pin(async move {
            let mut all: Vec<ChallengeEntity> = records.read().await.values().cloned().collect();
            all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            let skip = page.saturating_sub(1) as usize * limit.max(0) as usize;
            Ok(all.into_iter().skip(skip).take(limit.max(0) as usize).collect())
        })
    }

    fn find_by_game(
        &self,
        game_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeEntity>>> {
        let records = self.records.clone();
        Box::pin(async move {
            Ok(records
                .read()
                .await
                .values()
                .filter(|challenge| challenge.game_id == game_id)
                .cloned()
                .collect())
        })
    }

    fn find_for_user(
        &self,
        user_id: String,
        status: Option<ChallengeStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeEntity>>> {
        let records = self.records.clone();
        Box::pin(async move {
            Ok(records
                .read()
                .await
                .values()
                .filter(|challenge| {
                    challenge.is_member(&user_id)
                        && status.is_none_or(|wanted| challenge.status == wanted)
                })
                .cloned()
                .collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn challenge(owner: &str, max_members: Option<u32>) -> ChallengeEntity {
        let mut entity = ChallengeEntity::new(
            owner.to_string(),
            "2024020001".to_string(),
            "Friday night picks".to_string(),
        );
        entity.max_members = max_members;
        entity
    }

    async fn seeded(entity: ChallengeEntity) -> (MemoryChallengeStore, Uuid) {
        let store = MemoryChallengeStore::new();
        let id = entity.id;
        store.insert(entity).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn join_then_leave_scenario() {
        let (store, id) = seeded(challenge("u1", Some(2))).await;

        let joined = store
            .join(id, "u2".into(), "ticket-a".into())
            .await
            .unwrap()
            .expect("u2 should join");
        assert_eq!(joined.member_ids, vec!["u1", "u2"]);
        assert_eq!(joined.ticket_ids.get("u2"), Some(&"ticket-a".to_string()));

        // Full: third join rejected.
        assert!(store.join(id, "u3".into(), "ticket-b".into()).await.unwrap().is_none());

        // Owner can never leave.
        assert!(store.leave(id, "u1".into()).await.unwrap().is_none());

        let left = store
            .leave(id, "u2".into())
            .await
            .unwrap()
            .expect("u2 should leave");
        assert_eq!(left.member_ids, vec!["u1"]);
        assert!(!left.ticket_ids.contains_key("u2"));
    }

    #[tokio::test]
    async fn duplicate_join_fails_without_mutating() {
        let (store, id) = seeded(challenge("u1", None)).await;
        store.join(id, "u2".into(), "t1".into()).await.unwrap().unwrap();

        let before = store.find(id).await.unwrap().unwrap();
        assert!(store.join(id, "u2".into(), "t2".into()).await.unwrap().is_none());
        let after = store.find(id).await.unwrap().unwrap();

        assert_eq!(before.member_ids, after.member_ids);
        assert_eq!(after.ticket_ids.get("u2"), Some(&"t1".to_string()));
    }

    #[tokio::test]
    async fn leave_by_non_member_fails() {
        let (store, id) = seeded(challenge("u1", None)).await;
        assert!(store.leave(id, "stranger".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn join_removes_pending_invite() {
        let mut entity = challenge("u1", None);
        entity.invited_user_ids = vec!["u2".into(), "u3".into()];
        let (store, id) = seeded(entity).await;

        let joined = store.join(id, "u2".into(), "t".into()).await.unwrap().unwrap();
        assert_eq!(joined.invited_user_ids, vec!["u3"]);
    }

    #[tokio::test]
    async fn join_rejected_once_live() {
        let (store, id) = seeded(challenge("u1", None)).await;
        store
            .update_status(id, ChallengeStatus::Live, None)
            .await
            .unwrap()
            .unwrap();
        assert!(store.join(id, "u2".into(), "t".into()).await.unwrap().is_none());
        assert!(store.leave(id, "u2".into()).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_joins_never_exceed_capacity() {
        let (store, id) = seeded(challenge("u1", Some(2))).await;

        let attempts = (0..8).map(|n| {
            let store = store.clone();
            tokio::spawn(async move { store.join(id, format!("user-{n}"), format!("ticket-{n}")).await })
        });

        let mut successes = 0;
        let mut conflicts = 0;
        for handle in attempts {
            match handle.await.unwrap().unwrap() {
                Some(_) => successes += 1,
                None => conflicts += 1,
            }
        }

        // Owner occupies one of the two slots.
        assert_eq!(successes, 1);
        assert_eq!(conflicts, 7);

        let final_state = store.find(id).await.unwrap().unwrap();
        assert_eq!(final_state.member_ids.len(), 2);
    }

    #[tokio::test]
    async fn delete_is_owner_scoped() {
        let (store, id) = seeded(challenge("u1", None)).await;
        assert!(!store.delete(id, "u2".into()).await.unwrap());
        assert!(store.find(id).await.unwrap().is_some());
        assert!(store.delete(id, "u1".into()).await.unwrap());
        assert!(store.find(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_status_owner_scope_mismatch_is_a_miss() {
        let (store, id) = seeded(challenge("u1", None)).await;
        let miss = store
            .update_status(id, ChallengeStatus::Cancelled, Some("u2".into()))
            .await
            .unwrap();
        assert!(miss.is_none());
        let hit = store
            .update_status(id, ChallengeStatus::Cancelled, Some("u1".into()))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.status, ChallengeStatus::Cancelled);
    }

    #[tokio::test]
    async fn find_for_user_filters_by_membership_and_status() {
        let store = MemoryChallengeStore::new();
        let mut first = challenge("u1", None);
        first.member_ids.push("u2".into());
        let second = challenge("u2", None);
        let mut third = challenge("u3", None);
        third.status = ChallengeStatus::Live;
        third.member_ids.push("u2".into());
        for entity in [first, second, third] {
            store.insert(entity).await.unwrap();
        }

        let all = store.find_for_user("u2".into(), None).await.unwrap();
        assert_eq!(all.len(), 3);

        let live = store
            .find_for_user("u2".into(), Some(ChallengeStatus::Live))
            .await
            .unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].owner_id, "u3");
    }

    #[tokio::test]
    async fn list_pages_newest_first() {
        let store = MemoryChallengeStore::new();
        let mut ids = Vec::new();
        for n in 0..5 {
            let mut entity = challenge(&format!("owner-{n}"), None);
            entity.created_at = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(n);
            ids.push(entity.id);
            store.insert(entity).await.unwrap();
        }

        let first_page = store.list(1, 2).await.unwrap();
        assert_eq!(first_page.len(), 2);
        assert_eq!(first_page[0].owner_id, "owner-4");
        let third_page = store.list(3, 2).await.unwrap();
        assert_eq!(third_page.len(), 1);
        assert_eq!(third_page[0].owner_id, "owner-0");
    }
}
