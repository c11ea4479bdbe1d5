pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::ChallengeEntity;
use crate::dao::storage::StorageResult;
use crate::state::lifecycle::ChallengeStatus;

/// Abstraction over the persistence layer for challenge records.
///
/// Every mutating method is a single conditional read-and-write against one
/// record. Methods returning `Option<ChallengeEntity>` yield `None` when the
/// condition matched nothing; the backend does not report which part of the
/// predicate failed, and callers map `None` to a conflict outcome. This
/// single-round-trip atomicity is the only synchronization primitive the
/// concurrency model relies on.
pub trait ChallengeStore: Send + Sync {
    /// Persist a freshly created challenge.
    fn insert(&self, challenge: ChallengeEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Add `user_id` as a member, recording its ticket and clearing any
    /// pending invite, provided the challenge exists, is joinable
    /// (`PENDING`/`ACTIVE`), the user is not already a member, and capacity
    /// allows. Returns the updated entity, or `None` if the predicate failed.
    fn join(
        &self,
        id: Uuid,
        user_id: String,
        ticket_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>>;

    /// Remove `user_id` and its ticket mapping, provided the user is a
    /// non-owner member and the challenge is still in `PENDING`/`ACTIVE`.
    fn leave(
        &self,
        id: Uuid,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>>;

    /// Set the status field, optionally scoped to a given owner. The store
    /// does not validate lifecycle edges; that is the caller's contract.
    fn update_status(
        &self,
        id: Uuid,
        status: ChallengeStatus,
        owner_id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>>;

    /// Delete the challenge when `owner_id` owns it. Returns whether a record
    /// was removed ("missing" and "not owner" are indistinguishable).
    fn delete(&self, id: Uuid, owner_id: String) -> BoxFuture<'static, StorageResult<bool>>;

    /// Fetch a single challenge by id.
    fn find(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>>;

    /// List challenges, newest first. `page` is 1-based.
    fn list(
        &self,
        page: u64,
        limit: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeEntity>>>;

    /// All challenges tracking the given external game.
    fn find_by_game(
        &self,
        game_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeEntity>>>;

    /// All challenges the user participates in, optionally filtered by status.
    fn find_for_user(
        &self,
        user_id: String,
        status: Option<ChallengeStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeEntity>>>;

    /// Cheap connectivity probe used by the storage supervisor.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;

    /// Attempt to re-establish the backend connection after a failed probe.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
