use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Client, Collection, Database,
    bson::{Bson, DateTime, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoChallengeDocument, doc_id, uuid_as_binary},
};
use crate::dao::{
    challenge_store::ChallengeStore, models::ChallengeEntity, storage::StorageResult,
};
use crate::state::lifecycle::ChallengeStatus;

const CHALLENGE_COLLECTION_NAME: &str = "challenges";

/// MongoDB-backed [`ChallengeStore`].
///
/// Every mutation is one `findOneAndUpdate`/`deleteOne` whose filter carries
/// the full precondition, so concurrent callers race inside the database and
/// never inside this process.
#[derive(Clone)]
pub struct MongoChallengeStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.client.database(&self.config.database_name)
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

/// Filter fragment selecting challenges whose status still permits
/// membership changes.
fn joinable_status() -> Bson {
    Bson::from(doc! {
        "$in": [
            ChallengeStatus::Pending.as_str(),
            ChallengeStatus::Active.as_str(),
        ]
    })
}

impl MongoChallengeStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;

        for (index, keys) in [
            ("game_id", doc! {"game_id": 1}),
            ("member_ids", doc! {"member_ids": 1}),
            ("status", doc! {"status": 1}),
        ] {
            let model = mongodb::IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(format!("challenge_{index}_idx")))
                        .build(),
                )
                .build();

            collection
                .create_index(model)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: CHALLENGE_COLLECTION_NAME,
                    index,
                    source,
                })?;
        }

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoChallengeDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoChallengeDocument>(CHALLENGE_COLLECTION_NAME)
    }

    async fn insert_challenge(&self, challenge: ChallengeEntity) -> MongoResult<()> {
        let id = challenge.id;
        let document: MongoChallengeDocument = challenge.into();
        self.collection()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::InsertChallenge { id, source })?;
        Ok(())
    }

    /// Single conditional write implementing the join contract: not already a
    /// member, joinable status, and capacity left (unset cap means unbounded).
    async fn join_challenge(
        &self,
        id: Uuid,
        user_id: &str,
        ticket_id: &str,
    ) -> MongoResult<Option<ChallengeEntity>> {
        let filter = doc! {
            "_id": uuid_as_binary(id),
            "status": joinable_status(),
            "member_ids": { "$ne": user_id },
            "$or": [
                { "max_members": Bson::Null },
                { "$expr": { "$lt": [ { "$size": "$member_ids" }, "$max_members" ] } },
            ],
        };
        // The service layer rejects dotted or `$`-prefixed user ids, so this
        // field path always addresses a flat key of the ticket map.
        let update = doc! {
            "$addToSet": { "member_ids": user_id },
            "$pull": { "invited_user_ids": user_id },
            "$set": {
                format!("ticket_ids.{user_id}"): ticket_id,
                "updated_at": DateTime::now(),
            },
        };

        let updated = self
            .collection()
            .await
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateChallenge { id, source })?;

        Ok(updated.map(Into::into))
    }

    async fn leave_challenge(
        &self,
        id: Uuid,
        user_id: &str,
    ) -> MongoResult<Option<ChallengeEntity>> {
        let filter = doc! {
            "_id": uuid_as_binary(id),
            "status": joinable_status(),
            "member_ids": user_id,
            "owner_id": { "$ne": user_id },
        };
        let update = doc! {
            "$pull": { "member_ids": user_id },
            "$unset": { format!("ticket_ids.{user_id}"): "" },
            "$set": { "updated_at": DateTime::now() },
        };

        let updated = self
            .collection()
            .await
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateChallenge { id, source })?;

        Ok(updated.map(Into::into))
    }

    async fn update_challenge_status(
        &self,
        id: Uuid,
        status: ChallengeStatus,
        owner_id: Option<&str>,
    ) -> MongoResult<Option<ChallengeEntity>> {
        let mut filter = doc_id(id);
        if let Some(owner) = owner_id {
            filter.insert("owner_id", owner);
        }
        let update = doc! {
            "$set": { "status": status.as_str(), "updated_at": DateTime::now() },
        };

        let updated = self
            .collection()
            .await
            .find_one_and_update(filter, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateChallenge { id, source })?;

        Ok(updated.map(Into::into))
    }

    async fn delete_challenge(&self, id: Uuid, owner_id: &str) -> MongoResult<bool> {
        let result = self
            .collection()
            .await
            .delete_one(doc! { "_id": uuid_as_binary(id), "owner_id": owner_id })
            .await
            .map_err(|source| MongoDaoError::DeleteChallenge { id, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn find_challenge(&self, id: Uuid) -> MongoResult<Option<ChallengeEntity>> {
        let document = self
            .collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadChallenge { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn list_challenges(&self, page: u64, limit: i64) -> MongoResult<Vec<ChallengeEntity>> {
        let skip = page.saturating_sub(1).saturating_mul(limit.max(0) as u64);
        let documents: Vec<MongoChallengeDocument> = self
            .collection()
            .await
            .find(doc! {})
            .sort(doc! {"created_at": -1})
            .skip(skip)
            .limit(limit)
            .await
            .map_err(|source| MongoDaoError::ListChallenges { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListChallenges { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn find_challenges_by_game(&self, game_id: &str) -> MongoResult<Vec<ChallengeEntity>> {
        let documents: Vec<MongoChallengeDocument> = self
            .collection()
            .await
            .find(doc! {"game_id": game_id})
            .await
            .map_err(|source| MongoDaoError::ListChallenges { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListChallenges { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn find_challenges_for_user(
        &self,
        user_id: &str,
        status: Option<ChallengeStatus>,
    ) -> MongoResult<Vec<ChallengeEntity>> {
        let mut filter = doc! {"member_ids": user_id};
        if let Some(status) = status {
            filter.insert("status", status.as_str());
        }

        let documents: Vec<MongoChallengeDocument> = self
            .collection()
            .await
            .find(filter)
            .await
            .map_err(|source| MongoDaoError::ListChallenges { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListChallenges { source })?;

        Ok(documents.into_iter().map(Into::into).collect())
    }
}

impl ChallengeStore for MongoChallengeStore {
    fn insert(&self, challenge: ChallengeEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_challenge(challenge).await.map_err(Into::into) })
    }

    fn join(
        &self,
        id: Uuid,
        user_id: String,
        ticket_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .join_challenge(id, &user_id, &ticket_id)
                .await
                .map_err(Into::into)
        })
    }

    fn leave(
        &self,
        id: Uuid,
        user_id: String,
    ) -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.leave_challenge(id, &user_id).await.map_err(Into::into) })
    }

    fn update_status(
        &self,
        id: Uuid,
        status: ChallengeStatus,
        owner_id: Option<String>,
    ) -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_challenge_status(id, status, owner_id.as_deref())
                .await
                .map_err(Into::into)
        })
    }

    fn delete(&self, id: Uuid, owner_id: String) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_challenge(id, &owner_id).await.map_err(Into::into) })
    }

    fn find(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<ChallengeEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_challenge(id).await.map_err(Into::into) })
    }

    fn list(
        &self,
        page: u64,
        limit: i64,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_challenges(page, limit).await.map_err(Into::into) })
    }

    fn find_by_game(
        &self,
        game_id: String,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_challenges_by_game(&game_id)
                .await
                .map_err(Into::into)
        })
    }

    fn find_for_user(
        &self,
        user_id: String,
        status: Option<ChallengeStatus>,
    ) -> BoxFuture<'static, StorageResult<Vec<ChallengeEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_challenges_for_user(&user_id, status)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
