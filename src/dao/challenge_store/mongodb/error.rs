use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB backend operations.
pub type MongoResult<T> = Result<T, MongoDaoError>;

/// Errors surfaced by the MongoDB challenge store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("invalid MongoDB connection string `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to construct MongoDB client")]
    ClientConstruction {
        #[source]
        source: mongodb::error::Error,
    },
    #[error("MongoDB did not answer the initial ping after {attempts} attempts")]
    InitialPing {
        attempts: u32,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("MongoDB health ping failed")]
    HealthPing {
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to insert challenge `{id}`")]
    InsertChallenge {
        id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("conditional update on challenge `{id}` failed")]
    UpdateChallenge {
        id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to delete challenge `{id}`")]
    DeleteChallenge {
        id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to load challenge `{id}`")]
    LoadChallenge {
        id: Uuid,
        #[source]
        source: mongodb::error::Error,
    },
    #[error("failed to list challenges")]
    ListChallenges {
        #[source]
        source: mongodb::error::Error,
    },
}
