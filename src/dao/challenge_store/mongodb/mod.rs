mod config;
mod connection;
mod error;
mod models;
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoChallengeStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        let operation = match &err {
            MongoDaoError::InvalidUri { .. }
            | MongoDaoError::ClientConstruction { .. }
            | MongoDaoError::InitialPing { .. } => "connect",
            MongoDaoError::HealthPing { .. } => "ping",
            MongoDaoError::EnsureIndex { .. } => "ensure-indexes",
            MongoDaoError::InsertChallenge { .. } => "insert",
            MongoDaoError::UpdateChallenge { .. } => "update",
            MongoDaoError::DeleteChallenge { .. } => "delete",
            MongoDaoError::LoadChallenge { .. } => "find",
            MongoDaoError::ListChallenges { .. } => "list",
        };
        StorageError::unavailable(operation, err)
    }
}
