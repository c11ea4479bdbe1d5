use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::storage::StorageError;

/// Errors that can occur in service layer operations.
///
/// Upstream schedule failures are deliberately absent: the status provider
/// absorbs them into "no snapshot this cycle" and they never reach callers.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Invalid input provided by the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A precondition failed: capacity, membership, ownership, or status.
    /// The cause is intentionally coarse; disambiguating would cost an extra
    /// read (see DESIGN.md).
    #[error("conflict: {0}")]
    Conflict(String),
    /// Requested resource was not found (or not owned by the caller).
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<ValidationErrors> for ServiceError {
    fn from(err: ValidationErrors) -> Self {
        ServiceError::InvalidInput(format!("validation failed: {err}"))
    }
}
