//! Backend-agnostic storage failure type.

use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Failure of the challenge storage backend, tagged with the operation that
/// was in flight when the backend went away. Backends do not distinguish
/// failure causes beyond this; callers either propagate or enter degraded
/// mode.
#[derive(Debug, Error)]
#[error("challenge storage unavailable during `{operation}`: {source}")]
pub struct StorageError {
    operation: &'static str,
    #[source]
    source: Box<dyn Error + Send + Sync>,
}

impl StorageError {
    /// Wrap a backend failure observed during `operation`.
    pub fn unavailable(operation: &'static str, source: impl Error + Send + Sync + 'static) -> Self {
        Self {
            operation,
            source: Box::new(source),
        }
    }

    /// Storage operation that was in flight when the failure occurred.
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failed_operation() {
        let err = StorageError::unavailable(
            "update",
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset"),
        );
        assert_eq!(err.operation(), "update");
        assert_eq!(
            err.to_string(),
            "challenge storage unavailable during `update`: connection reset"
        );
    }
}
