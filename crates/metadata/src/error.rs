//! Metadata error types.

use coffer_storage::StorageError;
use thiserror::Error;

/// Repository operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to decode {store}: {source}")]
    Decode {
        store: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode {store}: {source}")]
    Encode {
        store: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{op}: {source}")]
    Storage {
        op: &'static str,
        #[source]
        source: StorageError,
    },
}

impl MetadataError {
    /// True when a backing store gave up waiting for its lock.
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, MetadataError::Storage { source, .. } if source.is_lock_timeout())
    }

    pub(crate) fn storage(op: &'static str) -> impl FnOnce(StorageError) -> Self {
        move |source| MetadataError::Storage { op, source }
    }
}

impl From<coffer_core::Error> for MetadataError {
    fn from(err: coffer_core::Error) -> Self {
        MetadataError::InvalidArgument(err.to_string())
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_timeout_detection() {
        let err = MetadataError::Storage {
            op: "users.create",
            source: StorageError::LockTimeout {
                store: "users.json".to_string(),
                attempts: 10,
            },
        };
        assert!(err.is_lock_timeout());
        assert!(err.to_string().starts_with("users.create: "));
        assert!(!MetadataError::NotFound("alice".to_string()).is_lock_timeout());
    }
}
