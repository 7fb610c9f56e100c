//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("timed out waiting for lock on {store} after {attempts} attempts")]
    LockTimeout { store: String, attempts: u32 },

    #[error("lock does not exist: {0}")]
    LockNotHeld(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("S3 error: {0}")]
    S3(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// True when the error came from exhausting the lock retry budget.
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, StorageError::LockTimeout { .. })
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
