//! Service error types.

use coffer_metadata::MetadataError;
use coffer_storage::StorageError;
use thiserror::Error;

/// Errors returned by the domain services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Unknown user, wrong password, or a missing or expired session.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("weak password: {0}")]
    WeakPassword(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("content store: {0}")]
    Storage(StorageError),
}

impl ServiceError {
    /// True when a backing store gave up waiting for its lock.
    pub fn is_lock_timeout(&self) -> bool {
        match self {
            ServiceError::Metadata(e) => e.is_lock_timeout(),
            ServiceError::Storage(e) => e.is_lock_timeout(),
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ServiceError::Metadata(MetadataError::NotFound(_))
                | ServiceError::Storage(StorageError::NotFound(_))
        )
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, ServiceError::Metadata(MetadataError::AlreadyExists(_)))
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidKey(key) => ServiceError::InvalidArgument(key),
            other => ServiceError::Storage(other),
        }
    }
}

impl From<coffer_core::Error> for ServiceError {
    fn from(err: coffer_core::Error) -> Self {
        use coffer_core::Error;
        match err {
            Error::WeakPassword(reason) => ServiceError::WeakPassword(reason),
            Error::PasswordMismatch => ServiceError::InvalidCredentials,
            Error::PasswordHash(reason) => ServiceError::Hashing(reason),
            other => ServiceError::InvalidArgument(other.to_string()),
        }
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_service_kinds() {
        assert!(matches!(
            ServiceError::from(coffer_core::Error::PasswordMismatch),
            ServiceError::InvalidCredentials
        ));
        assert!(matches!(
            ServiceError::from(coffer_core::Error::InvalidName("x".into())),
            ServiceError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_rejected_key_is_invalid_argument() {
        assert!(matches!(
            ServiceError::from(StorageError::InvalidKey("a..b".into())),
            ServiceError::InvalidArgument(_)
        ));
        assert!(matches!(
            ServiceError::from(StorageError::NotFound("a".into())),
            ServiceError::Storage(_)
        ));
    }

    #[test]
    fn test_lock_timeout_passes_through() {
        let err = ServiceError::from(MetadataError::Storage {
            op: "users.get",
            source: StorageError::LockTimeout {
                store: "users.json".into(),
                attempts: 3,
            },
        });
        assert!(err.is_lock_timeout());
        assert!(!ServiceError::InvalidCredentials.is_lock_timeout());
    }
}
