//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid capability label: {0}")]
    InvalidCapability(String),

    #[error("password rejected: {0}")]
    WeakPassword(String),

    #[error("password does not match")]
    PasswordMismatch,

    #[error("password hashing failed: {0}")]
    PasswordHash(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
