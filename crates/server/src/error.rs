//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use coffer_metadata::MetadataError;
use coffer_service::ServiceError;
use coffer_storage::StorageError;
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<MetadataError> for ApiError {
    fn from(err: MetadataError) -> Self {
        Self::Service(err.into())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        Self::Service(err.into())
    }
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Internal(_) => "internal_error",
            Self::Service(e) => match e {
                ServiceError::AccessDenied(_) => "access_denied",
                ServiceError::InvalidCredentials => "invalid_credentials",
                ServiceError::WeakPassword(_) => "weak_password",
                ServiceError::InvalidArgument(_) => "invalid_argument",
                ServiceError::Hashing(_) => "internal_error",
                _ if e.is_lock_timeout() => "store_busy",
                _ if e.is_not_found() => "not_found",
                _ if e.is_already_exists() => "already_exists",
                ServiceError::Metadata(_) => "metadata_error",
                ServiceError::Storage(_) => "storage_error",
            },
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Service(e) => match e {
                ServiceError::AccessDenied(_) => StatusCode::FORBIDDEN,
                ServiceError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                ServiceError::WeakPassword(_) | ServiceError::InvalidArgument(_) => {
                    StatusCode::BAD_REQUEST
                }
                _ if e.is_lock_timeout() => StatusCode::SERVICE_UNAVAILABLE,
                _ if e.is_not_found() => StatusCode::NOT_FOUND,
                _ if e.is_already_exists() => StatusCode::CONFLICT,
                ServiceError::Metadata(MetadataError::InvalidArgument(_)) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Message safe to show a client. Infrastructure details stay in the logs.
    pub fn public_message(&self) -> String {
        if self.status_code().is_server_error() {
            match self.status_code() {
                StatusCode::SERVICE_UNAVAILABLE => "store is busy, retry shortly".to_string(),
                _ => "internal server error".to_string(),
            }
        } else {
            self.to_string()
        }
    }

    /// Log server-side failures and count the interesting ones.
    pub(crate) fn observe(&self) {
        let status = self.status_code();
        if let Self::Service(e) = self {
            if e.is_lock_timeout() {
                crate::metrics::LOCK_TIMEOUTS.inc();
            }
            if matches!(e, ServiceError::AccessDenied(_)) {
                crate::metrics::ACCESS_DENIED.inc();
            }
        }
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.observe();
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: impl Into<ApiError>) -> StatusCode {
        err.into().status_code()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status(MetadataError::NotFound("alice".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(MetadataError::AlreadyExists("alice".into())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status(ServiceError::AccessDenied("f".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status(ServiceError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status(ServiceError::WeakPassword("short".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status(StorageError::LockTimeout {
                store: "users.json".into(),
                attempts: 10
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(StorageError::NotFound("content/a".into())),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_decode_failure_is_opaque() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ApiError::from(MetadataError::Decode {
            store: "users.json".into(),
            source,
        });
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "internal server error");
        assert_eq!(err.code(), "metadata_error");
    }
}
