use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use tracing::warn;
use utoipa::ToSchema;
use validator::ValidationErrors;

use crate::{
    dao::{
        backend::error::{AuthError, FetchError, RegError, SaveError},
        storage::StorageError,
    },
    state::InvalidTransition,
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No backend is installed yet.
    #[error("the score backend is still initializing, please wait")]
    NotReady,
    /// Missing or rejected credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation clashes with existing data or the current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Timeout { .. } => ServiceError::Timeout,
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::Conflict(err.to_string())
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Storage(source) => source.into(),
            AuthError::PopupClosed | AuthError::ModeMismatch { .. } => {
                ServiceError::InvalidInput(err.to_string())
            }
            AuthError::UserNotFound => ServiceError::NotFound(err.to_string()),
            AuthError::Provider { .. } => {
                warn!(error = %err, "auth provider failure");
                ServiceError::Unavailable(StorageError::unavailable(err.to_string(), err))
            }
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

impl From<RegError> for ServiceError {
    fn from(err: RegError) -> Self {
        match err {
            RegError::UsernameTaken | RegError::EmailTaken => {
                ServiceError::Conflict(err.to_string())
            }
            RegError::NotAuthenticated => ServiceError::Unauthorized(err.to_string()),
            RegError::Storage(source) => source.into(),
        }
    }
}

impl From<SaveError> for ServiceError {
    fn from(err: SaveError) -> Self {
        match err {
            SaveError::NotAuthenticated => ServiceError::Unauthorized(err.to_string()),
            SaveError::Storage(source) => source.into(),
        }
    }
}

impl From<FetchError> for ServiceError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotAuthenticated => ServiceError::Unauthorized(err.to_string()),
            FetchError::Storage(source) => source.into(),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable; the client may retry or go offline.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Upstream did not answer in time.
    #[error("timed out: {0}")]
    Timeout(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotReady => AppError::ServiceUnavailable(err.to_string()),
            ServiceError::Unavailable(source) => {
                warn!(error = ?source, "storage operation failed");
                AppError::ServiceUnavailable(source.to_string())
            }
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Timeout => AppError::Timeout("operation timed out".into()),
        }
    }
}

impl AppError {
    /// Whether the client should offer to retry (or switch to offline mode).
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ServiceUnavailable(_) | AppError::Timeout(_))
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub message: String,
    /// True for transient failures.
    pub retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorBody {
            message: self.to_string(),
            retryable: self.is_retryable(),
        });

        (self.status(), payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_and_bad_passwords_are_not_retryable() {
        let conflict = AppError::from(ServiceError::from(RegError::EmailTaken));
        assert_eq!(conflict.status(), StatusCode::CONFLICT);
        assert!(!conflict.is_retryable());

        let bad_password = AppError::from(ServiceError::from(AuthError::BadPassword));
        assert_eq!(bad_password.status(), StatusCode::UNAUTHORIZED);
        assert!(!bad_password.is_retryable());
    }

    #[test]
    fn transient_failures_are_retryable() {
        let timeout = AppError::from(ServiceError::from(FetchError::Storage(
            StorageError::timeout("sheets"),
        )));
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert!(timeout.is_retryable());

        let not_ready = AppError::from(ServiceError::NotReady);
        assert_eq!(not_ready.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(not_ready.is_retryable());
    }
}
