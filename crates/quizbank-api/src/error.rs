use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use quizbank_db::DbError;

use crate::storage::StorageError;

/// Every expected failure an operation can surface to a caller.
///
/// Auth variants deliberately carry no detail about which half failed:
/// login returns the same `InvalidCredentials` for an unknown username and
/// a wrong password, and the gate collapses malformed/expired/gone-user
/// into one `Unauthenticated`. The specifics go to logs, not responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("Username already exists")]
    DuplicateUsername,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Current password is incorrect")]
    WrongCurrentPassword,
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Not found")]
    NotFound,
    #[error("Only audio uploads are accepted")]
    UnsupportedMediaType,
    #[error("Upload exceeds the size limit")]
    TooLarge,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::DuplicateUsername => StatusCode::CONFLICT,
            ApiError::InvalidCredentials | ApiError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ApiError::WrongCurrentPassword => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::UnsupportedMediaType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ApiError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = match &self {
            // Internal detail stays in the logs.
            ApiError::Internal(err) => {
                error!("Internal error: {err:#}");
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        (self.status(), Json(json!({ "error": message }))).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Duplicate => ApiError::DuplicateUsername,
            DbError::NotFound => ApiError::NotFound,
            other => ApiError::Internal(other.into()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnsupportedMediaType => ApiError::UnsupportedMediaType,
            StorageError::TooLarge(_) => ApiError::TooLarge,
            StorageError::Io(e) => ApiError::Internal(e.into()),
        }
    }
}
