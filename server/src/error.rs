use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use derive_more::derive::Display;
use lib_inbox::error::{ImportError, ItemError};
use serde_json::json;

use crate::state::supervisor::StartError;

pub type AppResult<T> = Result<T, AppError>;
pub type AppJsonResult<T> = AppResult<Json<T>>;

#[derive(Debug, Display)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Internal(anyhow::Error),
    RequestTimeout,
    TooManyRequests,
    Conflict(String),
    Unauthorized(String),
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(error)
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        tracing::error!("Reqwest error: {:?}", error);
        match error.status() {
            Some(StatusCode::BAD_REQUEST) => AppError::BadRequest(error.to_string()),
            Some(StatusCode::UNAUTHORIZED) => AppError::Unauthorized(error.to_string()),
            Some(StatusCode::REQUEST_TIMEOUT) => AppError::RequestTimeout,
            Some(StatusCode::TOO_MANY_REQUESTS) => AppError::TooManyRequests,
            _ => AppError::Internal(error.into()),
        }
    }
}

impl From<ImportError> for AppError {
    fn from(error: ImportError) -> Self {
        match error {
            ImportError::Csv(e) => AppError::BadRequest(format!("Could not read CSV: {}", e)),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<ItemError> for AppError {
    fn from(error: ItemError) -> Self {
        AppError::BadRequest(error.to_string())
    }
}

impl From<StartError> for AppError {
    fn from(error: StartError) -> Self {
        match error {
            StartError::Stopping(_) => AppError::Conflict(error.to_string()),
            StartError::Unavailable(e) => AppError::NotFound(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::RequestTimeout => (
                StatusCode::REQUEST_TIMEOUT,
                "Request took too long".to_string(),
            ),
            AppError::TooManyRequests => {
                (StatusCode::TOO_MANY_REQUESTS, "Too many requests".to_string())
            }
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
        };
        tracing::error!("Error: {} {}", status, message);

        (
            status,
            Json(json!({"error": {
                "code": status.as_u16(),
                "message": message
            }})),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_errors_are_bad_requests() {
        let err: AppError = ImportError::MissingPriceColumn.into();
        assert!(matches!(err, AppError::BadRequest(ref m) if m.starts_with("Could not find price column")));
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_start_errors_map_to_status() {
        let stopping: AppError = StartError::Stopping("u1".to_string()).into();
        assert_eq!(stopping.into_response().status(), StatusCode::CONFLICT);

        let unknown: AppError = StartError::Unavailable(anyhow::anyhow!("No account")).into();
        assert!(matches!(unknown, AppError::NotFound(ref m) if m == "No account"));
    }

    #[test]
    fn test_internal_hides_details() {
        let err = AppError::from(anyhow::anyhow!("store exploded"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
