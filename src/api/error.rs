use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use thiserror::Error;

use super::models::ErrorResponse;
use super::validation::RequestValidationError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload invalid: {0}")]
    InvalidPayload(String),
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("download still in progress for {0}, retry later")]
    InProgress(String),
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("timed out waiting for {0}")]
    Timeout(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InProgress(_) => StatusCode::ACCEPTED,
            ApiError::DownloadFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InProgress(_) => "IN_PROGRESS",
            ApiError::DownloadFailed(_) => "DOWNLOAD_FAILED",
            ApiError::Timeout(_) => "TIMEOUT",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let body = ErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };

        (status, Json(json!(body))).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}

impl From<RequestValidationError> for ApiError {
    fn from(value: RequestValidationError) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(value: StorageError) -> Self {
        match value {
            StorageError::NotFound(name) => ApiError::NotFound(name),
            other => ApiError::Internal(other.to_string()),
        }
    }
}
