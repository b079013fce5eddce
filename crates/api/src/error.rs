//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use history_storage::StorageError;

/// Errors returned by request handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// JSON error payload
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: &'static str,
}

impl ApiError {
    /// Every datastore failure is server-side
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Distinguishes an unreachable datastore from a rejected statement
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Storage(StorageError::Timeout { .. }) => "timeout",
            ApiError::Storage(e) if e.is_unavailable() => "unavailable",
            ApiError::Storage(StorageError::Persistence(_)) => "persistence",
            ApiError::Storage(StorageError::Query(_)) => "query",
            ApiError::Storage(StorageError::Connect(_) | StorageError::InvalidConfig(_)) => {
                "unavailable"
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        error!(status = status.as_u16(), kind = self.kind(), "{}", self);

        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind(),
        };
        (status, Json(body)).into_response()
    }
}
