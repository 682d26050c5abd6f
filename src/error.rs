//! Error types for the persistence core
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Store Error Enum ==
/// Unified error type shared by the secure store, the cache and the sync queue.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Nothing is stored under the key
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Cache entry outlived its max age (it has been deleted)
    #[error("Key expired: {0}")]
    Expired(String),

    /// Stored data could not be decoded
    #[error("Corrupted entry: {0}")]
    Corrupted(String),

    /// A storage backend call failed
    #[error("Backend failure: {0}")]
    Backend(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// True for the "nothing there" family of errors.
    pub fn is_miss(&self) -> bool {
        matches!(self, StoreError::NotFound(_) | StoreError::Expired(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Corrupted(e.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for StoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            StoreError::NotFound(_) | StoreError::Expired(_) => StatusCode::NOT_FOUND,
            StoreError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            StoreError::Corrupted(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StoreError::Backend(_) | StoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the persistence core.
pub type Result<T> = std::result::Result<T, StoreError>;
