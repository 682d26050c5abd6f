//! Response DTOs for the daemon API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::secure::SecureRead;
use crate::sync::{DrainOutcome, DrainReport, SyncOperation};

/// Response body for GET /secure/:key
#[derive(Debug, Clone, Serialize)]
pub struct SecretResponse {
    pub key: String,
    pub value: String,
    /// False when some chunks were missing on reassembly
    pub complete: bool,
    /// Indices of the missing chunks
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_chunks: Vec<usize>,
}

impl SecretResponse {
    pub fn new(key: impl Into<String>, read: SecureRead) -> Self {
        let complete = read.is_complete();
        let missing_chunks = match &read {
            SecureRead::Partial { missing, .. } => missing.clone(),
            SecureRead::Complete(_) => Vec::new(),
        };
        Self {
            key: key.into(),
            value: read.into_value(),
            complete,
            missing_chunks,
        }
    }
}

/// Response body for GET /cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct CacheResponse {
    pub key: String,
    pub data: Value,
    /// Milliseconds until the entry expires
    pub ttl_remaining_ms: u64,
}

impl CacheResponse {
    pub fn new(key: impl Into<String>, data: Value, ttl_remaining_ms: u64) -> Self {
        Self {
            key: key.into(),
            data,
            ttl_remaining_ms,
        }
    }
}

/// Response body for writes and deletes
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    /// Success message
    pub message: String,
    /// The key that was touched
    pub key: String,
}

impl MessageResponse {
    pub fn stored(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' stored successfully", key),
            key,
        }
    }

    pub fn removed(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' removed successfully", key),
            key,
        }
    }
}

/// Response body for bulk deletes
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub removed: usize,
}

/// Response body for GET /queue
#[derive(Debug, Clone, Serialize)]
pub struct QueueResponse {
    pub online: bool,
    pub pending: Vec<SyncOperation>,
}

/// Response body for POST /queue/drain
#[derive(Debug, Clone, Serialize)]
pub struct DrainResponse {
    /// `offline`, `already_running` or `completed`
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<DrainReport>,
}

impl From<DrainOutcome> for DrainResponse {
    fn from(outcome: DrainOutcome) -> Self {
        let (status, report) = match outcome {
            DrainOutcome::Offline => ("offline", None),
            DrainOutcome::AlreadyRunning => ("already_running", None),
            DrainOutcome::Completed(report) => ("completed", Some(report)),
        };
        Self {
            status: status.to_string(),
            report,
        }
    }
}

/// Response body for PUT /connectivity
#[derive(Debug, Clone, Serialize)]
pub struct ConnectivityResponse {
    pub online: bool,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
