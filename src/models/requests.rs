//! Request DTOs for the daemon API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

use crate::sync::NewOperation;

/// Longest logical key accepted over HTTP. The largest physical key derived
/// from it, `secure_{key}_chunk_{index}`, must still fit the file backend.
pub const MAX_KEY_LENGTH: usize = 90;

/// Validates a key taken from the request path.
///
/// Returns an error message if validation fails, None if valid.
pub fn validate_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return Some("Key cannot be empty".to_string());
    }
    if key.len() > MAX_KEY_LENGTH {
        return Some(format!(
            "Key exceeds maximum length of {} characters",
            MAX_KEY_LENGTH
        ));
    }
    None
}

/// Request body for PUT /secure/:key
#[derive(Debug, Clone, Deserialize)]
pub struct SecretRequest {
    /// The secret to store
    pub value: String,
}

/// Request body for PUT /cache/:key
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSetRequest {
    /// Any JSON value
    pub data: Value,
    /// Optional max age in milliseconds (uses default if not specified)
    #[serde(default)]
    pub max_age_ms: Option<u64>,
}

/// Request body for POST /queue
#[derive(Debug, Clone, Deserialize)]
pub struct EnqueueRequest {
    /// Operation kind
    #[serde(rename = "type")]
    pub op_type: String,
    #[serde(default)]
    pub payload: Value,
    /// Entity the operation targets
    #[serde(default)]
    pub entity: Option<String>,
}

impl EnqueueRequest {
    pub fn validate(&self) -> Option<String> {
        if self.op_type.trim().is_empty() {
            return Some("Operation type cannot be empty".to_string());
        }
        if matches!(&self.entity, Some(entity) if entity.is_empty()) {
            return Some("Entity cannot be empty when given".to_string());
        }
        None
    }
}

impl From<EnqueueRequest> for NewOperation {
    fn from(req: EnqueueRequest) -> Self {
        NewOperation {
            op_type: req.op_type,
            payload: req.payload,
            entity: req.entity,
        }
    }
}

/// Request body for PUT /connectivity
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectivityRequest {
    pub online: bool,
}
