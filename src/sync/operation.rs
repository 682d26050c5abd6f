//! Queued operation types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A mutation waiting to be replayed.
///
/// Persisted as camelCase JSON; `type` holds the operation kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOperation {
    /// UUID v4
    pub id: String,
    /// Operation kind, e.g. `card.update`
    #[serde(rename = "type")]
    pub op_type: String,
    /// Opaque body handed to the executor
    pub payload: Value,
    /// Enqueue time (Unix milliseconds)
    pub enqueued_at: i64,
    /// Failed attempts so far
    pub attempts: u32,
    pub max_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Logical entity the mutation targets. Failures of one operation hold
    /// back later operations on the same entity for the rest of a drain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl SyncOperation {
    /// Counts one failed attempt. Returns true once the budget is spent.
    pub fn record_failure(&mut self, error: impl Into<String>) -> bool {
        self.attempts += 1;
        self.last_error = Some(error.into());
        self.is_exhausted()
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// What a caller hands to [`SyncQueue::enqueue`](super::SyncQueue::enqueue).
#[derive(Debug, Clone, PartialEq)]
pub struct NewOperation {
    pub op_type: String,
    pub payload: Value,
    pub entity: Option<String>,
}

impl NewOperation {
    pub fn new(op_type: impl Into<String>, payload: Value) -> Self {
        Self {
            op_type: op_type.into(),
            payload,
            entity: None,
        }
    }

    /// Tags the operation with the entity it mutates.
    pub fn for_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}
