//! Cache Entry Module
//!
//! Defines the versioned envelope every cached value is wrapped in.

use serde::{Deserialize, Serialize};

/// Envelope version written by this release
pub const CACHE_VERSION: &str = "1.0";

// == Cache Entry ==
/// Serialized as `{data, timestamp, maxAge, version}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T> {
    /// The cached value
    pub data: T,
    /// Write time (Unix milliseconds)
    pub timestamp: i64,
    /// Lifetime in milliseconds
    pub max_age: u64,
    /// Envelope format version
    pub version: String,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Wraps `data` written at `now_ms`.
    pub fn new(data: T, now_ms: i64, max_age: u64) -> Self {
        Self {
            data,
            timestamp: now_ms,
            max_age,
            version: CACHE_VERSION.to_string(),
        }
    }

    // == Is Expired ==
    /// An entry is valid while `now - timestamp <= max_age`; the boundary
    /// instant itself still counts as valid.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        let age = now_ms.saturating_sub(self.timestamp);
        age > i64::try_from(self.max_age).unwrap_or(i64::MAX)
    }

    /// Remaining lifetime in milliseconds, `0` once expired.
    pub fn ttl_remaining_ms(&self, now_ms: i64) -> u64 {
        let age = now_ms.saturating_sub(self.timestamp).max(0) as u64;
        self.max_age.saturating_sub(age)
    }

    pub fn is_current_version(&self) -> bool {
        self.version == CACHE_VERSION
    }
}
