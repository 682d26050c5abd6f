//! Cache Statistics Module
//!
//! Snapshot of what is currently stored under the cache prefix.

use serde::Serialize;

// == Cache Stats ==
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Entries under the cache prefix
    pub total_entries: usize,
    /// Entries still within their max age
    pub valid_entries: usize,
    /// Entries past their max age (or unreadable)
    pub expired_entries: usize,
    /// Sum of the raw serialized sizes in bytes
    pub total_size_bytes: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one entry of `size` bytes.
    pub fn record(&mut self, size: usize, expired: bool) {
        self.total_entries += 1;
        self.total_size_bytes += size;
        if expired {
            self.expired_entries += 1;
        } else {
            self.valid_entries += 1;
        }
    }
}
