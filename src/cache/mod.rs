//! Cache Module
//!
//! TTL-bounded key-value cache persisted on the general backend.

mod entry;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, CACHE_VERSION};
pub use stats::CacheStats;
pub use store::ExpiringCache;

// == Public Constants ==
/// Prefix of every cache key in the general backend
pub const CACHE_KEY_PREFIX: &str = "@cache_";

/// Default max age of a cache entry (24h) in milliseconds
pub const DEFAULT_MAX_AGE_MS: u64 = 86_400_000;
