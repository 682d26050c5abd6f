//! Expiring Cache Module
//!
//! Generic TTL cache over a key-value backend. Expired entries are deleted
//! lazily by the read that notices them; nothing sweeps in the background.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::backend::KeyValueBackend;
use crate::cache::{CacheEntry, CacheStats, CACHE_KEY_PREFIX, DEFAULT_MAX_AGE_MS};
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, StoreError};

// == Expiring Cache ==
#[derive(Clone)]
pub struct ExpiringCache {
    backend: Arc<dyn KeyValueBackend>,
    clock: Arc<dyn Clock>,
    /// Max age used when the caller does not pass one
    default_max_age: u64,
}

impl ExpiringCache {
    // == Constructor ==
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            default_max_age: DEFAULT_MAX_AGE_MS,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_default_max_age(mut self, max_age_ms: u64) -> Self {
        self.default_max_age = max_age_ms;
        self
    }

    // == Set ==
    /// Stores `data` under `key`, stamped with the current time.
    ///
    /// # Arguments
    /// * `max_age` - Lifetime in milliseconds (default max age if None)
    pub async fn set_cache<T>(&self, key: &str, data: &T, max_age: Option<u64>) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let max_age = max_age.unwrap_or(self.default_max_age);
        let entry = CacheEntry::new(data, self.clock.now_ms(), max_age);
        let raw = serde_json::to_string(&entry)?;

        self.backend
            .set(&storage_key(key), &raw)
            .await
            .inspect_err(|e| warn!("Cache write of '{}' failed: {}", key, e))?;

        debug!("Cached '{}' for {}ms", key, max_age);
        Ok(())
    }

    // == Get ==
    /// Returns the cached value.
    ///
    /// # Errors
    /// - `NotFound` if nothing is cached
    /// - `Expired` if the entry outlived its max age (it is deleted)
    /// - `Corrupted` if the envelope is unreadable (it is deleted) or the
    ///   data does not match `T` (it is kept)
    pub async fn get_cache<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.get_cache_with_ttl(key).await.map(|(data, _)| data)
    }

    /// Like [`get_cache`](Self::get_cache), also returning the milliseconds
    /// left before the entry expires.
    pub async fn get_cache_with_ttl<T: DeserializeOwned>(&self, key: &str) -> Result<(T, u64)> {
        let entry = self.load(key).await?;
        let ttl = entry.ttl_remaining_ms(self.clock.now_ms());
        let data = serde_json::from_value(entry.data).map_err(|e| {
            StoreError::Corrupted(format!("cached '{key}' does not match the requested type: {e}"))
        })?;
        Ok((data, ttl))
    }

    // == Update ==
    /// Read-modify-write of one entry.
    ///
    /// `update` receives the current value (`None` when missing or expired).
    /// Returning `None` leaves the cache untouched and yields `Ok(false)`.
    /// A surviving entry keeps its max age.
    pub async fn update_cache<T, F>(&self, key: &str, update: F) -> Result<bool>
    where
        T: Serialize + DeserializeOwned + Sync,
        F: FnOnce(Option<T>) -> Option<T>,
    {
        let (current, max_age) = match self.load(key).await {
            Ok(entry) => {
                let max_age = entry.max_age;
                (serde_json::from_value::<T>(entry.data).ok(), Some(max_age))
            }
            Err(e) if e.is_miss() => (None, None),
            Err(StoreError::Corrupted(reason)) => {
                debug!("Replacing corrupted cache entry '{}': {}", key, reason);
                (None, None)
            }
            Err(e) => return Err(e),
        };

        match update(current) {
            Some(next) => {
                self.set_cache(key, &next, max_age).await?;
                Ok(true)
            }
            None => {
                debug!("Cache update of '{}' was a no-op", key);
                Ok(false)
            }
        }
    }

    // == Remove ==
    /// Deletes one entry; absent keys are fine.
    pub async fn remove_cache(&self, key: &str) -> Result<()> {
        self.backend.remove(&storage_key(key)).await
    }

    // == Clear ==
    /// Deletes every cache entry and returns how many were removed.
    pub async fn clear_all(&self) -> Result<usize> {
        let keys = self.cache_keys().await?;
        for key in &keys {
            self.backend.remove(key).await?;
        }

        debug!("Cleared {} cache entries", keys.len());
        Ok(keys.len())
    }

    // == Stats ==
    /// Classifies every entry as valid or expired. Nothing is deleted.
    pub async fn stats(&self) -> Result<CacheStats> {
        let now = self.clock.now_ms();
        let mut stats = CacheStats::new();

        for key in self.cache_keys().await? {
            let Some(raw) = self.backend.get(&key).await? else {
                continue;
            };
            let expired = match serde_json::from_str::<CacheEntry<serde::de::IgnoredAny>>(&raw) {
                Ok(entry) => entry.is_expired(now),
                Err(_) => true,
            };
            stats.record(raw.len(), expired);
        }

        Ok(stats)
    }

    // == Internals ==
    /// Loads a live envelope, deleting it if expired or unreadable.
    async fn load(&self, key: &str) -> Result<CacheEntry<serde_json::Value>> {
        let storage_key = storage_key(key);
        let raw = self
            .backend
            .get(&storage_key)
            .await?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

        let entry = match serde_json::from_str::<CacheEntry<serde_json::Value>>(&raw) {
            Ok(entry) if entry.is_current_version() => entry,
            Ok(entry) => {
                self.discard(&storage_key).await;
                return Err(StoreError::Corrupted(format!(
                    "cached '{}' has envelope version {}",
                    key, entry.version
                )));
            }
            Err(e) => {
                self.discard(&storage_key).await;
                return Err(StoreError::Corrupted(format!("cached '{key}': {e}")));
            }
        };

        if entry.is_expired(self.clock.now_ms()) {
            self.discard(&storage_key).await;
            debug!("Cache entry '{}' expired", key);
            return Err(StoreError::Expired(key.to_string()));
        }

        Ok(entry)
    }

    async fn discard(&self, storage_key: &str) {
        if let Err(e) = self.backend.remove(storage_key).await {
            warn!("Could not delete cache entry '{}': {}", storage_key, e);
        }
    }

    async fn cache_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .backend
            .keys()
            .await?
            .into_iter()
            .filter(|k| k.starts_with(CACHE_KEY_PREFIX))
            .collect())
    }
}

fn storage_key(key: &str) -> String {
    format!("{CACHE_KEY_PREFIX}{key}")
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::clock::ManualClock;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Card {
        name: String,
        company: String,
    }

    fn card(name: &str) -> Card {
        Card {
            name: name.to_string(),
            company: "Acme".to_string(),
        }
    }

    fn setup() -> (Arc<MemoryBackend>, Arc<ManualClock>, ExpiringCache) {
        let backend = Arc::new(MemoryBackend::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let cache = ExpiringCache::new(backend.clone()).with_clock(clock.clone());
        (backend, clock, cache)
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let (backend, _, cache) = setup();

        cache.set_cache("card_1", &card("Ada"), None).await.unwrap();

        let value: Card = cache.get_cache("card_1").await.unwrap();
        assert_eq!(value, card("Ada"));
        assert!(backend.contains("@cache_card_1").await);
    }

    #[tokio::test]
    async fn test_get_nonexistent() {
        let (_, _, cache) = setup();
        let result = cache.get_cache::<Card>("missing").await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_ttl_expiration_deletes_entry() {
        let (backend, clock, cache) = setup();

        cache.set_cache("card_1", &card("Ada"), Some(1_000)).await.unwrap();
        clock.advance(1_000);
        assert!(cache.get_cache::<Card>("card_1").await.is_ok());

        clock.advance(1);
        let result = cache.get_cache::<Card>("card_1").await;
        assert!(matches!(result, Err(StoreError::Expired(_))));
        assert!(!backend.contains("@cache_card_1").await);
    }

    #[tokio::test]
    async fn test_default_max_age() {
        let (_, clock, cache) = setup();

        cache.set_cache("k", &1u32, None).await.unwrap();
        clock.advance(DEFAULT_MAX_AGE_MS as i64);
        assert_eq!(cache.get_cache::<u32>("k").await.unwrap(), 1);

        clock.advance(1);
        assert!(cache.get_cache::<u32>("k").await.is_err());
    }

    #[tokio::test]
    async fn test_get_cache_with_ttl_counts_down() {
        let (_, clock, cache) = setup();

        cache.set_cache("k", &1u32, Some(1_000)).await.unwrap();
        clock.advance(400);

        let (value, ttl) = cache.get_cache_with_ttl::<u32>("k").await.unwrap();
        assert_eq!(value, 1);
        assert_eq!(ttl, 600);
    }

    #[tokio::test]
    async fn test_corrupted_envelope_is_deleted() {
        let (backend, _, cache) = setup();
        backend.set("@cache_bad", "{not json").await.unwrap();

        let result = cache.get_cache::<Card>("bad").await;
        assert!(matches!(result, Err(StoreError::Corrupted(_))));
        assert!(!backend.contains("@cache_bad").await);
    }

    #[tokio::test]
    async fn test_other_version_is_deleted() {
        let (backend, _, cache) = setup();
        backend
            .set(
                "@cache_old",
                r#"{"data":1,"timestamp":1700000000000,"maxAge":1000,"version":"0.9"}"#,
            )
            .await
            .unwrap();

        let result = cache.get_cache::<u32>("old").await;
        assert!(matches!(result, Err(StoreError::Corrupted(_))));
        assert!(!backend.contains("@cache_old").await);
    }

    #[tokio::test]
    async fn test_type_mismatch_keeps_entry() {
        let (backend, _, cache) = setup();
        cache.set_cache("num", &7u32, None).await.unwrap();

        let result = cache.get_cache::<Card>("num").await;
        assert!(matches!(result, Err(StoreError::Corrupted(_))));
        assert!(backend.contains("@cache_num").await);
    }

    #[tokio::test]
    async fn test_update_existing() {
        let (_, _, cache) = setup();
        cache.set_cache("count", &1u32, None).await.unwrap();

        let written = cache
            .update_cache::<u32, _>("count", |current| current.map(|n| n + 1))
            .await
            .unwrap();

        assert!(written);
        assert_eq!(cache.get_cache::<u32>("count").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_missing_receives_none() {
        let (_, _, cache) = setup();

        let written = cache
            .update_cache::<u32, _>("fresh", |current| {
                assert!(current.is_none());
                Some(10)
            })
            .await
            .unwrap();

        assert!(written);
        assert_eq!(cache.get_cache::<u32>("fresh").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_update_returning_none_is_noop() {
        let (backend, _, cache) = setup();
        cache.set_cache("keep", &5u32, None).await.unwrap();
        let writes_before = backend.write_count("@cache_keep").await;

        let written = cache
            .update_cache::<u32, _>("keep", |_| None)
            .await
            .unwrap();

        assert!(!written);
        assert_eq!(backend.write_count("@cache_keep").await, writes_before);
        assert_eq!(cache.get_cache::<u32>("keep").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_update_keeps_max_age() {
        let (_, clock, cache) = setup();
        cache.set_cache("short", &1u32, Some(100)).await.unwrap();

        cache
            .update_cache::<u32, _>("short", |c| c.map(|n| n + 1))
            .await
            .unwrap();

        clock.advance(101);
        assert!(matches!(
            cache.get_cache::<u32>("short").await,
            Err(StoreError::Expired(_))
        ));
    }

    #[tokio::test]
    async fn test_clear_all_only_touches_cache_prefix() {
        let (backend, _, cache) = setup();
        cache.set_cache("a", &1u32, None).await.unwrap();
        cache.set_cache("b", &2u32, None).await.unwrap();
        backend.set("@sync_queue", "[]").await.unwrap();

        let removed = cache.clear_all().await.unwrap();

        assert_eq!(removed, 2);
        assert_eq!(backend.len().await, 1);
        assert!(backend.contains("@sync_queue").await);
    }

    #[tokio::test]
    async fn test_stats_do_not_delete_expired() {
        let (backend, clock, cache) = setup();
        cache.set_cache("short", &1u32, Some(10)).await.unwrap();
        cache.set_cache("long", &2u32, Some(10_000)).await.unwrap();
        backend.set("@cache_junk", "garbage").await.unwrap();
        backend.set("unrelated", "x").await.unwrap();
        clock.advance(100);

        let stats = cache.stats().await.unwrap();

        assert_eq!(stats.total_entries, 3);
        assert_eq!(stats.valid_entries, 1);
        assert_eq!(stats.expired_entries, 2);
        assert!(stats.total_size_bytes > "garbage".len());
        assert!(backend.contains("@cache_short").await);
    }

    #[tokio::test]
    async fn test_remove_cache() {
        let (_, _, cache) = setup();
        cache.set_cache("gone", &1u32, None).await.unwrap();

        cache.remove_cache("gone").await.unwrap();
        cache.remove_cache("gone").await.unwrap();

        assert!(matches!(
            cache.get_cache::<u32>("gone").await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_backend_failure_surfaces() {
        let (backend, _, cache) = setup();
        backend.set_unavailable(true);

        assert!(matches!(
            cache.set_cache("k", &1u32, None).await,
            Err(StoreError::Backend(_))
        ));
        assert!(matches!(
            cache.get_cache::<u32>("k").await,
            Err(StoreError::Backend(_))
        ));
    }
}
