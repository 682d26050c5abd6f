//! In-memory backend
//!
//! HashMap storage behind a tokio RwLock. Used by tests (with failure
//! injection) and as a stand-in for the size-limited secure store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::KeyValueBackend;
use crate::error::{Result, StoreError};

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, String>,
    /// Number of successful `set` calls per key
    writes: HashMap<String, usize>,
}

// == Memory Backend ==
#[derive(Debug)]
pub struct MemoryBackend {
    inner: RwLock<Inner>,
    /// Values longer than this (in bytes) are rejected
    max_value_size: Option<usize>,
    /// Remaining successful writes before `set` starts failing
    write_budget: AtomicUsize,
    /// When set, every call fails
    unavailable: AtomicBool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an unbounded backend.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            max_value_size: None,
            write_budget: AtomicUsize::new(usize::MAX),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Creates a backend that rejects values above `max` bytes, like a keychain.
    pub fn with_max_value_size(max: usize) -> Self {
        Self {
            max_value_size: Some(max),
            ..Self::new()
        }
    }

    /// Lets the next `n` writes succeed, then fails every later `set`.
    pub fn fail_writes_after(&self, n: usize) {
        self.write_budget.store(n, Ordering::SeqCst);
    }

    /// Makes every call fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// How many times `key` has been written successfully.
    pub async fn write_count(&self, key: &str) -> usize {
        self.inner.read().await.writes.get(key).copied().unwrap_or(0)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.inner.read().await.entries.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.entries.is_empty()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("backend unavailable".to_string()));
        }
        Ok(())
    }

    fn take_write_slot(&self) -> Result<()> {
        let granted = self
            .write_budget
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                usize::MAX => Some(usize::MAX),
                n => Some(n - 1),
            })
            .is_ok();

        if granted {
            Ok(())
        } else {
            Err(StoreError::Backend("write rejected".to_string()))
        }
    }
}

#[async_trait]
impl KeyValueBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self.inner.read().await.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_available()?;

        if let Some(max) = self.max_value_size {
            if value.len() > max {
                return Err(StoreError::Backend(format!(
                    "value of {} bytes exceeds the {} byte item limit",
                    value.len(),
                    max
                )));
            }
        }

        self.take_write_slot()?;

        let mut inner = self.inner.write().await;
        inner.entries.insert(key.to_string(), value.to_string());
        *inner.writes.entry(key.to_string()).or_insert(0) += 1;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.check_available()?;
        self.inner.write().await.entries.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        self.check_available()?;
        Ok(self.inner.read().await.entries.keys().cloned().collect())
    }
}
