//! Storage Backends
//!
//! The engines never touch storage directly; they talk to a [`KeyValueBackend`].
//! Two bundled implementations are provided:
//! - [`MemoryBackend`] - in-process map, optional value ceiling and failure injection
//! - [`FileBackend`] - one file per key inside a directory

mod file;
mod memory;

use async_trait::async_trait;

use crate::error::Result;

pub use file::{FileBackend, MAX_KEY_BYTES};
pub use memory::MemoryBackend;

// == Backend Trait ==
/// Asynchronous, fallible string key-value storage.
///
/// `get` returns `Ok(None)` for a missing key; `remove` of a missing key is
/// not an error.
#[async_trait]
pub trait KeyValueBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;

    /// Lists every key currently stored.
    async fn keys(&self) -> Result<Vec<String>>;
}
