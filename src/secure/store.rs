//! Secure Chunk Store
//!
//! Persists string secrets on a size-limited secure backend. Values that fit
//! in one entry are stored as-is; larger values are split into chunks whose
//! count is recorded in an obfuscated meta entry written after the chunks.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::chunking::{
    chunk_key, decode_chunk_count, encode_chunk_count, item_key, legacy_marker_key, meta_key,
    parse_legacy_count, split_chunks,
};
use super::MAX_ITEM_SIZE;
use crate::backend::KeyValueBackend;
use crate::error::{Result, StoreError};

// == Secure Read ==
/// Outcome of reassembling a secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecureRead {
    /// Every piece was present
    Complete(String),
    /// Some chunks were missing; `value` is the concatenation of the rest
    Partial { value: String, missing: Vec<usize> },
}

impl SecureRead {
    pub fn into_value(self) -> String {
        match self {
            SecureRead::Complete(value) => value,
            SecureRead::Partial { value, .. } => value,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, SecureRead::Complete(_))
    }
}

/// Chunk bookkeeping currently stored for a key.
#[derive(Debug, Default)]
struct ChunkRecord {
    /// A secure meta entry exists
    meta: bool,
    /// A legacy plain-text marker exists in the general backend
    legacy: bool,
    /// Chunk count, `None` when no record exists or it is unreadable
    count: Option<usize>,
}

impl ChunkRecord {
    fn exists(&self) -> bool {
        self.meta || self.legacy
    }
}

// == Secure Chunk Store ==
pub struct SecureChunkStore {
    /// Size-limited encrypted storage
    secure: Arc<dyn KeyValueBackend>,
    /// Unencrypted storage, only consulted for legacy chunk markers
    general: Arc<dyn KeyValueBackend>,
}

impl SecureChunkStore {
    // == Constructor ==
    /// Creates a store chunking at [`MAX_ITEM_SIZE`].
    pub fn new(secure: Arc<dyn KeyValueBackend>, general: Arc<dyn KeyValueBackend>) -> Self {
        Self { secure, general }
    }

    // == Set ==
    /// Stores `value` under `key`, chunking it when it exceeds the item size.
    ///
    /// There is no rollback: if a chunk write fails, the chunks written so far
    /// stay behind but the meta entry (written last) is absent, so reads
    /// never see them.
    pub async fn set_secure_item(&self, key: &str, value: &str) -> Result<()> {
        let previous = self.chunk_record(key).await?;

        if value.len() <= MAX_ITEM_SIZE {
            self.secure
                .set(&item_key(key), value)
                .await
                .inspect_err(|e| warn!("Secure write of '{}' failed: {}", key, e))?;

            // Both records must go, or reads keep returning the old chunked value
            if previous.meta {
                self.secure
                    .remove(&meta_key(key))
                    .await
                    .inspect_err(|e| warn!("Dropping stale meta of '{}' failed: {}", key, e))?;
            }
            if previous.legacy {
                self.general
                    .remove(&legacy_marker_key(key))
                    .await
                    .inspect_err(|e| {
                        warn!("Dropping legacy chunk marker of '{}' failed: {}", key, e)
                    })?;
            }
            self.purge_chunks(key, 0, &previous).await;

            debug!("Stored secure item '{}' ({} bytes)", key, value.len());
            return Ok(());
        }

        let chunks = split_chunks(value, MAX_ITEM_SIZE);
        for (index, chunk) in chunks.iter().enumerate() {
            self.secure
                .set(&chunk_key(key, index), chunk)
                .await
                .inspect_err(|e| {
                    warn!(
                        "Secure write of '{}' chunk {}/{} failed: {}",
                        key,
                        index + 1,
                        chunks.len(),
                        e
                    )
                })?;
        }

        self.secure
            .set(&meta_key(key), &encode_chunk_count(chunks.len()))
            .await
            .inspect_err(|e| warn!("Secure meta write of '{}' failed: {}", key, e))?;

        if previous.legacy {
            if let Err(e) = self.general.remove(&legacy_marker_key(key)).await {
                warn!("Could not delete legacy chunk marker of '{}': {}", key, e);
            }
        }
        self.purge_chunks(key, chunks.len(), &previous).await;
        if let Err(e) = self.secure.remove(&item_key(key)).await {
            debug!("Could not drop unchunked copy of '{}': {}", key, e);
        }

        debug!(
            "Stored secure item '{}' ({} bytes in {} chunks)",
            key,
            value.len(),
            chunks.len()
        );
        Ok(())
    }

    // == Get ==
    /// Returns the secret stored under `key`.
    ///
    /// Missing chunks are skipped and the remaining ones concatenated; use
    /// [`read_secure_item`](Self::read_secure_item) to find out whether that
    /// happened.
    pub async fn get_secure_item(&self, key: &str) -> Result<String> {
        let read = self.read_secure_item(key).await?;
        if let SecureRead::Partial { missing, .. } = &read {
            warn!(
                "Secure item '{}' reassembled without chunks {:?}",
                key, missing
            );
        }
        Ok(read.into_value())
    }

    /// Reads `key`, reporting whether every chunk was found.
    pub async fn read_secure_item(&self, key: &str) -> Result<SecureRead> {
        if let Some(raw) = self.secure.get(&meta_key(key)).await? {
            let count = decode_chunk_count(&raw)
                .inspect_err(|e| warn!("Unreadable chunk meta for '{}': {}", key, e))?;
            return self.reassemble(key, count).await;
        }

        if let Some(raw) = self.general.get(&legacy_marker_key(key)).await? {
            match parse_legacy_count(&raw) {
                Ok(count) => {
                    self.migrate_legacy_marker(key, count).await;
                    return self.reassemble(key, count).await;
                }
                Err(e) => warn!("Ignoring legacy chunk marker of '{}': {}", key, e),
            }
        }

        self.secure
            .get(&item_key(key))
            .await?
            .map(SecureRead::Complete)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    // == Remove ==
    /// Deletes every physical entry of `key`. Removing an absent key is `Ok`,
    /// and so is removing one whose chunk records are unreadable.
    pub async fn remove_secure_item(&self, key: &str) -> Result<()> {
        let record = self.chunk_record(key).await?;

        if record.exists() {
            self.remove_chunks(key, 0, record.count).await?;
        }
        if record.meta {
            self.secure.remove(&meta_key(key)).await?;
        }
        if record.legacy {
            self.general.remove(&legacy_marker_key(key)).await?;
        }

        self.secure.remove(&item_key(key)).await?;
        debug!("Removed secure item '{}'", key);
        Ok(())
    }

    // == Has ==
    /// True when any shape of `key` is stored.
    pub async fn has_secure_item(&self, key: &str) -> Result<bool> {
        if self.secure.get(&meta_key(key)).await?.is_some()
            || self.secure.get(&item_key(key)).await?.is_some()
        {
            return Ok(true);
        }
        Ok(self.general.get(&legacy_marker_key(key)).await?.is_some())
    }

    // == Internals ==
    async fn reassemble(&self, key: &str, count: usize) -> Result<SecureRead> {
        let mut value = String::new();
        let mut missing = Vec::new();

        for index in 0..count {
            match self.secure.get(&chunk_key(key, index)).await {
                Ok(Some(chunk)) => value.push_str(&chunk),
                Ok(None) => missing.push(index),
                Err(e) => {
                    debug!("Chunk {} of '{}' unreadable: {}", index, key, e);
                    missing.push(index);
                }
            }
        }

        if missing.is_empty() {
            Ok(SecureRead::Complete(value))
        } else if missing.len() == count {
            Err(StoreError::Corrupted(format!(
                "none of the {count} chunks of '{key}' are readable"
            )))
        } else {
            Ok(SecureRead::Partial { value, missing })
        }
    }

    /// Looks up the meta entry and the legacy marker of `key`. Secure meta
    /// wins when both exist; an unreadable record leaves `count` empty.
    async fn chunk_record(&self, key: &str) -> Result<ChunkRecord> {
        let mut record = ChunkRecord::default();

        if let Some(raw) = self.secure.get(&meta_key(key)).await? {
            record.meta = true;
            record.count = decode_chunk_count(&raw)
                .inspect_err(|e| warn!("Unreadable chunk meta for '{}': {}", key, e))
                .ok();
        }

        if let Some(raw) = self.general.get(&legacy_marker_key(key)).await? {
            record.legacy = true;
            if !record.meta {
                record.count = parse_legacy_count(&raw)
                    .inspect_err(|e| warn!("Unreadable legacy chunk marker for '{}': {}", key, e))
                    .ok();
            }
        }

        Ok(record)
    }

    /// Moves a legacy plain-text marker into obfuscated secure meta.
    /// The marker is only deleted once the new meta is in place.
    async fn migrate_legacy_marker(&self, key: &str, count: usize) {
        if let Err(e) = self
            .secure
            .set(&meta_key(key), &encode_chunk_count(count))
            .await
        {
            warn!("Legacy meta migration of '{}' failed: {}", key, e);
            return;
        }

        match self.general.remove(&legacy_marker_key(key)).await {
            Ok(()) => info!("Migrated legacy chunk marker of '{}'", key),
            Err(e) => warn!("Could not delete legacy chunk marker of '{}': {}", key, e),
        }
    }

    /// Deletes chunks from index `from`. Without a known count, chunks are
    /// probed upward until the first gap.
    async fn remove_chunks(&self, key: &str, from: usize, count: Option<usize>) -> Result<()> {
        match count {
            Some(to) => {
                for index in from..to {
                    self.secure.remove(&chunk_key(key, index)).await?;
                }
            }
            None => {
                let mut index = from;
                while self.secure.get(&chunk_key(key, index)).await?.is_some() {
                    self.secure.remove(&chunk_key(key, index)).await?;
                    index += 1;
                }
            }
        }
        Ok(())
    }

    /// Best-effort removal of chunks from `from` onward left over from the
    /// previous shape of `key`.
    async fn purge_chunks(&self, key: &str, from: usize, previous: &ChunkRecord) {
        if !previous.exists() {
            return;
        }
        if let Err(e) = self.remove_chunks(key, from, previous.count).await {
            debug!("Stale chunks of '{}' not purged: {}", key, e);
        }
    }
}
