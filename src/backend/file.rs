//! File backend
//!
//! Stores each key as its own file inside a directory. File names are the
//! hex encoding of the key, so arbitrary key strings are safe on every
//! filesystem. Writes go to a temporary file first and are renamed into place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::KeyValueBackend;
use crate::error::{Result, StoreError};

const TMP_SUFFIX: &str = ".tmp";

/// Longest key (in bytes) whose hex file name, temp suffix included, stays
/// within the common 255-byte file name limit.
pub const MAX_KEY_BYTES: usize = (255 - TMP_SUFFIX.len()) / 2;

// == File Backend ==
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
    max_value_size: Option<usize>,
}

impl FileBackend {
    /// Opens (creating if needed) a backend rooted at `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        debug!("File backend opened at {}", dir.display());

        Ok(Self {
            dir,
            max_value_size: None,
        })
    }

    /// Rejects values above `max` bytes.
    pub fn with_max_value_size(mut self, max: usize) -> Self {
        self.max_value_size = Some(max);
        self
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.len() > MAX_KEY_BYTES {
            return Err(StoreError::InvalidRequest(format!(
                "key of {} bytes exceeds the {} byte file backend limit",
                key.len(),
                MAX_KEY_BYTES
            )));
        }
        Ok(self.dir.join(hex::encode(key.as_bytes())))
    }
}

#[async_trait]
impl KeyValueBackend for FileBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)?).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Some(max) = self.max_value_size {
            if value.len() > max {
                return Err(StoreError::Backend(format!(
                    "value of {} bytes exceeds the {} byte item limit",
                    value.len(),
                    max
                )));
            }
        }

        let path = self.path_for(key)?;
        let mut tmp = path.clone().into_os_string();
        tmp.push(TMP_SUFFIX);

        fs::write(&tmp, value).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut dir = fs::read_dir(&self.dir).await?;

        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.ends_with(TMP_SUFFIX) {
                continue;
            }
            // Foreign files that are not hex-encoded keys are ignored
            if let Some(key) = hex::decode(name)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
            {
                keys.push(key);
            }
        }

        Ok(keys)
    }
}
