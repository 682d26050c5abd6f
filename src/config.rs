//! Configuration Module
//!
//! Handles loading and managing daemon configuration from environment variables.

use std::env;
use std::path::PathBuf;

use crate::cache::DEFAULT_MAX_AGE_MS;
use crate::sync::DEFAULT_MAX_ATTEMPTS;

/// Daemon configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Root directory for the file backends (`general/` and `secure/` below it)
    pub data_dir: PathBuf,
    /// Default cache max age in milliseconds
    pub cache_max_age_ms: u64,
    /// Attempt budget for queued sync operations
    pub sync_max_attempts: u32,
    /// Periodic drain interval in seconds
    pub drain_interval: u64,
    /// Initial connectivity flag
    pub start_online: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `DATA_DIR` - Storage root (default: ./cardkeep-data)
    /// - `CACHE_MAX_AGE_MS` - Default cache TTL in ms (default: 86400000)
    /// - `SYNC_MAX_ATTEMPTS` - Attempts before an operation is dropped (default: 3)
    /// - `DRAIN_INTERVAL` - Drain frequency in seconds (default: 30)
    /// - `START_ONLINE` - Whether the queue starts online (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            data_dir: env::var("DATA_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            cache_max_age_ms: parse_var("CACHE_MAX_AGE_MS").unwrap_or(defaults.cache_max_age_ms),
            sync_max_attempts: parse_var("SYNC_MAX_ATTEMPTS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.sync_max_attempts),
            drain_interval: parse_var("DRAIN_INTERVAL")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.drain_interval),
            start_online: parse_var("START_ONLINE").unwrap_or(defaults.start_online),
        }
    }

    /// Directory backing the general (unencrypted) store.
    pub fn general_dir(&self) -> PathBuf {
        self.data_dir.join("general")
    }

    /// Directory backing the size-limited secure store.
    pub fn secure_dir(&self) -> PathBuf {
        self.data_dir.join("secure")
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            data_dir: PathBuf::from("./cardkeep-data"),
            cache_max_age_ms: DEFAULT_MAX_AGE_MS,
            sync_max_attempts: DEFAULT_MAX_ATTEMPTS,
            drain_interval: 30,
            start_online: true,
        }
    }
}
