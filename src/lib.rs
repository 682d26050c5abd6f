//! Cardkeep - on-device persistence core
//!
//! Three engines over pluggable key-value backends:
//! - [`SecureChunkStore`]: large secrets on a size-limited secure store
//! - [`ExpiringCache`]: TTL cache with a versioned JSON envelope
//! - [`SyncQueue`]: durable offline mutation queue with bounded retry

pub mod api;
pub mod backend;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod secure;
pub mod sync;
pub mod tasks;

pub use api::AppState;
pub use cache::ExpiringCache;
pub use config::Config;
pub use error::{Result, StoreError};
pub use secure::SecureChunkStore;
pub use sync::SyncQueue;
pub use tasks::spawn_drain_task;
