//! API Handlers
//!
//! HTTP request handlers exposing the secure store, the cache and the sync
//! queue of one daemon instance.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tokio::sync::watch;
use tracing::info;

use crate::backend::{FileBackend, KeyValueBackend, MemoryBackend};
use crate::cache::{CacheStats, ExpiringCache};
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::models::{
    validate_key, CacheResponse, CacheSetRequest, ClearResponse, ConnectivityRequest,
    ConnectivityResponse, DrainResponse, EnqueueRequest, HealthResponse, MessageResponse,
    QueueResponse, SecretRequest, SecretResponse,
};
use crate::secure::{SecureChunkStore, MAX_ITEM_SIZE};
use crate::sync::{DryRunExecutor, SyncExecutor, SyncOperation, SyncQueue};

/// Application state shared across all handlers.
///
/// This is the composition root: each engine exists once per daemon and is
/// handed out by `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub secure: Arc<SecureChunkStore>,
    pub cache: Arc<ExpiringCache>,
    pub queue: Arc<SyncQueue>,
    /// Drives the queue's connectivity signal
    pub connectivity: Arc<watch::Sender<bool>>,
}

impl AppState {
    /// Wires the engines over the given backends.
    pub fn new(
        secure_backend: Arc<dyn KeyValueBackend>,
        general_backend: Arc<dyn KeyValueBackend>,
        executor: Arc<dyn SyncExecutor>,
        config: &Config,
    ) -> Self {
        let (connectivity, online) = watch::channel(config.start_online);

        let secure = SecureChunkStore::new(secure_backend, general_backend.clone());
        let cache = ExpiringCache::new(general_backend.clone())
            .with_default_max_age(config.cache_max_age_ms);
        let queue = SyncQueue::new(general_backend, executor, online)
            .with_max_attempts(config.sync_max_attempts);

        Self {
            secure: Arc::new(secure),
            cache: Arc::new(cache),
            queue: Arc::new(queue),
            connectivity: Arc::new(connectivity),
        }
    }

    /// Volatile state with a dry-run executor.
    pub fn in_memory(config: &Config) -> Self {
        Self::new(
            Arc::new(MemoryBackend::with_max_value_size(MAX_ITEM_SIZE)),
            Arc::new(MemoryBackend::new()),
            Arc::new(DryRunExecutor),
            config,
        )
    }

    /// Opens file backends below `config.data_dir`.
    pub async fn from_config(config: &Config, executor: Arc<dyn SyncExecutor>) -> Result<Self> {
        let general = FileBackend::open(config.general_dir()).await?;
        let secure = FileBackend::open(config.secure_dir())
            .await?
            .with_max_value_size(MAX_ITEM_SIZE);

        Ok(Self::new(Arc::new(secure), Arc::new(general), executor, config))
    }

    /// A fresh receiver of the connectivity signal.
    pub fn online_signal(&self) -> watch::Receiver<bool> {
        self.connectivity.subscribe()
    }
}

fn checked_key(key: String) -> Result<String> {
    match validate_key(&key) {
        Some(msg) => Err(StoreError::InvalidRequest(msg)),
        None => Ok(key),
    }
}

// == Secure Store ==

/// Handler for PUT /secure/:key
pub async fn put_secret_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<SecretRequest>,
) -> Result<Json<MessageResponse>> {
    let key = checked_key(key)?;
    state.secure.set_secure_item(&key, &req.value).await?;
    Ok(Json(MessageResponse::stored(key)))
}

/// Handler for GET /secure/:key
pub async fn get_secret_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<SecretResponse>> {
    let key = checked_key(key)?;
    let read = state.secure.read_secure_item(&key).await?;
    Ok(Json(SecretResponse::new(key, read)))
}

/// Handler for DELETE /secure/:key
pub async fn delete_secret_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MessageResponse>> {
    let key = checked_key(key)?;
    state.secure.remove_secure_item(&key).await?;
    Ok(Json(MessageResponse::removed(key)))
}

// == Cache ==

/// Handler for PUT /cache/:key
pub async fn put_cache_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<CacheSetRequest>,
) -> Result<Json<MessageResponse>> {
    let key = checked_key(key)?;
    state.cache.set_cache(&key, &req.data, req.max_age_ms).await?;
    Ok(Json(MessageResponse::stored(key)))
}

/// Handler for GET /cache/:key
pub async fn get_cache_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<CacheResponse>> {
    let key = checked_key(key)?;
    let (data, ttl): (Value, u64) = state.cache.get_cache_with_ttl(&key).await?;
    Ok(Json(CacheResponse::new(key, data, ttl)))
}

/// Handler for DELETE /cache/:key
pub async fn delete_cache_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MessageResponse>> {
    let key = checked_key(key)?;
    state.cache.remove_cache(&key).await?;
    Ok(Json(MessageResponse::removed(key)))
}

/// Handler for GET /cache
pub async fn cache_stats_handler(State(state): State<AppState>) -> Result<Json<CacheStats>> {
    Ok(Json(state.cache.stats().await?))
}

/// Handler for DELETE /cache
pub async fn clear_cache_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    let removed = state.cache.clear_all().await?;
    Ok(Json(ClearResponse { removed }))
}

// == Sync Queue ==

/// Handler for GET /queue
pub async fn list_queue_handler(State(state): State<AppState>) -> Result<Json<QueueResponse>> {
    Ok(Json(QueueResponse {
        online: state.queue.is_online(),
        pending: state.queue.pending().await?,
    }))
}

/// Handler for POST /queue
pub async fn enqueue_handler(
    State(state): State<AppState>,
    Json(req): Json<EnqueueRequest>,
) -> Result<(StatusCode, Json<SyncOperation>)> {
    if let Some(msg) = req.validate() {
        return Err(StoreError::InvalidRequest(msg));
    }

    let op = state.queue.enqueue(req.into()).await?;
    Ok((StatusCode::CREATED, Json(op)))
}

/// Handler for DELETE /queue
pub async fn clear_queue_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    let removed = state.queue.clear().await?;
    Ok(Json(ClearResponse { removed }))
}

/// Handler for POST /queue/drain
pub async fn drain_handler(State(state): State<AppState>) -> Result<Json<DrainResponse>> {
    let outcome = state.queue.drain().await?;
    Ok(Json(outcome.into()))
}

/// Handler for PUT /connectivity
pub async fn connectivity_handler(
    State(state): State<AppState>,
    Json(req): Json<ConnectivityRequest>,
) -> Json<ConnectivityResponse> {
    let previous = state.connectivity.send_replace(req.online);
    if previous != req.online {
        info!("Connectivity set to {}", if req.online { "online" } else { "offline" });
    }
    Json(ConnectivityResponse { online: req.online })
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
