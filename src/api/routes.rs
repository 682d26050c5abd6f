//! API Routes
//!
//! Configures the Axum router with all daemon endpoints.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cache_stats_handler, clear_cache_handler, clear_queue_handler, connectivity_handler,
    delete_cache_handler, delete_secret_handler, drain_handler, enqueue_handler,
    get_cache_handler, get_secret_handler, health_handler, list_queue_handler, put_cache_handler,
    put_secret_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT|GET|DELETE /secure/:key` - Secure store
/// - `PUT|GET|DELETE /cache/:key` - Cache entries
/// - `GET|DELETE /cache` - Cache statistics / clear all
/// - `GET|POST|DELETE /queue` - List / enqueue / clear sync operations
/// - `POST /queue/drain` - Drain the sync queue now
/// - `PUT /connectivity` - Set the connectivity signal
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (the daemon binds for local clients)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/secure/:key",
            put(put_secret_handler)
                .get(get_secret_handler)
                .delete(delete_secret_handler),
        )
        .route(
            "/cache",
            get(cache_stats_handler).delete(clear_cache_handler),
        )
        .route(
            "/cache/:key",
            put(put_cache_handler)
                .get(get_cache_handler)
                .delete(delete_cache_handler),
        )
        .route(
            "/queue",
            get(list_queue_handler)
                .post(enqueue_handler)
                .delete(clear_queue_handler),
        )
        .route("/queue/drain", post(drain_handler))
        .route("/connectivity", put(connectivity_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
