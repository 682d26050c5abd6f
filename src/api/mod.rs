//! API Module
//!
//! HTTP handlers and routing for the local daemon.
//!
//! # Endpoints
//! - `/secure/:key` - Secure chunk store
//! - `/cache`, `/cache/:key` - Expiring cache
//! - `/queue`, `/queue/drain` - Sync queue
//! - `/connectivity` - Connectivity signal
//! - `/health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
