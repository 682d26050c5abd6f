//! Background Tasks Module
//!
//! Contains background tasks that run periodically during daemon operation.
//!
//! # Tasks
//! - Sync drain: replays the offline queue on a timer and whenever
//!   connectivity comes back

mod drain;

pub use drain::spawn_drain_task;
