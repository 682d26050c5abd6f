//! Sync Queue Module
//!
//! Durable FIFO queue of mutations recorded while offline and replayed
//! through an injected [`SyncExecutor`] once connectivity returns.

mod executor;
mod operation;
mod queue;

pub use executor::{DryRunExecutor, FnExecutor, SyncExecutor};
pub use operation::{NewOperation, SyncOperation};
pub use queue::{DrainOutcome, DrainReport, SyncQueue};

// == Public Constants ==
/// Key of the persisted queue in the general backend
pub const SYNC_QUEUE_KEY: &str = "@sync_queue";

/// Failed attempts after which an operation is dropped
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
