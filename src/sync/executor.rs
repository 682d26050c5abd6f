//! Executors replay queued operations against the remote backend.
//!
//! The transport lives outside this crate; callers implement
//! [`SyncExecutor`] or wrap a closure in [`FnExecutor`].

use async_trait::async_trait;
use tracing::info;

use super::SyncOperation;

#[async_trait]
pub trait SyncExecutor: Send + Sync {
    /// Applies `op` remotely. Any error counts as a failed attempt and its
    /// message is kept as the operation's `lastError`.
    async fn execute(&self, op: &SyncOperation) -> anyhow::Result<()>;
}

/// Adapts a synchronous closure into an executor.
pub struct FnExecutor<F>(pub F);

#[async_trait]
impl<F> SyncExecutor for FnExecutor<F>
where
    F: Fn(&SyncOperation) -> anyhow::Result<()> + Send + Sync,
{
    async fn execute(&self, op: &SyncOperation) -> anyhow::Result<()> {
        (self.0)(op)
    }
}

/// Logs each operation and reports success without contacting anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DryRunExecutor;

#[async_trait]
impl SyncExecutor for DryRunExecutor {
    async fn execute(&self, op: &SyncOperation) -> anyhow::Result<()> {
        info!(
            "dry-run replay of {} '{}' (attempt {})",
            op.op_type,
            op.id,
            op.attempts + 1
        );
        Ok(())
    }
}
