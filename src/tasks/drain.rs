//! Sync Drain Task
//!
//! Background task that drains the sync queue periodically and on reconnect.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::sync::{DrainOutcome, SyncQueue};

/// Spawns a background task that keeps draining the sync queue.
///
/// A drain runs every `interval_secs` seconds and immediately whenever the
/// connectivity signal flips to online. The queue's own in-flight guard
/// keeps this from overlapping with drains triggered elsewhere.
///
/// # Arguments
/// * `queue` - Shared sync queue
/// * `online` - Connectivity signal (another receiver of the queue's channel)
/// * `interval_secs` - Seconds between timer-driven drains
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let drain_handle = spawn_drain_task(queue.clone(), online_rx, 30);
/// // Later, during shutdown:
/// drain_handle.abort();
/// ```
pub fn spawn_drain_task(
    queue: Arc<SyncQueue>,
    mut online: watch::Receiver<bool>,
    interval_secs: u64,
) -> JoinHandle<()> {
    let period = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting sync drain task with interval of {} seconds",
            interval_secs
        );

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = online.changed() => {
                    if changed.is_err() {
                        info!("Connectivity signal closed, stopping drain task");
                        return;
                    }
                    if !*online.borrow_and_update() {
                        debug!("Went offline, waiting for reconnect");
                        continue;
                    }
                    info!("Back online, draining sync queue");
                }
            }

            match queue.drain().await {
                Ok(DrainOutcome::Completed(report)) if report.succeeded + report.dropped > 0 => {
                    info!(
                        "Sync drain: {} replayed, {} dropped, {} still pending",
                        report.succeeded,
                        report.dropped,
                        report.retained + report.deferred
                    );
                }
                Ok(outcome) => debug!("Sync drain: {:?}", outcome),
                Err(e) => warn!("Sync drain failed: {}", e),
            }
        }
    })
}
