//! Offline mutation queue.
//!
//! The whole queue lives in one JSON array under [`SYNC_QUEUE_KEY`] and is
//! rewritten on every change. There is no backoff or scheduler here; progress
//! only happens when someone calls [`SyncQueue::drain`].

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{NewOperation, SyncExecutor, SyncOperation, DEFAULT_MAX_ATTEMPTS, SYNC_QUEUE_KEY};
use crate::backend::KeyValueBackend;
use crate::clock::{Clock, SystemClock};
use crate::error::{Result, StoreError};

/// Result of one [`SyncQueue::drain`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Connectivity signal was false; nothing was attempted
    Offline,
    /// Another drain is still running
    AlreadyRunning,
    Completed(DrainReport),
}

/// Per-drain counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Executed and removed
    pub succeeded: usize,
    /// Failed, kept for the next drain
    pub retained: usize,
    /// Failed for the last time and discarded
    pub dropped: usize,
    /// Skipped because an earlier operation on the same entity failed
    pub deferred: usize,
    /// Executed, but the result could not be persisted; the pass stopped there
    pub unrecorded: usize,
}

/// What happened to an operation after its result was applied.
enum Disposition {
    Removed,
    Retained,
    Dropped,
    /// The operation left the queue while it was executing
    Vanished,
}

pub struct SyncQueue {
    backend: Arc<dyn KeyValueBackend>,
    executor: Arc<dyn SyncExecutor>,
    online: watch::Receiver<bool>,
    clock: Arc<dyn Clock>,
    max_attempts: u32,
    /// Serializes load-modify-persist cycles on the stored list
    list_lock: Mutex<()>,
    /// Held for the whole of a drain
    drain_lock: Mutex<()>,
}

impl SyncQueue {
    pub fn new(
        backend: Arc<dyn KeyValueBackend>,
        executor: Arc<dyn SyncExecutor>,
        online: watch::Receiver<bool>,
    ) -> Self {
        Self {
            backend,
            executor,
            online,
            clock: Arc::new(SystemClock),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            list_lock: Mutex::new(()),
            drain_lock: Mutex::new(()),
        }
    }

    /// Attempt budget for operations enqueued from now on.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    // == Enqueue ==
    /// Appends an operation and persists the queue.
    pub async fn enqueue(&self, op: NewOperation) -> Result<SyncOperation> {
        let _guard = self.list_lock.lock().await;
        let mut ops = self.load().await?;

        let queued = SyncOperation {
            id: Uuid::new_v4().to_string(),
            op_type: op.op_type,
            payload: op.payload,
            enqueued_at: self.clock.now_ms(),
            attempts: 0,
            max_attempts: self.max_attempts,
            last_error: None,
            entity: op.entity,
        };
        ops.push(queued.clone());
        self.persist(&ops).await?;

        info!(
            "Queued {} '{}' ({} pending)",
            queued.op_type,
            queued.id,
            ops.len()
        );
        Ok(queued)
    }

    /// Snapshot of the queue in replay order.
    pub async fn pending(&self) -> Result<Vec<SyncOperation>> {
        self.load().await
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.load().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Discards every queued operation. An unreadable queue is discarded too
    /// and counts as zero.
    pub async fn clear(&self) -> Result<usize> {
        let _guard = self.list_lock.lock().await;
        let count = match self.load().await {
            Ok(ops) => ops.len(),
            Err(StoreError::Corrupted(_)) => 0,
            Err(e) => return Err(e),
        };
        self.backend.remove(SYNC_QUEUE_KEY).await?;

        warn!("Sync queue cleared, {} operations discarded", count);
        Ok(count)
    }

    // == Drain ==
    /// Replays queued operations in insertion order.
    ///
    /// Successful operations are removed. A failure bumps `attempts`; the
    /// operation is kept for the next drain until `attempts == max_attempts`,
    /// then dropped for good.
    pub async fn drain(&self) -> Result<DrainOutcome> {
        if !self.is_online() {
            debug!("Drain skipped: offline");
            return Ok(DrainOutcome::Offline);
        }

        let Ok(_running) = self.drain_lock.try_lock() else {
            debug!("Drain skipped: another drain is in progress");
            return Ok(DrainOutcome::AlreadyRunning);
        };

        let snapshot = self.load().await?;
        let mut report = DrainReport::default();
        let mut blocked: HashSet<String> = HashSet::new();

        for op in snapshot {
            if !self.is_online() {
                info!("Connectivity lost, stopping drain");
                break;
            }

            if let Some(entity) = &op.entity {
                if blocked.contains(entity) {
                    debug!("Deferring '{}': earlier operation on {} failed", op.id, entity);
                    report.deferred += 1;
                    continue;
                }
            }

            let outcome = self.executor.execute(&op).await;
            let failed = outcome.is_err();

            let disposition = match self.apply(&op.id, outcome.map_err(|e| format!("{e:#}"))).await
            {
                Ok(disposition) => disposition,
                Err(e) => {
                    // The operation stays queued as it was and replays next time
                    error!(
                        "Recording the result of '{}' failed, stopping drain: {}",
                        op.id, e
                    );
                    report.unrecorded += 1;
                    break;
                }
            };

            match disposition {
                Disposition::Removed => report.succeeded += 1,
                Disposition::Retained => report.retained += 1,
                Disposition::Dropped => report.dropped += 1,
                Disposition::Vanished => {}
            }

            if failed {
                if let Some(entity) = op.entity {
                    blocked.insert(entity);
                }
            }
        }

        info!(
            "Drain finished: {} succeeded, {} retained, {} dropped, {} deferred, {} unrecorded",
            report.succeeded, report.retained, report.dropped, report.deferred, report.unrecorded
        );
        Ok(DrainOutcome::Completed(report))
    }

    // == Internals ==
    /// Records an execution result against the stored copy of `id`.
    ///
    /// The list is re-read so operations enqueued during the drain survive.
    async fn apply(&self, id: &str, outcome: std::result::Result<(), String>) -> Result<Disposition> {
        let _guard = self.list_lock.lock().await;
        let mut ops = self.load().await?;

        let Some(pos) = ops.iter().position(|op| op.id == id) else {
            debug!("Operation '{}' left the queue during execution", id);
            return Ok(Disposition::Vanished);
        };

        let disposition = match outcome {
            Ok(()) => {
                let op = ops.remove(pos);
                debug!("Replayed {} '{}'", op.op_type, op.id);
                Disposition::Removed
            }
            Err(message) => {
                if ops[pos].record_failure(message) {
                    let op = ops.remove(pos);
                    error!(
                        "Dropping {} '{}' after {} attempts: {}",
                        op.op_type,
                        op.id,
                        op.attempts,
                        op.last_error.as_deref().unwrap_or_default()
                    );
                    Disposition::Dropped
                } else {
                    let op = &ops[pos];
                    warn!(
                        "Replay of {} '{}' failed (attempt {}/{}): {}",
                        op.op_type,
                        op.id,
                        op.attempts,
                        op.max_attempts,
                        op.last_error.as_deref().unwrap_or_default()
                    );
                    Disposition::Retained
                }
            }
        };

        self.persist(&ops).await?;
        Ok(disposition)
    }

    async fn load(&self) -> Result<Vec<SyncOperation>> {
        match self.backend.get(SYNC_QUEUE_KEY).await? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| {
                error!("Sync queue is unreadable: {}", e);
                StoreError::Corrupted(format!("sync queue: {e}"))
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn persist(&self, ops: &[SyncOperation]) -> Result<()> {
        let raw = serde_json::to_string(ops)?;
        self.backend
            .set(SYNC_QUEUE_KEY, &raw)
            .await
            .inspect_err(|e| error!("Persisting sync queue failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::sync::FnExecutor;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    /// Records every call and fails operations whose type is in `failing`.
    fn recording_executor(
        failing: &'static [&'static str],
    ) -> (Arc<StdMutex<Vec<String>>>, Arc<dyn SyncExecutor>) {
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let log = calls.clone();
        let executor = FnExecutor(move |op: &SyncOperation| {
            log.lock().unwrap().push(op.op_type.clone());
            if failing.contains(&op.op_type.as_str()) {
                Err(anyhow::anyhow!("server said no"))
            } else {
                Ok(())
            }
        });
        (calls, Arc::new(executor))
    }

    fn queue_with(
        executor: Arc<dyn SyncExecutor>,
        online: bool,
    ) -> (Arc<MemoryBackend>, watch::Sender<bool>, SyncQueue) {
        let backend = Arc::new(MemoryBackend::new());
        let (tx, rx) = watch::channel(online);
        let queue = SyncQueue::new(backend.clone(), executor, rx);
        (backend, tx, queue)
    }

    fn completed(outcome: DrainOutcome) -> DrainReport {
        match outcome {
            DrainOutcome::Completed(report) => report,
            other => panic!("expected a completed drain, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_enqueue_persists_whole_list() {
        let (_, executor) = recording_executor(&[]);
        let (backend, _tx, queue) = queue_with(executor, true);

        let first = queue
            .enqueue(NewOperation::new("card.create", json!({"name": "Ada"})))
            .await
            .unwrap();
        queue
            .enqueue(NewOperation::new("card.update", json!({"title": "CTO"})))
            .await
            .unwrap();

        assert_eq!(first.attempts, 0);
        assert_eq!(first.max_attempts, 3);

        let raw = backend.get(SYNC_QUEUE_KEY).await.unwrap().unwrap();
        let stored: Vec<SyncOperation> = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].id, first.id);
        assert_eq!(stored[1].op_type, "card.update");
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let (_, executor) = recording_executor(&[]);
        let (_, _tx, queue) = queue_with(executor, true);

        let a = queue.enqueue(NewOperation::new("x", json!(null))).await.unwrap();
        let b = queue.enqueue(NewOperation::new("x", json!(null))).await.unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_drain_offline_is_noop() {
        let (calls, executor) = recording_executor(&[]);
        let (_, _tx, queue) = queue_with(executor, false);
        queue.enqueue(NewOperation::new("card.create", json!({}))).await.unwrap();

        assert_eq!(queue.drain().await.unwrap(), DrainOutcome::Offline);
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_drain_fifo_and_removes_successes() {
        let (calls, executor) = recording_executor(&[]);
        let (_, _tx, queue) = queue_with(executor, true);
        for kind in ["card.create", "card.update", "card.delete"] {
            queue.enqueue(NewOperation::new(kind, json!({}))).await.unwrap();
        }

        let report = completed(queue.drain().await.unwrap());

        assert_eq!(report.succeeded, 3);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["card.create", "card.update", "card.delete"]
        );
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_retry_exhaustion_drops_operation() {
        let (calls, executor) = recording_executor(&["card.update"]);
        let (_, _tx, queue) = queue_with(executor, true);
        queue.enqueue(NewOperation::new("card.update", json!({}))).await.unwrap();

        let first = completed(queue.drain().await.unwrap());
        assert_eq!(first.retained, 1);
        let pending = queue.pending().await.unwrap();
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("server said no"));

        completed(queue.drain().await.unwrap());
        let third = completed(queue.drain().await.unwrap());
        assert_eq!(third.dropped, 1);
        assert!(queue.is_empty().await.unwrap());
        assert_eq!(calls.lock().unwrap().len(), 3);

        // nothing left to attempt
        let fourth = completed(queue.drain().await.unwrap());
        assert_eq!(fourth, DrainReport::default());
        assert_eq!(calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_custom_max_attempts() {
        let (_, executor) = recording_executor(&["flaky"]);
        let (backend, tx, _) = queue_with(executor.clone(), true);
        let queue = SyncQueue::new(backend, executor, tx.subscribe()).with_max_attempts(1);
        queue.enqueue(NewOperation::new("flaky", json!({}))).await.unwrap();

        let report = completed(queue.drain().await.unwrap());
        assert_eq!(report.dropped, 1);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_failure_keeps_position() {
        let (_, executor) = recording_executor(&["card.update"]);
        let (_, _tx, queue) = queue_with(executor, true);
        queue.enqueue(NewOperation::new("card.update", json!({}))).await.unwrap();
        queue.enqueue(NewOperation::new("card.create", json!({}))).await.unwrap();
        queue.enqueue(NewOperation::new("card.update", json!({}))).await.unwrap();

        let report = completed(queue.drain().await.unwrap());

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.retained, 2);
        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|op| op.op_type == "card.update"));
    }

    #[tokio::test]
    async fn test_entity_failure_defers_later_operations() {
        let (calls, executor) = recording_executor(&["card.update"]);
        let (_, _tx, queue) = queue_with(executor, true);
        queue
            .enqueue(NewOperation::new("card.update", json!({})).for_entity("card:1"))
            .await
            .unwrap();
        queue
            .enqueue(NewOperation::new("card.delete", json!({})).for_entity("card:1"))
            .await
            .unwrap();
        queue
            .enqueue(NewOperation::new("card.delete", json!({})).for_entity("card:2"))
            .await
            .unwrap();

        let report = completed(queue.drain().await.unwrap());

        assert_eq!(report.retained, 1);
        assert_eq!(report.deferred, 1);
        assert_eq!(report.succeeded, 1);
        assert_eq!(*calls.lock().unwrap(), vec!["card.update", "card.delete"]);

        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[1].op_type, "card.delete");
        assert_eq!(pending[1].attempts, 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let (_, executor) = recording_executor(&[]);
        let (_, _tx, queue) = queue_with(executor, true);
        queue.enqueue(NewOperation::new("a", json!({}))).await.unwrap();
        queue.enqueue(NewOperation::new("b", json!({}))).await.unwrap();

        assert_eq!(queue.clear().await.unwrap(), 2);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_corrupted_queue_is_reported() {
        let (_, executor) = recording_executor(&[]);
        let (backend, _tx, queue) = queue_with(executor, true);
        backend.set(SYNC_QUEUE_KEY, "{oops").await.unwrap();

        assert!(matches!(queue.drain().await, Err(StoreError::Corrupted(_))));
        assert!(matches!(
            queue.enqueue(NewOperation::new("a", json!({}))).await,
            Err(StoreError::Corrupted(_))
        ));

        // the stored value is untouched until someone clears it
        assert_eq!(backend.get(SYNC_QUEUE_KEY).await.unwrap().as_deref(), Some("{oops"));
        assert_eq!(queue.clear().await.unwrap(), 0);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_unpersisted_result_stops_drain_with_report() {
        let (calls, executor) = recording_executor(&[]);
        let (backend, _tx, queue) = queue_with(executor, true);
        queue.enqueue(NewOperation::new("a", json!({}))).await.unwrap();
        queue.enqueue(NewOperation::new("b", json!({}))).await.unwrap();
        backend.fail_writes_after(0);

        let report = completed(queue.drain().await.unwrap());

        assert_eq!(report.unrecorded, 1);
        assert_eq!(report.succeeded, 0);
        assert_eq!(*calls.lock().unwrap(), vec!["a".to_string()]);
        assert_eq!(queue.len().await.unwrap(), 2);
    }

    /// Blocks inside `execute` until released.
    struct GateExecutor {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl SyncExecutor for GateExecutor {
        async fn execute(&self, _op: &SyncOperation) -> anyhow::Result<()> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_overlapping_drain_is_rejected_and_enqueue_survives() {
        let gate = Arc::new(GateExecutor {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let (_, _tx, queue) = queue_with(gate.clone(), true);
        let queue = Arc::new(queue);
        queue.enqueue(NewOperation::new("first", json!({}))).await.unwrap();

        let running = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.drain().await })
        };
        gate.entered.notified().await;

        assert_eq!(queue.drain().await.unwrap(), DrainOutcome::AlreadyRunning);
        let late = queue
            .enqueue(NewOperation::new("late", json!({})))
            .await
            .unwrap();

        gate.release.notify_one();
        let report = completed(running.await.unwrap().unwrap());

        assert_eq!(report.succeeded, 1);
        let pending = queue.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, late.id);
    }

    #[tokio::test]
    async fn test_drain_stops_when_connectivity_drops() {
        let (tx, rx) = watch::channel(true);
        let tx = Arc::new(tx);
        let signal = tx.clone();
        let executor = FnExecutor(move |_: &SyncOperation| -> anyhow::Result<()> {
            signal.send_replace(false);
            Ok(())
        });

        let queue = SyncQueue::new(Arc::new(MemoryBackend::new()), Arc::new(executor), rx);
        queue.enqueue(NewOperation::new("a", json!({}))).await.unwrap();
        queue.enqueue(NewOperation::new("b", json!({}))).await.unwrap();

        let report = completed(queue.drain().await.unwrap());

        assert_eq!(report.succeeded, 1);
        assert_eq!(queue.len().await.unwrap(), 1);
        assert!(!queue.is_online());
    }
}
