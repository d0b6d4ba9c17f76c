//! Write queue manager.
//!
//! Accumulates pending cache writes and deletes, and flushes them to the
//! store as pipelined batches. A flush triggers when the queue depth
//! reaches `batch_size` or `flush_interval_ms` elapses since the last
//! flush, whichever comes first.
//!
//! ## Ordering
//!
//! Operations on the same key keep enqueue order. Within one batch only
//! the last operation per key is dispatched (last-writer-wins), so a
//! delete enqueued after a set for the same key wins.
//!
//! ## Failure policy
//!
//! A failed dispatch is retried a bounded number of times with exponential
//! backoff, then the batch is dropped and counted. Enqueueing never blocks
//! and callers are never blocked on a flush.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::{Notify, oneshot};
use tokio_util::sync::CancellationToken;

use stash_core::CacheError;

use crate::availability::AvailabilityMonitor;
use crate::config::QueueConfig;
use crate::metrics::CacheMetrics;
use crate::store::{StoreClient, StoreOp};

/// Channel half resolving a caller-held flush confirmation.
pub(crate) type AckSender = oneshot::Sender<Result<(), CacheError>>;

/// A queued operation with its enqueue instant and any confirmation
/// channels waiting on it.
struct PendingOp {
    op: StoreOp,
    enqueued_at: Instant,
    acks: Vec<AckSender>,
}

/// Process-wide write queue shared by all entity caches.
pub struct WriteQueue {
    pending: Mutex<VecDeque<PendingOp>>,
    /// Wakes the flush task when depth reaches the batch size.
    flush_wake: Notify,
    store: Arc<dyn StoreClient>,
    monitor: Arc<AvailabilityMonitor>,
    metrics: Arc<CacheMetrics>,
    config: QueueConfig,
}

impl WriteQueue {
    pub fn new(
        store: Arc<dyn StoreClient>,
        monitor: Arc<AvailabilityMonitor>,
        metrics: Arc<CacheMetrics>,
        config: QueueConfig,
    ) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            flush_wake: Notify::new(),
            store,
            monitor,
            metrics,
            config,
        }
    }

    /// Append an operation. Synchronous, non-blocking, O(1).
    pub fn enqueue(&self, op: StoreOp) {
        self.enqueue_with_acks(op, Vec::new());
    }

    /// Append an operation carrying confirmation channels, resolved once
    /// the operation reaches the store or is dropped.
    pub(crate) fn enqueue_with_acks(&self, op: StoreOp, mut acks: Vec<AckSender>) {
        if !self.monitor.is_available() {
            // Fail open: bounded staleness beats an unbounded queue.
            tracing::debug!(key = op.key(), "store unavailable, dropping write");
            self.metrics.record_dropped();
            resolve(
                acks,
                Err(CacheError::connectivity("store unavailable, write dropped")),
            );
            return;
        }

        let depth = {
            let mut pending = self.pending.lock();
            if pending.len() >= self.config.max_depth {
                // Coalesce onto the oldest pending op for this key when one
                // exists; otherwise the incoming op is the one dropped.
                let same_key = pending.iter().position(|p| p.op.key() == op.key());
                match same_key.and_then(|pos| pending.remove(pos)) {
                    Some(superseded) => {
                        tracing::debug!(key = op.key(), "queue full, coalescing onto newest write");
                        let mut merged = superseded.acks;
                        merged.append(&mut acks);
                        acks = merged;
                        self.metrics.record_dropped();
                    }
                    None => {
                        drop(pending);
                        tracing::debug!(key = op.key(), "queue full, dropping write");
                        self.metrics.record_dropped();
                        resolve(acks, Err(CacheError::QueueOverflow));
                        return;
                    }
                }
            }
            pending.push_back(PendingOp {
                op,
                enqueued_at: Instant::now(),
                acks,
            });
            pending.len()
        };

        self.metrics.record_enqueued(depth);
        if depth >= self.config.batch_size {
            self.flush_wake.notify_one();
        }
    }

    /// Current queue depth.
    pub fn depth(&self) -> usize {
        self.pending.lock().len()
    }

    /// Spawn the background flush task. Runs until `shutdown` cancels;
    /// the final drain on shutdown is the layer's job.
    pub fn spawn_flush_loop(self: &Arc<Self>, shutdown: CancellationToken) {
        let queue = Arc::clone(self);
        let interval = queue.config.flush_interval();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = queue.flush_wake.notified() => {}
                    _ = shutdown.cancelled() => break,
                }
                queue.flush_now().await;
            }
            tracing::debug!("flush loop stopped");
        });
    }

    /// Drain everything currently queued and dispatch it as one batch.
    ///
    /// The buffer is swapped atomically under the lock, so an operation
    /// enqueued while the dispatch is in flight is never lost — it lands in
    /// the next batch.
    pub async fn flush_now(&self) {
        let drained: VecDeque<PendingOp> = {
            let mut pending = self.pending.lock();
            std::mem::take(&mut *pending)
        };
        if drained.is_empty() {
            return;
        }

        let batch = dedupe_last_writer_wins(drained);
        self.dispatch(batch).await;
    }

    async fn dispatch(&self, batch: Vec<PendingOp>) {
        let ops: Vec<StoreOp> = batch.iter().map(|p| p.op.clone()).collect();
        let oldest_ms = batch
            .iter()
            .map(|p| p.enqueued_at.elapsed().as_millis() as u64)
            .max()
            .unwrap_or(0);

        let started = Instant::now();
        let mut backoff = self.config.retry_backoff();
        let mut attempt = 0u32;
        loop {
            match self.store.pipeline(&ops).await {
                Ok(()) => {
                    self.monitor.record_success();
                    let latency = started.elapsed();
                    self.metrics.record_flush(ops.len(), latency, self.depth());
                    tracing::debug!(
                        ops = ops.len(),
                        queued_ms = oldest_ms,
                        elapsed_ms = latency.as_millis() as u64,
                        "flushed batch"
                    );
                    for p in batch {
                        resolve(p.acks, Ok(()));
                    }
                    return;
                }
                Err(e) => {
                    if e.is_connectivity() {
                        self.monitor.record_failure();
                    }
                    if attempt >= self.config.max_retries {
                        self.metrics.record_flush_failure(ops.len());
                        tracing::warn!(
                            ops = ops.len(),
                            attempts = attempt + 1,
                            error = %e,
                            "dropping batch after exhausted retries"
                        );
                        for p in batch {
                            resolve(p.acks, Err(e.clone()));
                        }
                        return;
                    }
                    attempt += 1;
                    tracing::debug!(attempt, error = %e, "batch dispatch failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }
}

/// Keep only the last operation per key, preserving the enqueue order of
/// the survivors. Confirmation channels of superseded operations migrate
/// to the survivor and resolve with its outcome.
fn dedupe_last_writer_wins(drained: VecDeque<PendingOp>) -> Vec<PendingOp> {
    let mut slots: Vec<Option<PendingOp>> = Vec::with_capacity(drained.len());
    let mut last_for_key: HashMap<String, usize> = HashMap::new();
    for mut op in drained {
        if let Some(prev) = last_for_key.insert(op.op.key().to_string(), slots.len()) {
            let superseded = slots[prev].take().expect("each slot is taken at most once");
            let mut acks = superseded.acks;
            acks.append(&mut op.acks);
            op.acks = acks;
        }
        slots.push(Some(op));
    }
    slots.into_iter().flatten().collect()
}

fn resolve(acks: Vec<AckSender>, result: Result<(), CacheError>) {
    for ack in acks {
        // The receiver may have been discarded; that is fine.
        let _ = ack.send(result.clone());
    }
}
