//! Cache metrics.
//!
//! Process-local atomic counters backing the merged snapshot accessor,
//! plus `metrics` crate emission under the `names` constants so a host
//! exporter can scrape without polling the snapshot.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

/// Metric names as constants for consistency.
pub mod names {
    // Read-path metrics
    pub const CACHE_HITS_TOTAL: &str = "stash_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "stash_cache_misses_total";
    pub const CACHE_READ_TIMEOUTS_TOTAL: &str = "stash_cache_read_timeouts_total";

    // Write queue metrics
    pub const QUEUE_ENQUEUED_TOTAL: &str = "stash_queue_enqueued_total";
    pub const QUEUE_FLUSHED_TOTAL: &str = "stash_queue_flushed_total";
    pub const QUEUE_FAILED_TOTAL: &str = "stash_queue_failed_total";
    pub const QUEUE_DROPPED_TOTAL: &str = "stash_queue_dropped_total";
    pub const QUEUE_DEPTH: &str = "stash_queue_depth";
    pub const QUEUE_FLUSH_DURATION_SECONDS: &str = "stash_queue_flush_duration_seconds";
}

#[derive(Debug, Default)]
struct KindCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    read_timeouts: AtomicU64,
}

/// Process-wide cache metrics.
///
/// Cheap to record from any task. Mutated by the write queue and the read
/// path only; everyone else reads via [`CacheMetrics::snapshot`].
#[derive(Debug, Default)]
pub struct CacheMetrics {
    enqueued: AtomicU64,
    flushed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    depth: AtomicU64,
    flush_batches: AtomicU64,
    failed_flushes: AtomicU64,
    last_flush_us: AtomicU64,
    kinds: DashMap<String, KindCounters>,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_hit(&self, kind: &str) {
        self.kinds
            .entry(kind.to_string())
            .or_default()
            .hits
            .fetch_add(1, Ordering::Relaxed);
        metrics::counter!(names::CACHE_HITS_TOTAL, "kind" => kind.to_string()).increment(1);
    }

    pub(crate) fn record_miss(&self, kind: &str) {
        self.kinds
            .entry(kind.to_string())
            .or_default()
            .misses
            .fetch_add(1, Ordering::Relaxed);
        metrics::counter!(names::CACHE_MISSES_TOTAL, "kind" => kind.to_string()).increment(1);
    }

    /// A timed-out read is also a miss, but tracked apart from hard failures.
    pub(crate) fn record_read_timeout(&self, kind: &str) {
        let counters = self.kinds.entry(kind.to_string()).or_default();
        counters.read_timeouts.fetch_add(1, Ordering::Relaxed);
        counters.misses.fetch_add(1, Ordering::Relaxed);
        drop(counters);
        metrics::counter!(names::CACHE_READ_TIMEOUTS_TOTAL, "kind" => kind.to_string())
            .increment(1);
        metrics::counter!(names::CACHE_MISSES_TOTAL, "kind" => kind.to_string()).increment(1);
    }

    pub(crate) fn record_enqueued(&self, depth: usize) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
        self.set_depth(depth);
        metrics::counter!(names::QUEUE_ENQUEUED_TOTAL).increment(1);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(names::QUEUE_DROPPED_TOTAL).increment(1);
    }

    pub(crate) fn record_flush(&self, ops: usize, latency: Duration, depth: usize) {
        self.flushed.fetch_add(ops as u64, Ordering::Relaxed);
        self.flush_batches.fetch_add(1, Ordering::Relaxed);
        self.last_flush_us
            .store(latency.as_micros() as u64, Ordering::Relaxed);
        self.set_depth(depth);
        metrics::counter!(names::QUEUE_FLUSHED_TOTAL).increment(ops as u64);
        metrics::histogram!(names::QUEUE_FLUSH_DURATION_SECONDS).record(latency.as_secs_f64());
    }

    pub(crate) fn record_flush_failure(&self, ops: usize) {
        self.failed.fetch_add(ops as u64, Ordering::Relaxed);
        self.failed_flushes.fetch_add(1, Ordering::Relaxed);
        metrics::counter!(names::QUEUE_FAILED_TOTAL).increment(ops as u64);
    }

    pub(crate) fn set_depth(&self, depth: usize) {
        self.depth.store(depth as u64, Ordering::Relaxed);
        metrics::gauge!(names::QUEUE_DEPTH).set(depth as f64);
    }

    /// Merge the queue counters and per-kind counters into one immutable
    /// snapshot. No side effects.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let kinds = self
            .kinds
            .iter()
            .map(|entry| {
                (
                    entry.key().clone(),
                    KindSnapshot {
                        hits: entry.hits.load(Ordering::Relaxed),
                        misses: entry.misses.load(Ordering::Relaxed),
                        read_timeouts: entry.read_timeouts.load(Ordering::Relaxed),
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();

        MetricsSnapshot {
            queue: QueueMetricsSnapshot {
                enqueued: self.enqueued.load(Ordering::Relaxed),
                flushed: self.flushed.load(Ordering::Relaxed),
                failed: self.failed.load(Ordering::Relaxed),
                dropped: self.dropped.load(Ordering::Relaxed),
                depth: self.depth.load(Ordering::Relaxed),
                flush_batches: self.flush_batches.load(Ordering::Relaxed),
                failed_flushes: self.failed_flushes.load(Ordering::Relaxed),
                last_flush_us: self.last_flush_us.load(Ordering::Relaxed),
            },
            kinds,
        }
    }
}

/// Write queue counters at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueMetricsSnapshot {
    pub enqueued: u64,
    pub flushed: u64,
    /// Operations in batches dropped after exhausting retries.
    pub failed: u64,
    /// Operations dropped by backpressure or store unavailability.
    pub dropped: u64,
    pub depth: u64,
    pub flush_batches: u64,
    pub failed_flushes: u64,
    pub last_flush_us: u64,
}

/// Per-kind read counters at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KindSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub read_timeouts: u64,
}

/// Merged view of queue and per-kind counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queue: QueueMetricsSnapshot,
    pub kinds: BTreeMap<String, KindSnapshot>,
}
