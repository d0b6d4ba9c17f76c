//! Assembled cache layer: shared context, background tasks, lifecycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use stash_core::{KeyPrefix, Result};

use crate::availability::{AvailabilityMonitor, AvailabilityState};
use crate::config::CacheSettings;
use crate::id_cache::IdCache;
use crate::metrics::{CacheMetrics, MetricsSnapshot};
use crate::queue::WriteQueue;
use crate::store::{RedisStoreClient, StoreClient};

/// Shared handles injected into every [`IdCache`].
///
/// Constructed once at process start and passed by reference — no global
/// mutable state.
pub(crate) struct CacheContext {
    pub(crate) store: Arc<dyn StoreClient>,
    pub(crate) queue: Arc<WriteQueue>,
    pub(crate) monitor: Arc<AvailabilityMonitor>,
    pub(crate) metrics: Arc<CacheMetrics>,
    pub(crate) read_timeout: Duration,
}

/// The process-wide cache layer.
///
/// Owns the background flush and probe tasks and the shutdown sequence.
/// Entity cache services hold [`IdCache`] handles built via
/// [`CacheLayer::id_cache`]; all of them share this layer's queue,
/// availability monitor, and metrics.
pub struct CacheLayer {
    ctx: Arc<CacheContext>,
    shutdown_token: CancellationToken,
    shutdown_timeout: Duration,
    shut_down: AtomicBool,
}

impl CacheLayer {
    /// Connect to Redis per `settings` and start the background tasks.
    pub async fn connect(settings: CacheSettings) -> Result<Self> {
        let store = RedisStoreClient::connect(&settings.redis).await?;
        Ok(Self::with_store(Arc::new(store), settings))
    }

    /// Assemble the layer around any store client (tests, other backends).
    ///
    /// Must be called from within a Tokio runtime; spawns the probe and
    /// flush tasks.
    pub fn with_store(store: Arc<dyn StoreClient>, settings: CacheSettings) -> Self {
        let metrics = Arc::new(CacheMetrics::new());
        let monitor = Arc::new(AvailabilityMonitor::new(settings.probe.clone()));
        let queue = Arc::new(WriteQueue::new(
            Arc::clone(&store),
            Arc::clone(&monitor),
            Arc::clone(&metrics),
            settings.queue.clone(),
        ));

        let shutdown_token = CancellationToken::new();
        monitor.spawn_probe_loop(Arc::clone(&store), shutdown_token.child_token());
        queue.spawn_flush_loop(shutdown_token.child_token());

        tracing::info!(
            batch_size = settings.queue.batch_size,
            flush_interval_ms = settings.queue.flush_interval_ms,
            max_depth = settings.queue.max_depth,
            probe_interval_ms = settings.probe.interval_ms,
            "cache layer started"
        );

        let ctx = Arc::new(CacheContext {
            store,
            queue,
            monitor,
            metrics,
            read_timeout: settings.read_timeout(),
        });

        Self {
            ctx,
            shutdown_token,
            shutdown_timeout: settings.shutdown_timeout(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Build an entity cache for one kind.
    pub fn id_cache<T>(&self, prefix: KeyPrefix, default_ttl: Duration) -> IdCache<T> {
        IdCache::new(Arc::clone(&self.ctx), prefix, default_ttl)
    }

    /// Merged point-in-time metrics. No side effects.
    pub fn cache_metrics(&self) -> MetricsSnapshot {
        self.ctx.metrics.snapshot()
    }

    /// Whether the store is currently considered reachable. Intended for
    /// host health endpoints.
    pub fn is_store_available(&self) -> bool {
        self.ctx.monitor.is_available()
    }

    /// Current availability state with its last-checked stamp.
    pub fn availability(&self) -> AvailabilityState {
        self.ctx.monitor.state()
    }

    /// Stop the background tasks, drain the queue once, close the store.
    ///
    /// Idempotent: the second and later calls return immediately. The
    /// final drain is bounded by the shutdown timeout; on timeout the
    /// remaining batch is dropped and the connection is closed regardless.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("shutting down cache layer");
        self.shutdown_token.cancel();

        let pending = self.ctx.queue.depth();
        match tokio::time::timeout(self.shutdown_timeout, self.ctx.queue.flush_now()).await {
            Ok(()) => {}
            Err(_) => {
                tracing::warn!(
                    pending,
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    "shutdown flush timed out, dropping pending writes"
                );
            }
        }

        self.ctx.store.close().await;
        tracing::info!("cache layer shut down");
    }
}
