//! Availability tracking for the store client.
//!
//! State is updated from two directions: a periodic liveness probe and
//! reactive feedback from operations that hit the store. A connectivity
//! failure flips the state to unavailable and wakes the probe loop for an
//! early re-probe; while down, probes back off exponentially up to a
//! ceiling. The layer fails open on unavailability — reads miss and writes
//! drop — so callers never see a connectivity error.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::config::ProbeConfig;
use crate::store::StoreClient;

/// Point-in-time availability of the store.
#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityState {
    pub available: bool,
    /// When the state was last confirmed by a probe or a state transition.
    #[serde(with = "time::serde::rfc3339")]
    pub last_checked: OffsetDateTime,
}

/// Tracks whether the store is currently reachable.
///
/// Reads are a lock-free pointer load; safe to call on every operation.
pub struct AvailabilityMonitor {
    state: ArcSwap<AvailabilityState>,
    /// Wakes the probe loop for an early re-probe after a failure.
    probe_wake: Notify,
    config: ProbeConfig,
}

impl AvailabilityMonitor {
    /// Start optimistic: the probe loop confirms within one cycle.
    pub fn new(config: ProbeConfig) -> Self {
        Self {
            state: ArcSwap::from_pointee(AvailabilityState {
                available: true,
                last_checked: OffsetDateTime::now_utc(),
            }),
            probe_wake: Notify::new(),
            config,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state.load().available
    }

    pub fn state(&self) -> AvailabilityState {
        self.state.load().as_ref().clone()
    }

    /// Feedback from an operation that reached the store.
    pub fn record_success(&self) {
        if !self.is_available() {
            self.transition(true);
        }
    }

    /// Feedback from an operation that failed with a connectivity error.
    ///
    /// Flips to unavailable and schedules an early re-probe. A no-op when
    /// already degraded, so a failing probe loop cannot wake itself into a
    /// tight retry cycle.
    pub fn record_failure(&self) {
        if self.is_available() {
            self.transition(false);
            self.probe_wake.notify_one();
        }
    }

    fn transition(&self, available: bool) {
        let was = self.is_available();
        if was != available {
            if available {
                tracing::info!("store reachable, leaving degraded mode");
            } else {
                tracing::warn!("store unreachable, entering degraded mode");
            }
        }
        self.state.store(Arc::new(AvailabilityState {
            available,
            last_checked: OffsetDateTime::now_utc(),
        }));
    }

    /// Spawn the periodic liveness probe. Runs until `shutdown` cancels.
    pub fn spawn_probe_loop(self: &Arc<Self>, store: Arc<dyn StoreClient>, shutdown: CancellationToken) {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let interval = Duration::from_millis(monitor.config.interval_ms);
            let backoff_min = Duration::from_millis(monitor.config.backoff_min_ms);
            let backoff_max = Duration::from_millis(monitor.config.backoff_max_ms);
            let probe_timeout = Duration::from_millis(monitor.config.probe_timeout_ms);
            let mut backoff = backoff_min;

            loop {
                match tokio::time::timeout(probe_timeout, store.ping()).await {
                    Ok(Ok(())) => {
                        monitor.transition(true);
                        backoff = backoff_min;
                    }
                    Ok(Err(e)) if e.is_connectivity() => {
                        tracing::debug!(error = %e, "liveness probe failed");
                        monitor.transition(false);
                    }
                    Ok(Err(e)) => {
                        // A data error still means the store answered.
                        tracing::debug!(error = %e, "liveness probe returned a data error");
                        monitor.transition(true);
                        backoff = backoff_min;
                    }
                    Err(_) => {
                        tracing::debug!(
                            timeout_ms = probe_timeout.as_millis() as u64,
                            "liveness probe timed out"
                        );
                        monitor.transition(false);
                    }
                }

                let delay = if monitor.is_available() {
                    interval
                } else {
                    let current = backoff;
                    backoff = (backoff * 2).min(backoff_max);
                    current
                };

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = monitor.probe_wake.notified() => {}
                    _ = shutdown.cancelled() => break,
                }
            }
            tracing::debug!("probe loop stopped");
        });
    }
}
