//! In-process store double shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use stash_cache::{
    CacheError, CacheSettings, ProbeConfig, QueueConfig, RedisConfig, StoreClient, StoreOp,
};
use stash_core::Result;

#[derive(Default)]
struct MockState {
    /// key -> (value, expires_at)
    entries: HashMap<String, (Vec<u8>, Instant)>,
    /// Every batch dispatched through `pipeline`, in order.
    pipelines: Vec<Vec<StoreOp>>,
}

/// TTL-aware in-memory store with failure injection.
#[derive(Default)]
pub struct MockStore {
    state: Mutex<MockState>,
    fail_connectivity: AtomicBool,
    hang_pipeline: AtomicBool,
    hang_get: AtomicBool,
    pipeline_calls: AtomicU64,
    ping_calls: AtomicU64,
    closed: AtomicBool,
}

impl MockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every store operation fail with a connectivity error.
    pub fn set_connectivity_failure(&self, failing: bool) {
        self.fail_connectivity.store(failing, Ordering::SeqCst);
    }

    /// Make `pipeline` stall far beyond any test timeout.
    pub fn set_pipeline_hang(&self, hang: bool) {
        self.hang_pipeline.store(hang, Ordering::SeqCst);
    }

    /// Make `get` stall far beyond the read timeout.
    pub fn set_get_hang(&self, hang: bool) {
        self.hang_get.store(hang, Ordering::SeqCst);
    }

    /// Seed raw bytes directly, bypassing the cache layer (e.g. corrupt data).
    pub fn insert_raw(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        self.state
            .lock()
            .entries
            .insert(key.to_string(), (value, Instant::now() + ttl));
    }

    /// Unexpired value for `key`, if any.
    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        let state = self.state.lock();
        state
            .entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Instant::now())
            .map(|(value, _)| value.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    pub fn pipelines(&self) -> Vec<Vec<StoreOp>> {
        self.state.lock().pipelines.clone()
    }

    pub fn pipeline_calls(&self) -> u64 {
        self.pipeline_calls.load(Ordering::SeqCst)
    }

    pub fn ping_calls(&self) -> u64 {
        self.ping_calls.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.fail_connectivity.load(Ordering::SeqCst) {
            Err(CacheError::connectivity("injected connection failure"))
        } else {
            Ok(())
        }
    }

    fn apply(state: &mut MockState, op: &StoreOp) {
        match op {
            StoreOp::Set { key, value, ttl } => {
                state
                    .entries
                    .insert(key.clone(), (value.clone(), Instant::now() + *ttl));
            }
            StoreOp::Delete { key } => {
                state.entries.remove(key);
            }
        }
    }
}

#[async_trait]
impl StoreClient for MockStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        if self.hang_get.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        self.check()?;
        Ok(self.value(key))
    }

    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.check()?;
        self.insert_raw(key, value.to_vec(), ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check()?;
        self.state.lock().entries.remove(key);
        Ok(())
    }

    async fn pipeline(&self, ops: &[StoreOp]) -> Result<()> {
        self.pipeline_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_pipeline.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        self.check()?;
        let mut state = self.state.lock();
        state.pipelines.push(ops.to_vec());
        for op in ops {
            Self::apply(&mut state, op);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.ping_calls.fetch_add(1, Ordering::SeqCst);
        self.check()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Settings tightened for fast test cycles.
pub fn test_settings() -> CacheSettings {
    CacheSettings {
        redis: RedisConfig::default(),
        queue: QueueConfig {
            batch_size: 4,
            flush_interval_ms: 25,
            max_depth: 8,
            max_retries: 1,
            retry_backoff_ms: 10,
        },
        probe: ProbeConfig {
            interval_ms: 25,
            backoff_min_ms: 10,
            backoff_max_ms: 50,
            probe_timeout_ms: 100,
        },
        read_timeout_ms: 200,
        shutdown_timeout_ms: 500,
    }
}
