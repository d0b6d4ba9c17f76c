//! Configuration for the cache layer.
//!
//! Every struct deserializes with serde and defaults per field, so a host
//! can embed the whole tree in its own configuration file and override only
//! what it tunes. Batch size, flush interval, and queue capacity are policy
//! decisions, not correctness ones; the defaults favor modest deployments.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// Write queue tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue depth that triggers a flush before the interval elapses
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Flush interval in milliseconds (time since the last flush)
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Maximum queue depth; beyond it writes coalesce or drop, never block
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Dispatch retries before a batch is dropped
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial retry backoff in milliseconds, doubled per attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_batch_size() -> usize {
    64
}

fn default_flush_interval_ms() -> u64 {
    250
}

fn default_max_depth() -> usize {
    4096
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    50
}

impl QueueConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            flush_interval_ms: default_flush_interval_ms(),
            max_depth: default_max_depth(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Liveness probe tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Probe interval while the store is reachable, in milliseconds
    #[serde(default = "default_probe_interval_ms")]
    pub interval_ms: u64,

    /// First re-probe delay after the store goes away, in milliseconds
    #[serde(default = "default_probe_backoff_min_ms")]
    pub backoff_min_ms: u64,

    /// Re-probe backoff ceiling, in milliseconds
    #[serde(default = "default_probe_backoff_max_ms")]
    pub backoff_max_ms: u64,

    /// Per-probe timeout in milliseconds; a timed-out probe counts as down
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

fn default_probe_interval_ms() -> u64 {
    5000
}

fn default_probe_backoff_min_ms() -> u64 {
    500
}

fn default_probe_backoff_max_ms() -> u64 {
    30000
}

fn default_probe_timeout_ms() -> u64 {
    1000
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_probe_interval_ms(),
            backoff_min_ms: default_probe_backoff_min_ms(),
            backoff_max_ms: default_probe_backoff_max_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

/// Top-level settings for the cache layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub redis: RedisConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    /// Per-call read timeout in milliseconds; a timed-out read is a miss
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Upper bound on the final drain during shutdown, in milliseconds
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
}

fn default_read_timeout_ms() -> u64 {
    250
}

fn default_shutdown_timeout_ms() -> u64 {
    2000
}

impl CacheSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            queue: QueueConfig::default(),
            probe: ProbeConfig::default(),
            read_timeout_ms: default_read_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
        }
    }
}
