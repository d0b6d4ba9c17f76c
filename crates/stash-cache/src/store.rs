//! Store client boundary.
//!
//! The contract the cache layer holds against the remote key-value store,
//! and its Redis implementation over a deadpool connection pool.
//!
//! Error classification is part of the contract: connectivity errors
//! (unreachable, timeout, dropped connection) feed availability
//! degradation; data errors mean the store answered and never do.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Pool, Runtime};
use redis::AsyncCommands;

use stash_core::{CacheError, Result};

use crate::config::RedisConfig;

/// A single operation inside a pipelined batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Set {
        key: String,
        value: Vec<u8>,
        ttl: Duration,
    },
    Delete {
        key: String,
    },
}

impl StoreOp {
    /// Key this operation applies to.
    pub fn key(&self) -> &str {
        match self {
            StoreOp::Set { key, .. } => key,
            StoreOp::Delete { key } => key,
        }
    }
}

/// Asynchronous boundary to the remote key-value store.
///
/// Implementations must classify failures: [`CacheError::Connectivity`]
/// when the store could not be reached, [`CacheError::Data`] otherwise.
#[async_trait]
pub trait StoreClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Issue a batch of operations as a single pipelined round trip.
    async fn pipeline(&self, ops: &[StoreOp]) -> Result<()>;

    /// Liveness probe.
    async fn ping(&self) -> Result<()>;

    /// Release connections. Safe to call more than once.
    async fn close(&self);
}

/// Redis-backed store client.
///
/// Uses a multiplexed connection pool for efficient connection reuse.
#[derive(Debug)]
pub struct RedisStoreClient {
    pool: Pool,
}

impl RedisStoreClient {
    /// Build the pool from configuration and verify it with one PING.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        tracing::info!(url = %config.url, "connecting to Redis");

        let mut pool_config = deadpool_redis::Config::from_url(&config.url);
        if let Some(ref mut pc) = pool_config.pool {
            pc.max_size = config.pool_size;
            let timeout = Some(Duration::from_millis(config.timeout_ms));
            pc.timeouts.wait = timeout;
            pc.timeouts.create = timeout;
            pc.timeouts.recycle = timeout;
        }

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::connectivity(format!("failed to create Redis pool: {e}")))?;

        let client = Self { pool };
        client.ping().await?;
        tracing::info!("connected to Redis");
        Ok(client)
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection> {
        self.pool.get().await.map_err(|e| {
            CacheError::connectivity(format!("failed to get Redis connection: {e}"))
        })
    }
}

/// Map a Redis error onto the cache error taxonomy.
fn classify(context: &str, e: redis::RedisError) -> CacheError {
    if e.is_io_error() || e.is_timeout() || e.is_connection_refusal() || e.is_connection_dropped()
    {
        CacheError::connectivity(format!("{context}: {e}"))
    } else {
        CacheError::data(format!("{context}: {e}"))
    }
}

#[async_trait]
impl StoreClient for RedisStoreClient {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| classify("GET failed", e))
    }

    async fn set_with_expiry(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        // SETEX rejects a zero expiry; sub-second TTLs round up to 1s.
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
            .await
            .map_err(|e| classify("SET failed", e))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| classify("DEL failed", e))
    }

    async fn pipeline(&self, ops: &[StoreOp]) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        for op in ops {
            match op {
                StoreOp::Set { key, value, ttl } => {
                    pipe.set_ex(key, value.as_slice(), ttl.as_secs().max(1)).ignore();
                }
                StoreOp::Delete { key } => {
                    pipe.del(key).ignore();
                }
            }
        }
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| classify("pipeline dispatch failed", e))
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map(|_| ())
            .map_err(|e| classify("PING failed", e))
    }

    async fn close(&self) {
        self.pool.close();
    }
}
