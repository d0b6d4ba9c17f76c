//! Generic TTL-keyed entity cache.
//!
//! One instance per entity kind, keyed by entity id under a fixed prefix.
//! Reads go straight to the store — batching them would serve stale data,
//! defeating the point — while writes and deletes ride the write queue.
//!
//! The read and write paths fail open: store unavailability, decode
//! failure, and read timeouts all surface as a plain miss.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::oneshot;

use stash_core::{CacheError, KeyPrefix};

use crate::layer::CacheContext;
use crate::store::StoreOp;

/// Stored envelope: the payload plus its write timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// Unix seconds at which the entry was written.
    pub cached_at: i64,
    pub payload: T,
}

/// Confirmation handle returned by [`IdCache::delete_confirmed`].
///
/// The delete is enqueued before this handle is returned, so dropping the
/// handle never cancels the operation.
pub struct FlushReceipt {
    rx: oneshot::Receiver<Result<(), CacheError>>,
}

impl FlushReceipt {
    /// Resolve once the operation has been flushed to the store.
    ///
    /// Errors only after the queue has exhausted its retries, or when the
    /// operation was dropped by overflow, unavailability, or shutdown.
    pub async fn wait(self) -> Result<(), CacheError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(CacheError::connectivity(
                "flush confirmation channel closed before the operation was dispatched",
            )),
        }
    }
}

/// Entity cache keyed by id under a fixed per-kind prefix.
///
/// Two instances with the same prefix address the same cache; there is no
/// isolation beyond the key namespace.
pub struct IdCache<T> {
    prefix: KeyPrefix,
    default_ttl: Duration,
    ctx: Arc<CacheContext>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> IdCache<T> {
    pub(crate) fn new(ctx: Arc<CacheContext>, prefix: KeyPrefix, default_ttl: Duration) -> Self {
        Self {
            prefix,
            default_ttl,
            ctx,
            _payload: PhantomData,
        }
    }

    pub fn prefix(&self) -> &KeyPrefix {
        &self.prefix
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Remove an entity from the cache. Fire-and-forget; deleting an
    /// absent entity is a no-op on the store.
    pub fn delete(&self, id: &str) {
        let key = self.prefix.key_for(id);
        self.ctx.queue.enqueue(StoreOp::Delete {
            key: key.into_string(),
        });
    }

    /// Remove an entity and obtain a handle that resolves once the delete
    /// has actually been flushed, for callers that need confirmation
    /// (e.g. compensating transactions).
    pub fn delete_confirmed(&self, id: &str) -> FlushReceipt {
        let key = self.prefix.key_for(id);
        let (tx, rx) = oneshot::channel();
        self.ctx.queue.enqueue_with_acks(
            StoreOp::Delete {
                key: key.into_string(),
            },
            vec![tx],
        );
        FlushReceipt { rx }
    }
}

impl<T: Serialize> IdCache<T> {
    /// Cache `value` under this kind's default TTL.
    ///
    /// Returns once the write is enqueued, not once it is persisted.
    pub fn set(&self, id: &str, value: &T) {
        self.set_with_ttl(id, value, self.default_ttl);
    }

    /// Cache `value` with an explicit TTL.
    ///
    /// A zero TTL is rejected here: logged and dropped, never an error to
    /// the caller. Encoding failures are handled the same way.
    pub fn set_with_ttl(&self, id: &str, value: &T, ttl: Duration) {
        let key = self.prefix.key_for(id);
        if ttl.is_zero() {
            tracing::warn!(key = %key, "rejecting cache write with zero TTL");
            return;
        }
        let entry = CacheEntry {
            cached_at: OffsetDateTime::now_utc().unix_timestamp(),
            payload: value,
        };
        let value = match rmp_serde::to_vec(&entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to encode value for cache");
                return;
            }
        };
        self.ctx.queue.enqueue(StoreOp::Set {
            key: key.into_string(),
            value,
            ttl,
        });
    }
}

impl<T: DeserializeOwned> IdCache<T> {
    /// Read an entity.
    ///
    /// Returns `None` on a miss, store unavailability, decode failure, or
    /// read timeout — never an error. Reads bypass the write queue.
    pub async fn get(&self, id: &str) -> Option<T> {
        self.get_entry(id).await.map(|entry| entry.payload)
    }

    /// Like [`get`](Self::get), but keeps the envelope with its `cached_at` stamp.
    pub async fn get_entry(&self, id: &str) -> Option<CacheEntry<T>> {
        let kind = self.prefix.as_str();
        if !self.ctx.monitor.is_available() {
            self.ctx.metrics.record_miss(kind);
            return None;
        }

        let key = self.prefix.key_for(id);
        let read = tokio::time::timeout(self.ctx.read_timeout, self.ctx.store.get(key.as_str()));
        let bytes = match read.await {
            Ok(Ok(Some(bytes))) => {
                self.ctx.monitor.record_success();
                bytes
            }
            Ok(Ok(None)) => {
                self.ctx.monitor.record_success();
                self.ctx.metrics.record_miss(kind);
                return None;
            }
            Ok(Err(e)) => {
                if e.is_connectivity() {
                    self.ctx.monitor.record_failure();
                }
                tracing::debug!(key = %key, error = %e, "cache read failed");
                self.ctx.metrics.record_miss(kind);
                return None;
            }
            Err(_) => {
                self.ctx.metrics.record_read_timeout(kind);
                return None;
            }
        };

        match rmp_serde::from_slice::<CacheEntry<T>>(&bytes) {
            Ok(entry) => {
                self.ctx.metrics.record_hit(kind);
                Some(entry)
            }
            Err(e) => {
                // Corrupt or incompatible entry: a miss. The next write
                // overwrites it, so it is not deleted here.
                tracing::warn!(key = %key, error = %e, "failed to decode cached value");
                self.ctx.metrics.record_miss(kind);
                None
            }
        }
    }
}
