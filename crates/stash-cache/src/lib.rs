//! Write-batching entity cache layer in front of Redis.
//!
//! Serves recently-fetched entities from cache while batching writes to
//! the store to amortize round-trip cost.
//!
//! ## Data Flow
//!
//! ```text
//! service ──set/delete──▶ WriteQueue ──batched pipeline──▶ Redis
//!    │                                                       ▲
//!    └────────get (direct read, per-call timeout)────────────┘
//! ```
//!
//! Reads bypass the queue — batching them would serve stale data. Writes
//! and deletes accumulate and flush on a size threshold or interval,
//! whichever comes first, with per-key last-writer-wins deduplication.
//!
//! ## Graceful Degradation
//!
//! An [`AvailabilityMonitor`] probes the store and reacts to connectivity
//! errors. While the store is down the layer fails open: reads report a
//! miss, writes are dropped and counted — callers never see an error on
//! the read/write paths.
//!
//! ## Usage
//!
//! ```ignore
//! let layer = CacheLayer::connect(CacheSettings::default()).await?;
//! let customers = CustomerCache::new(&layer);
//!
//! customers.set(&customer);                 // enqueued, flushed in batch
//! let hit = customers.get("cust_1").await;  // direct read, miss on outage
//!
//! layer.shutdown().await;                   // final drain, idempotent
//! ```

pub mod availability;
pub mod config;
pub mod customer;
pub mod id_cache;
pub mod layer;
pub mod metrics;
pub mod queue;
pub mod store;

pub use availability::{AvailabilityMonitor, AvailabilityState};
pub use config::{CacheSettings, ProbeConfig, QueueConfig, RedisConfig};
pub use customer::{Customer, CustomerCache};
pub use id_cache::{CacheEntry, FlushReceipt, IdCache};
pub use layer::CacheLayer;
pub use metrics::{CacheMetrics, KindSnapshot, MetricsSnapshot, QueueMetricsSnapshot};
pub use queue::WriteQueue;
pub use store::{RedisStoreClient, StoreClient, StoreOp};

pub use stash_core::{CacheError, CacheKey, ErrorCategory, KeyPrefix};
