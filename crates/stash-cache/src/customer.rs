//! Customer cache: the customer-service specialization of [`IdCache`].
//!
//! Owns nothing but its prefix, default TTL, and payload shape — the
//! batching, availability, and metrics behavior all come from the shared
//! layer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use stash_core::KeyPrefix;

use crate::id_cache::{FlushReceipt, IdCache};
use crate::layer::CacheLayer;

const CUSTOMER_PREFIX: &str = "cust";

/// Customer records change rarely; 15 minutes keeps the upstream quiet
/// without serving stale contact data for long.
const CUSTOMER_TTL: Duration = Duration::from_secs(900);

/// Cached shape of a customer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub email: String,
    pub display_name: Option<String>,
}

/// Cache of customer records keyed by customer id.
pub struct CustomerCache {
    inner: IdCache<Customer>,
}

impl CustomerCache {
    pub fn new(layer: &CacheLayer) -> Self {
        let prefix = KeyPrefix::new(CUSTOMER_PREFIX).expect("static prefix is valid");
        Self {
            inner: layer.id_cache(prefix, CUSTOMER_TTL),
        }
    }

    /// Cache a customer record under the default TTL.
    pub fn set(&self, customer: &Customer) {
        self.inner.set(&customer.id, customer);
    }

    /// Cache a customer record with an explicit TTL.
    pub fn set_with_ttl(&self, customer: &Customer, ttl: Duration) {
        self.inner.set_with_ttl(&customer.id, customer, ttl);
    }

    pub async fn get(&self, id: &str) -> Option<Customer> {
        self.inner.get(id).await
    }

    pub fn delete(&self, id: &str) {
        self.inner.delete(id);
    }

    /// Delete with a confirmation handle; see [`IdCache::delete_confirmed`].
    pub fn delete_confirmed(&self, id: &str) -> FlushReceipt {
        self.inner.delete_confirmed(id)
    }
}
