//! Cache key construction.
//!
//! Every cached entity lives under `"{prefix}:{id}"` where the prefix
//! identifies the entity kind (e.g. `cust:123`). A key is unique per
//! (kind, id); prefixes are validated at construction so a kind can never
//! produce keys that collide with another kind's namespace by accident.
//! Deliberate prefix reuse across services addresses the same cache — that
//! is a caller responsibility, not something this layer can detect.

use std::fmt;

use serde::Serialize;

use crate::error::{CacheError, Result};

/// Validated per-entity-kind key prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct KeyPrefix(String);

impl KeyPrefix {
    /// Validate and wrap a prefix.
    ///
    /// Accepts non-empty ASCII alphanumerics plus `_` and `-`. The `:`
    /// separator is reserved so `prefix:id` parses unambiguously.
    pub fn new(prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        if prefix.is_empty() {
            return Err(CacheError::invalid_prefix("empty prefix"));
        }
        if !prefix
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(CacheError::invalid_prefix(format!(
                "{prefix:?} contains characters outside [A-Za-z0-9_-]"
            )));
        }
        Ok(Self(prefix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build the full cache key for an entity id.
    pub fn key_for(&self, id: &str) -> CacheKey {
        CacheKey(format!("{}:{}", self.0, id))
    }
}

impl fmt::Display for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Full key as stored in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
