//! Read cache and invalidation port
//!
//! Mutating engines signal the cache through the `CacheInvalidation` trait
//! rather than touching shared state directly. Invalidation is deliberately
//! coarse-grained: these entities are read-heavy and low-write, so every
//! successful mutation clears the whole cache.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Port the engines call after every successful mutation.
pub trait CacheInvalidation: Send + Sync {
    fn invalidate_all(&self);
}

/// Invalidator for contexts without a cache.
pub struct NoopCache;

impl CacheInvalidation for NoopCache {
    fn invalidate_all(&self) {}
}

/// Process-local read-through cache for list-style queries. Values are
/// stored as JSON so one cache serves heterogeneous result types.
pub struct ReadCache {
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl ReadCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entries = self.entries.lock().unwrap();
        entries
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) {
        if let Ok(serialized) = serde_json::to_value(value) {
            let mut entries = self.entries.lock().unwrap();
            entries.insert(key.to_string(), serialized);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl Default for ReadCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheInvalidation for ReadCache {
    fn invalidate_all(&self) {
        self.entries.lock().unwrap().clear();
    }
}
