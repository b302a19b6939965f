//! Session-scoped backing storage.
//!
//! A [`SessionStorage`] is a flat string key/value store, the shape browser
//! session storage exposes. The cache store mirrors persistable entries into
//! it as JSON envelopes and hydrates from it on construction.

use crate::error::CacheResult;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Flat string key/value storage.
pub trait SessionStorage: Send + Sync {
    /// Read a raw item.
    fn get_item(&self, key: &str) -> Option<String>;

    /// Write a raw item.
    fn set_item(&self, key: &str, value: &str) -> CacheResult<()>;

    /// Remove an item. Removing a missing key is not an error.
    fn remove_item(&self, key: &str);

    /// All stored keys.
    fn keys(&self) -> Vec<String>;
}

/// In-process [`SessionStorage`].
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    items: RwLock<BTreeMap<String, String>>,
}

impl MemorySessionStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    /// Check if the storage is empty.
    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.read().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> CacheResult<()> {
        self.items.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) {
        self.items.write().remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.items.read().keys().cloned().collect()
    }
}

/// On-storage representation of a cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PersistedEntry {
    pub value: serde_json::Value,
    pub created_at: i64,
    pub ttl: u64,
}
