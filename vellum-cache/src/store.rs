//! Bounded, expiring key-value store.

use crate::clock::{Clock, SystemClock};
use crate::config::{CacheConfig, CacheMode, EvictionPolicy};
use crate::error::{CacheError, CacheResult};
use crate::storage::{MemorySessionStorage, PersistedEntry, SessionStorage};
use crate::value::CacheValue;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A stored value plus its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Stored value
    pub value: V,
    /// Insertion time in epoch milliseconds
    pub created_at: i64,
    /// Last read or write in epoch milliseconds
    pub last_accessed_at: i64,
    /// Lifetime measured from `created_at`
    pub ttl: Duration,
    inserted: u64,
    accessed: u64,
}

impl<V> CacheEntry<V> {
    /// An entry is expired once strictly more than `ttl` has elapsed.
    pub fn is_expired(&self, now: i64) -> bool {
        now - self.created_at > self.ttl.as_millis() as i64
    }
}

/// Snapshot of store statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, or 0 with no recorded reads.
    pub hit_rate: f64,
    pub mode: CacheMode,
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    tick: u64,
}

impl<V> Inner<V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

/// Keyed store with TTL expiry and size-bounded eviction.
///
/// All operations are synchronous and take a short internal lock, so a store
/// can be shared behind an `Arc` by every loader in the router.
///
/// # Examples
///
/// ```
/// use vellum_cache::{CacheConfig, CacheStore};
/// use std::time::Duration;
///
/// let config = CacheConfig::memory(Duration::from_secs(60), 2);
/// let cache: CacheStore<String> = CacheStore::new(config);
/// cache.set("a", "1".to_string());
/// cache.set("b", "2".to_string());
/// cache.set("c", "3".to_string());
///
/// assert_eq!(cache.len(), 2);
/// assert_eq!(cache.get("a"), None);
/// assert_eq!(cache.get("c").as_deref(), Some("3"));
/// ```
pub struct CacheStore<V: CacheValue> {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    storage: Option<Arc<dyn SessionStorage>>,
    inner: Mutex<Inner<V>>,
}

impl<V: CacheValue> CacheStore<V> {
    /// Create a store. Session mode without an explicit backend gets a
    /// private [`MemorySessionStorage`].
    pub fn new(mut config: CacheConfig) -> Self {
        config.max_size = config.max_size.max(1);
        let storage: Option<Arc<dyn SessionStorage>> = match config.mode {
            CacheMode::Session => Some(Arc::new(MemorySessionStorage::new())),
            _ => None,
        };
        Self {
            config,
            clock: Arc::new(SystemClock),
            storage,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
                tick: 0,
            }),
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach a session backend and hydrate from it.
    ///
    /// Ignored unless the store is in session mode. Entries that fail to
    /// decode or have already expired are removed from the backend.
    pub fn with_storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        if self.config.mode == CacheMode::Session {
            self.storage = Some(storage);
            self.hydrate();
        }
        self
    }

    /// Store configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Store a value with the configured TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.set_with_ttl(key, value, self.config.ttl);
    }

    /// Store a value with an explicit TTL.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        if self.config.mode == CacheMode::Disabled {
            return;
        }
        let key = key.into();
        let now = self.clock.now_millis();
        let persisted = value.persist();

        let mut inner = self.inner.lock();
        self.insert_locked(&mut inner, key.clone(), value, now, ttl);
        drop(inner);

        if let (Some(storage), Some(json)) = (&self.storage, persisted) {
            let envelope = PersistedEntry {
                value: json,
                created_at: now,
                ttl: ttl.as_millis() as u64,
            };
            let written = serde_json::to_string(&envelope)
                .map_err(CacheError::from)
                .and_then(|raw| storage.set_item(&self.config.storage_key(&key), &raw));
            if let Err(err) = written {
                warn!(key = %key, error = %err, "Failed to persist cache entry");
            }
        }
    }

    /// Read a live value, recording a hit or miss.
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        if self.config.mode == CacheMode::Disabled {
            return None;
        }
        let now = self.clock.now_millis();
        let mut inner = self.inner.lock();
        let expired = match inner.entries.get(key) {
            None => {
                inner.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            inner.entries.remove(key);
            inner.misses += 1;
            drop(inner);
            debug!(key = %key, "Cache entry expired");
            self.remove_persisted(key);
            return None;
        }

        let tick = inner.next_tick();
        inner.hits += 1;
        let entry = inner.entries.get_mut(key)?;
        entry.last_accessed_at = now;
        entry.accessed = tick;
        Some(entry.value.clone())
    }

    /// Check for a live entry without touching statistics or access order.
    pub fn has(&self, key: &str) -> bool {
        if self.config.mode == CacheMode::Disabled {
            return false;
        }
        let now = self.clock.now_millis();
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Remove one entry.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.inner.lock().entries.remove(key).is_some();
        self.remove_persisted(key);
        removed
    }

    /// Remove every entry whose key starts with `prefix`.
    pub fn delete_by_pattern(&self, prefix: &str) -> usize {
        let doomed = self.keys_by_pattern(prefix);
        let mut inner = self.inner.lock();
        for key in &doomed {
            inner.entries.remove(key);
        }
        drop(inner);
        for key in &doomed {
            self.remove_persisted(key);
        }
        doomed.len()
    }

    /// Remove everything, returning the number of entries dropped.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut inner = self.inner.lock();
            let count = inner.entries.len();
            inner.entries.clear();
            count
        };
        if let Some(storage) = &self.storage {
            for storage_key in storage.keys() {
                if storage_key.starts_with(&self.config.key_prefix) {
                    storage.remove_item(&storage_key);
                }
            }
        }
        removed
    }

    /// Drop every expired entry.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let expired: Vec<String> = {
            let mut inner = self.inner.lock();
            let keys: Vec<String> = inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.is_expired(now))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &keys {
                inner.entries.remove(key);
            }
            keys
        };
        for key in &expired {
            self.remove_persisted(key);
        }
        expired.len()
    }

    /// Keys currently held, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.inner.lock().entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Keys starting with `prefix`, sorted.
    pub fn keys_by_pattern(&self, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .lock()
            .entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Number of held entries, expired ones included until they are touched.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Check if the store holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Fraction of reads that were hits.
    pub fn hit_rate(&self) -> f64 {
        let inner = self.inner.lock();
        hit_rate(inner.hits, inner.misses)
    }

    /// Statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            size: inner.entries.len(),
            max_size: self.config.max_size,
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: hit_rate(inner.hits, inner.misses),
            mode: self.config.mode,
        }
    }

    fn insert_locked(
        &self,
        inner: &mut Inner<V>,
        key: String,
        value: V,
        created_at: i64,
        ttl: Duration,
    ) {
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.config.max_size {
            if let Some(victim) = self.pick_victim(inner) {
                inner.entries.remove(&victim);
                debug!(key = %victim, "Evicted cache entry");
                self.remove_persisted(&victim);
            }
        }
        let tick = inner.next_tick();
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                created_at,
                last_accessed_at: created_at,
                ttl,
                inserted: tick,
                accessed: tick,
            },
        );
    }

    fn pick_victim(&self, inner: &Inner<V>) -> Option<String> {
        let now = self.clock.now_millis();
        if let Some((key, _)) = inner.entries.iter().find(|(_, entry)| entry.is_expired(now)) {
            return Some(key.clone());
        }
        let order = |entry: &CacheEntry<V>| match self.config.eviction {
            EvictionPolicy::InsertionOrder => entry.inserted,
            EvictionPolicy::LeastRecentlyAccessed => entry.accessed,
        };
        inner
            .entries
            .iter()
            .min_by_key(|(_, entry)| order(*entry))
            .map(|(key, _)| key.clone())
    }

    fn remove_persisted(&self, key: &str) {
        if let Some(storage) = &self.storage {
            storage.remove_item(&self.config.storage_key(key));
        }
    }

    fn hydrate(&self) {
        let Some(storage) = &self.storage else {
            return;
        };
        let now = self.clock.now_millis();
        let mut restored = Vec::new();

        for storage_key in storage.keys() {
            let Some(key) = storage_key.strip_prefix(&self.config.key_prefix) else {
                continue;
            };
            let Some(raw) = storage.get_item(&storage_key) else {
                continue;
            };
            match decode::<V>(&raw) {
                Ok((entry, ttl)) if now - entry.created_at <= ttl.as_millis() as i64 => {
                    restored.push((key.to_string(), entry, ttl));
                }
                Ok(_) => {
                    debug!(key = %key, "Dropping expired persisted cache entry");
                    storage.remove_item(&storage_key);
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "Purging malformed persisted cache entry");
                    storage.remove_item(&storage_key);
                }
            }
        }

        restored.sort_by_key(|(_, entry, _)| entry.created_at);
        let mut inner = self.inner.lock();
        for (key, entry, ttl) in restored {
            self.insert_locked(&mut inner, key, entry.value, entry.created_at, ttl);
        }
    }
}

struct Decoded<V> {
    value: V,
    created_at: i64,
}

fn decode<V: CacheValue>(raw: &str) -> CacheResult<(Decoded<V>, Duration)> {
    let envelope: PersistedEntry = serde_json::from_str(raw)?;
    let value = V::restore(envelope.value).ok_or_else(|| {
        CacheError::Deserialization("persisted value has the wrong shape".to_string())
    })?;
    Ok((
        Decoded {
            value,
            created_at: envelope.created_at,
        },
        Duration::from_millis(envelope.ttl),
    ))
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn store(max_size: usize, eviction: EvictionPolicy) -> (CacheStore<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000));
        let config =
            CacheConfig::memory(Duration::from_millis(5_000), max_size).with_eviction(eviction);
        (CacheStore::new(config).with_clock(clock.clone()), clock)
    }

    #[test]
    fn test_get_missing_returns_none() {
        let (cache, _) = store(3, EvictionPolicy::LeastRecentlyAccessed);
        assert_eq!(cache.get("nope"), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_ttl_expiry_removes_entry() {
        let (cache, clock) = store(3, EvictionPolicy::LeastRecentlyAccessed);
        cache.set("k", "v".to_string());

        clock.advance(Duration::from_millis(5_000));
        assert_eq!(cache.get("k").as_deref(), Some("v"));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_insertion_order_eviction() {
        let (cache, _) = store(3, EvictionPolicy::InsertionOrder);
        cache.set("key1", "1".to_string());
        cache.set("key2", "2".to_string());
        cache.set("key3", "3".to_string());
        cache.get("key1");
        cache.set("key4", "4".to_string());

        assert_eq!(cache.len(), 3);
        assert!(!cache.has("key1"));
        assert!(cache.has("key4"));
    }

    #[test]
    fn test_lru_eviction_respects_reads() {
        let (cache, _) = store(3, EvictionPolicy::LeastRecentlyAccessed);
        cache.set("key1", "1".to_string());
        cache.set("key2", "2".to_string());
        cache.set("key3", "3".to_string());
        cache.get("key1");
        cache.set("key4", "4".to_string());

        assert_eq!(cache.len(), 3);
        assert!(cache.has("key1"));
        assert!(!cache.has("key2"));
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let (cache, _) = store(2, EvictionPolicy::InsertionOrder);
        cache.set("a", "1".to_string());
        cache.set("b", "2".to_string());
        cache.set("a", "3".to_string());

        assert_eq!(cache.keys(), vec!["a", "b"]);
        assert_eq!(cache.get("a").as_deref(), Some("3"));
    }

    #[test]
    fn test_expired_entry_is_evicted_first() {
        let (cache, clock) = store(2, EvictionPolicy::InsertionOrder);
        cache.set("a", "1".to_string());
        cache.set_with_ttl("short", "2".to_string(), Duration::from_millis(10));
        clock.advance(Duration::from_millis(20));
        cache.set("c", "3".to_string());

        assert!(cache.has("a"));
        assert!(!cache.has("short"));
    }

    #[test]
    fn test_has_leaves_stats_alone() {
        let (cache, _) = store(3, EvictionPolicy::LeastRecentlyAccessed);
        cache.set("a", "1".to_string());
        assert!(cache.has("a"));
        assert!(!cache.has("b"));
        let stats = cache.stats();
        assert_eq!((stats.hits, stats.misses), (0, 0));
        assert_eq!(stats.hit_rate, 0.0);
    }

    #[test]
    fn test_hit_rate() {
        let (cache, _) = store(3, EvictionPolicy::LeastRecentlyAccessed);
        cache.set("a", "1".to_string());
        cache.get("a");
        cache.get("a");
        cache.get("missing");

        let stats = cache.stats();
        assert!((stats.hit_rate - 0.666).abs() < 0.01);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.max_size, 3);
        assert_eq!(stats.mode, CacheMode::Memory);
    }

    #[test]
    fn test_delete_by_pattern_and_clear() {
        let (cache, _) = store(10, EvictionPolicy::LeastRecentlyAccessed);
        cache.set("user_1", "a".to_string());
        cache.set("user_2", "b".to_string());
        cache.set("post_1", "c".to_string());

        assert_eq!(cache.keys_by_pattern("user_"), vec!["user_1", "user_2"]);
        assert_eq!(cache.delete_by_pattern("user_"), 2);
        assert!(cache.delete("post_1"));
        assert!(!cache.delete("post_1"));

        cache.set("x", "1".to_string());
        cache.set("y", "2".to_string());
        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_mode() {
        let cache: CacheStore<String> = CacheStore::new(CacheConfig::disabled());
        cache.set("a", "1".to_string());
        assert!(!cache.has("a"));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_cleanup_expired() {
        let (cache, clock) = store(10, EvictionPolicy::LeastRecentlyAccessed);
        cache.set("a", "1".to_string());
        cache.set_with_ttl("b", "2".to_string(), Duration::from_millis(1));
        clock.advance(Duration::from_millis(2));
        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.keys(), vec!["a"]);
    }
}
