//! Cache configuration types.

use crate::error::{CacheError, CacheResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where cache entries live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Process-local map.
    #[default]
    Memory,
    /// Process-local map mirrored into a [`SessionStorage`](crate::SessionStorage) backend.
    Session,
    /// Every write is dropped and every read misses.
    Disabled,
}

impl CacheMode {
    /// Get the mode name as used in stats output.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheMode::Memory => "memory",
            CacheMode::Session => "session",
            CacheMode::Disabled => "disabled",
        }
    }
}

/// Which entry is evicted when the store is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Oldest inserted entry goes first.
    InsertionOrder,
    /// Least recently read (or written) entry goes first.
    #[default]
    LeastRecentlyAccessed,
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backing mode
    pub mode: CacheMode,

    /// Time-to-live applied to entries that don't carry their own
    #[serde(with = "duration_millis")]
    pub ttl: Duration,

    /// Maximum number of live entries
    pub max_size: usize,

    /// Eviction policy once `max_size` is reached
    pub eviction: EvictionPolicy,

    /// Prefix applied to keys written into session storage
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mode: CacheMode::Memory,
            ttl: Duration::from_millis(300_000),
            max_size: 50,
            eviction: EvictionPolicy::LeastRecentlyAccessed,
            key_prefix: "vellum_cache_".to_string(),
        }
    }
}

impl CacheConfig {
    /// In-memory configuration with the given TTL and capacity.
    ///
    /// # Examples
    ///
    /// ```
    /// use vellum_cache::{CacheConfig, CacheMode};
    /// use std::time::Duration;
    ///
    /// let config = CacheConfig::memory(Duration::from_secs(5), 3);
    /// assert_eq!(config.mode, CacheMode::Memory);
    /// assert_eq!(config.max_size, 3);
    /// ```
    pub fn memory(ttl: Duration, max_size: usize) -> Self {
        Self {
            ttl,
            max_size,
            ..Self::default()
        }
    }

    /// A configuration whose store never holds anything.
    pub fn disabled() -> Self {
        Self {
            mode: CacheMode::Disabled,
            ..Self::default()
        }
    }

    /// Set the backing mode.
    pub fn with_mode(mut self, mode: CacheMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the default TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the capacity.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    /// Set the eviction policy.
    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    /// Set the session storage key prefix.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Build the storage key for a cache key.
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    /// Reject configurations the store can't honor.
    pub fn validate(&self) -> CacheResult<()> {
        if self.mode != CacheMode::Disabled && self.max_size == 0 {
            return Err(CacheError::Config(
                "max_size must be at least 1".to_string(),
            ));
        }
        if self.mode == CacheMode::Session && self.key_prefix.is_empty() {
            return Err(CacheError::Config(
                "session mode requires a non-empty key prefix".to_string(),
            ));
        }
        Ok(())
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.mode, CacheMode::Memory);
        assert_eq!(config.ttl, Duration::from_millis(300_000));
        assert_eq!(config.max_size, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_storage_key() {
        let config = CacheConfig::default().with_key_prefix("app_");
        assert_eq!(config.storage_key("route_home"), "app_route_home");
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = CacheConfig::memory(Duration::from_secs(1), 0);
        assert!(matches!(config.validate(), Err(CacheError::Config(_))));
        assert!(CacheConfig::disabled().with_max_size(0).validate().is_ok());
    }

    #[test]
    fn test_deserialize_millis() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"mode":"session","ttl":5000,"max_size":3}"#).unwrap();
        assert_eq!(config.mode, CacheMode::Session);
        assert_eq!(config.ttl, Duration::from_secs(5));
        assert_eq!(config.key_prefix, "vellum_cache_");
    }
}
