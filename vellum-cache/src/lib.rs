//! Cache store for Vellum.
//!
//! A synchronous, size-bounded key-value store with TTL expiry, used by the
//! router for templates, scripts, layouts, component definitions, message
//! bundles and fully rendered routes.
//!
//! # Features
//!
//! - **TTL expiry** - entries older than their TTL read as absent and are removed
//! - **Bounded size** - insertion-order or least-recently-accessed eviction
//! - **Pluggable backing** - memory, session storage mirror, or disabled
//! - **Statistics** - hit rate, size, capacity and mode
//!
//! # Examples
//!
//! ```
//! use vellum_cache::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let storage = Arc::new(MemorySessionStorage::new());
//! let config = CacheConfig::memory(Duration::from_secs(300), 50).with_mode(CacheMode::Session);
//!
//! let cache: CacheStore<String> = CacheStore::new(config.clone()).with_storage(storage.clone());
//! cache.set("template_home", "<h1>Home</h1>".to_string());
//!
//! // A fresh store over the same storage sees the persisted entry.
//! let reopened: CacheStore<String> = CacheStore::new(config).with_storage(storage);
//! assert_eq!(reopened.get("template_home").as_deref(), Some("<h1>Home</h1>"));
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod storage;
pub mod store;
pub mod value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, CacheMode, EvictionPolicy};
pub use error::{CacheError, CacheResult};
pub use storage::{MemorySessionStorage, SessionStorage};
pub use store::{CacheEntry, CacheStats, CacheStore};
pub use value::CacheValue;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{CacheConfig, CacheMode, EvictionPolicy};
    pub use crate::error::{CacheError, CacheResult};
    pub use crate::storage::{MemorySessionStorage, SessionStorage};
    pub use crate::store::{CacheStats, CacheStore};
    pub use crate::value::CacheValue;
}
