//! Values the cache can hold.

/// A value that can live in a [`CacheStore`](crate::CacheStore).
///
/// Only values that return `Some` from [`persist`](CacheValue::persist) are
/// mirrored into session storage; everything else stays process-local even in
/// session mode.
pub trait CacheValue: Clone + Send + Sync + 'static {
    /// JSON form written to session storage.
    fn persist(&self) -> Option<serde_json::Value> {
        None
    }

    /// Rebuild a value from its persisted JSON form.
    fn restore(_value: serde_json::Value) -> Option<Self> {
        None
    }
}

impl CacheValue for String {
    fn persist(&self) -> Option<serde_json::Value> {
        Some(serde_json::Value::String(self.clone()))
    }

    fn restore(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl CacheValue for serde_json::Value {
    fn persist(&self) -> Option<serde_json::Value> {
        Some(self.clone())
    }

    fn restore(value: serde_json::Value) -> Option<Self> {
        Some(value)
    }
}

impl<T: Send + Sync + 'static + ?Sized> CacheValue for std::sync::Arc<T> {}
