//! Application-wide keyed state with watchers.

use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

/// Called with `(new, old, key)`. `Null` stands for an absent value.
pub type StateWatcher = Arc<dyn Fn(&Value, &Value, &str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateStats {
    pub state_count: usize,
    pub watcher_count: usize,
    pub keys: Vec<String>,
}

#[derive(Default)]
pub struct StateHandler {
    state: RwLock<Map<String, Value>>,
    watchers: RwLock<HashMap<String, Vec<(WatchId, StateWatcher)>>>,
    next_id: AtomicU64,
}

impl StateHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` and notify the key's watchers. Returns the old value.
    pub fn set(&self, key: &str, value: Value) -> Option<Value> {
        let old = self.state.write().insert(key.to_string(), value.clone());
        debug!(key, "State set");
        self.notify(key, &value, old.as_ref().unwrap_or(&Value::Null));
        old
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.read().get(key).cloned()
    }

    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    pub fn has(&self, key: &str) -> bool {
        self.state.read().contains_key(key)
    }

    pub fn delete(&self, key: &str) -> bool {
        let old = self.state.write().remove(key);
        match old {
            Some(old) => {
                self.notify(key, &Value::Null, &old);
                true
            }
            None => false,
        }
    }

    /// Remove every key, notifying watchers of each.
    pub fn clear(&self) {
        let old = std::mem::take(&mut *self.state.write());
        for (key, value) in &old {
            self.notify(key, &Value::Null, value);
        }
    }

    /// Set several keys at once.
    pub fn update(&self, values: Map<String, Value>) {
        for (key, value) in values {
            self.set(&key, value);
        }
    }

    pub fn get_all(&self) -> Map<String, Value> {
        self.state.read().clone()
    }

    pub fn watch(&self, key: &str, watcher: StateWatcher) -> WatchId {
        let id = WatchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.watchers.write().entry(key.to_string()).or_default().push((id, watcher));
        id
    }

    pub fn unwatch(&self, key: &str, id: WatchId) -> bool {
        let mut watchers = self.watchers.write();
        let Some(list) = watchers.get_mut(key) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        let removed = list.len() != before;
        if list.is_empty() {
            watchers.remove(key);
        }
        removed
    }

    fn notify(&self, key: &str, new: &Value, old: &Value) {
        let listeners: Vec<StateWatcher> = self
            .watchers
            .read()
            .get(key)
            .map(|list| list.iter().map(|(_, w)| w.clone()).collect())
            .unwrap_or_default();
        for watcher in listeners {
            let notify = std::panic::AssertUnwindSafe(|| watcher(new, old, key));
            if std::panic::catch_unwind(notify).is_err() {
                warn!(key, "State watcher panicked");
            }
        }
    }

    pub fn stats(&self) -> StateStats {
        let state = self.state.read();
        StateStats {
            state_count: state.len(),
            watcher_count: self.watchers.read().values().map(Vec::len).sum(),
            keys: state.keys().cloned().collect(),
        }
    }

    /// Drop all state and watchers without notifying.
    pub fn destroy(&self) {
        self.state.write().clear();
        self.watchers.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[test]
    fn test_set_get_delete() {
        let state = StateHandler::new();
        assert_eq!(state.set("user", json!({"name": "kim"})), None);
        assert!(state.has("user"));
        assert_eq!(state.get("user"), Some(json!({"name": "kim"})));
        assert_eq!(state.get_or("theme", json!("light")), json!("light"));
        assert!(state.delete("user"));
        assert!(!state.delete("user"));
    }

    #[test]
    fn test_watchers() {
        let state = StateHandler::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = state.watch(
            "count",
            Arc::new(move |new, old, key| {
                sink.lock().push((key.to_string(), new.clone(), old.clone()))
            }),
        );

        state.set("count", json!(1));
        state.set("count", json!(2));
        state.set("other", json!(true));
        assert!(state.unwatch("count", id));
        state.set("count", json!(3));

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], ("count".to_string(), json!(1), Value::Null));
        assert_eq!(seen[1], ("count".to_string(), json!(2), json!(1)));
    }

    #[test]
    fn test_update_and_stats() {
        let state = StateHandler::new();
        let mut values = Map::new();
        values.insert("a".into(), json!(1));
        values.insert("b".into(), json!(2));
        state.update(values);
        state.watch("a", Arc::new(|_, _, _| {}));

        let stats = state.stats();
        assert_eq!(stats.state_count, 2);
        assert_eq!(stats.watcher_count, 1);
        assert_eq!(stats.keys, vec!["a", "b"]);

        state.clear();
        assert!(state.get_all().is_empty());
    }
}
