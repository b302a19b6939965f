//! The router's resource cache.

use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use vellum_cache::{CacheStore, CacheValue};

use crate::component::RenderedComponent;
use crate::script::ScriptDefinition;

/// Anything the loaders cache.
#[derive(Debug, Clone)]
pub enum CachedResource {
    Text(String),
    Script(Arc<ScriptDefinition>),
    Component(Arc<ScriptDefinition>),
    Route(Arc<RenderedComponent>),
    Names(Arc<BTreeSet<String>>),
}

impl CachedResource {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CachedResource::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Markup and name sets survive a session-backed cache; closures and
/// rendered components stay in memory.
impl CacheValue for CachedResource {
    fn persist(&self) -> Option<Value> {
        match self {
            CachedResource::Text(text) => Some(Value::String(text.clone())),
            CachedResource::Names(names) => {
                Some(Value::Array(names.iter().cloned().map(Value::String).collect()))
            }
            _ => None,
        }
    }

    fn restore(value: Value) -> Option<Self> {
        match value {
            Value::String(text) => Some(CachedResource::Text(text)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(name) => Some(name),
                    _ => None,
                })
                .collect::<Option<BTreeSet<_>>>()
                .map(|names| CachedResource::Names(Arc::new(names))),
            _ => None,
        }
    }
}

pub type RouterCache = CacheStore<CachedResource>;

/// Cache key builders.
pub mod keys {
    pub fn route(name: &str) -> String {
        format!("route_{name}")
    }

    pub fn layout(name: &str) -> String {
        format!("layout_{name}")
    }

    pub fn layout_script(name: &str) -> String {
        format!("layout_script_{name}")
    }

    pub fn component(name: &str) -> String {
        format!("component_{name}")
    }

    pub fn layout_components(name: &str) -> String {
        format!("layout_components_{name}")
    }

    pub const ROUTE_PREFIX: &str = "route_";
    pub const COMPONENT_PREFIX: &str = "component_";
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_persistence_forms() {
        let text = CachedResource::Text("<main></main>".into());
        assert_eq!(text.persist(), Some(json!("<main></main>")));

        let names =
            CachedResource::Names(Arc::new(["Footer".to_string(), "Nav".to_string()].into()));
        let persisted = names.persist().unwrap();
        assert_eq!(persisted, json!(["Footer", "Nav"]));
        assert!(matches!(
            CachedResource::restore(persisted),
            Some(CachedResource::Names(n)) if n.len() == 2
        ));

        let script = CachedResource::Script(Arc::new(ScriptDefinition::new()));
        assert!(script.persist().is_none());
        assert!(CachedResource::restore(json!(42)).is_none());
        assert!(CachedResource::restore(json!(["ok", 1])).is_none());
    }

    #[test]
    fn test_keys_do_not_collide() {
        assert_ne!(keys::route("nav"), keys::component("nav"));
        assert!(keys::layout_script("default").starts_with("layout_"));
    }
}
