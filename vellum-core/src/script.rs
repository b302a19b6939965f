//! Route and layout logic modules.
//!
//! A [`ScriptDefinition`] is what a module resolver hands back for a route,
//! a layout or a component: initial data, methods, computed values, watchers,
//! lifecycle hooks and an optional `dataURL`. Callables are stored as
//! reference-counted closures so definitions can be shared by the cache and
//! every mount.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::component::ComponentContext;

/// Error raised by user callables.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

pub type HookResult = std::result::Result<(), HookError>;

pub type MethodResult = std::result::Result<Value, HookError>;

/// Lifecycle points, in mount/update/unmount order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum HookPoint {
    BeforeMount,
    Mounted,
    BeforeUpdate,
    Updated,
    BeforeUnmount,
    Unmounted,
}

impl HookPoint {
    pub const ALL: [HookPoint; 6] = [
        HookPoint::BeforeMount,
        HookPoint::Mounted,
        HookPoint::BeforeUpdate,
        HookPoint::Updated,
        HookPoint::BeforeUnmount,
        HookPoint::Unmounted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HookPoint::BeforeMount => "beforeMount",
            HookPoint::Mounted => "mounted",
            HookPoint::BeforeUpdate => "beforeUpdate",
            HookPoint::Updated => "updated",
            HookPoint::BeforeUnmount => "beforeUnmount",
            HookPoint::Unmounted => "unmounted",
        }
    }
}

/// An awaitable lifecycle hook.
#[derive(Clone)]
pub struct Hook(Arc<dyn Fn(ComponentContext) -> BoxFuture<'static, HookResult> + Send + Sync>);

impl Hook {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ComponentContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HookResult> + Send + 'static,
    {
        Self(Arc::new(move |ctx| f(ctx).boxed()))
    }

    /// A hook that completes without suspending.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&ComponentContext) + Send + Sync + 'static,
    {
        Self(Arc::new(move |ctx| {
            f(&ctx);
            futures::future::ready(Ok(())).boxed()
        }))
    }

    pub async fn call(&self, ctx: ComponentContext) -> HookResult {
        (self.0)(ctx).await
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Hook")
    }
}

/// A component method taking JSON arguments.
#[derive(Clone)]
pub struct Method(
    Arc<dyn Fn(ComponentContext, Vec<Value>) -> BoxFuture<'static, MethodResult> + Send + Sync>,
);

impl Method {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ComponentContext, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MethodResult> + Send + 'static,
    {
        Self(Arc::new(move |ctx, args| f(ctx, args).boxed()))
    }

    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&ComponentContext, &[Value]) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(move |ctx, args| {
            let value = f(&ctx, &args);
            futures::future::ready(Ok(value)).boxed()
        }))
    }

    pub async fn call(&self, ctx: ComponentContext, args: Vec<Value>) -> MethodResult {
        (self.0)(ctx, args).await
    }

    /// Whether two handles point at the same closure.
    pub fn ptr_eq(&self, other: &Method) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Method")
    }
}

/// A derived value computed from component state.
#[derive(Clone)]
pub struct Computed(Arc<dyn Fn(&ComponentContext) -> Value + Send + Sync>);

impl Computed {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ComponentContext) -> Value + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn get(&self, ctx: &ComponentContext) -> Value {
        (self.0)(ctx)
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Computed")
    }
}

/// Observer called with `(ctx, new, old)` when a state key changes.
#[derive(Clone)]
pub struct Watcher(Arc<dyn Fn(&ComponentContext, &Value, &Value) + Send + Sync>);

impl Watcher {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&ComponentContext, &Value, &Value) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn notify(&self, ctx: &ComponentContext, new: &Value, old: &Value) {
        (self.0)(ctx, new, old)
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Watcher")
    }
}

/// Produces a fresh initial state map for every mount.
#[derive(Clone)]
pub struct DataFactory(Arc<dyn Fn() -> Map<String, Value> + Send + Sync>);

impl DataFactory {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Map<String, Value> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Factory returning a clone of a JSON object. Non-objects produce an
    /// empty map.
    pub fn from_value(value: Value) -> Self {
        let map = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(move || map.clone())
    }

    pub fn produce(&self) -> Map<String, Value> {
        (self.0)()
    }
}

impl fmt::Debug for DataFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DataFactory")
    }
}

pub type LifecycleHooks = BTreeMap<HookPoint, Hook>;

/// Named sub-components available to a rendered component.
pub type ComponentRegistry = BTreeMap<String, Arc<ScriptDefinition>>;

/// Which layout a route wants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LayoutChoice {
    /// The configured default layout.
    #[default]
    Default,
    Named(String),
    /// Explicit opt-out.
    Disabled,
}

impl LayoutChoice {
    /// Layout name to load, or `None` when disabled.
    pub fn resolve<'a>(&'a self, default_layout: &'a str) -> Option<&'a str> {
        match self {
            LayoutChoice::Default => Some(default_layout),
            LayoutChoice::Named(name) => Some(name),
            LayoutChoice::Disabled => None,
        }
    }
}

/// Endpoint(s) fetched automatically after mount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataUrl {
    Single(String),
    Multiple(BTreeMap<String, String>),
}

/// A route, layout or component logic module.
#[derive(Debug, Clone, Default)]
pub struct ScriptDefinition {
    pub name: Option<String>,
    pub layout: LayoutChoice,
    pub data: Option<DataFactory>,
    pub methods: BTreeMap<String, Method>,
    pub computed: BTreeMap<String, Computed>,
    pub watch: BTreeMap<String, Watcher>,
    pub hooks: LifecycleHooks,
    pub data_url: Option<DataUrl>,
    /// Inlined markup, used by production bundles.
    pub template: Option<String>,
    pub props: Option<Value>,
    pub emits: Option<Value>,
    pub provide: Option<Value>,
    pub inject: Option<Value>,
    pub components: ComponentRegistry,
}

impl ScriptDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_layout(mut self, layout: impl Into<String>) -> Self {
        self.layout = LayoutChoice::Named(layout.into());
        self
    }

    pub fn without_layout(mut self) -> Self {
        self.layout = LayoutChoice::Disabled;
        self
    }

    pub fn with_data<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Map<String, Value> + Send + Sync + 'static,
    {
        self.data = Some(DataFactory::new(f));
        self
    }

    /// Initial data from a JSON object literal.
    pub fn with_data_value(mut self, value: Value) -> Self {
        self.data = Some(DataFactory::from_value(value));
        self
    }

    pub fn with_method(mut self, name: impl Into<String>, method: Method) -> Self {
        self.methods.insert(name.into(), method);
        self
    }

    pub fn with_computed(mut self, name: impl Into<String>, computed: Computed) -> Self {
        self.computed.insert(name.into(), computed);
        self
    }

    pub fn with_watch(mut self, key: impl Into<String>, watcher: Watcher) -> Self {
        self.watch.insert(key.into(), watcher);
        self
    }

    pub fn with_hook(mut self, point: HookPoint, hook: Hook) -> Self {
        self.hooks.insert(point, hook);
        self
    }

    pub fn with_data_url(mut self, url: impl Into<String>) -> Self {
        self.data_url = Some(DataUrl::Single(url.into()));
        self
    }

    pub fn with_data_urls<I, K, V>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.data_url = Some(DataUrl::Multiple(
            urls.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ));
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_props(mut self, props: Value) -> Self {
        self.props = Some(props);
        self
    }

    pub fn with_emits(mut self, emits: Value) -> Self {
        self.emits = Some(emits);
        self
    }

    pub fn with_provide(mut self, provide: Value) -> Self {
        self.provide = Some(provide);
        self
    }

    pub fn with_inject(mut self, inject: Value) -> Self {
        self.inject = Some(inject);
        self
    }

    pub fn with_component(
        mut self,
        name: impl Into<String>,
        component: Arc<ScriptDefinition>,
    ) -> Self {
        self.components.insert(name.into(), component);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_layout_choice() {
        assert_eq!(LayoutChoice::Default.resolve("default"), Some("default"));
        assert_eq!(LayoutChoice::Named("admin".into()).resolve("default"), Some("admin"));
        assert_eq!(LayoutChoice::Disabled.resolve("default"), None);
    }

    #[test]
    fn test_data_url_untagged() {
        let single: DataUrl = serde_json::from_value(json!("/api/users")).unwrap();
        assert_eq!(single, DataUrl::Single("/api/users".into()));

        let multi: DataUrl = serde_json::from_value(json!({"users": "/api/users"})).unwrap();
        assert!(matches!(multi, DataUrl::Multiple(ref m) if m["users"] == "/api/users"));
    }

    #[test]
    fn test_data_factory_is_fresh_per_call() {
        let factory = DataFactory::from_value(json!({"count": 1}));
        let mut first = factory.produce();
        first.insert("count".into(), json!(2));
        assert_eq!(factory.produce()["count"], json!(1));

        assert!(DataFactory::from_value(json!([1, 2])).produce().is_empty());
    }

    #[test]
    fn test_builder() {
        let script = ScriptDefinition::new()
            .with_name("Products")
            .without_layout()
            .with_data_urls([("users", "/api/users"), ("stats", "/api/stats")])
            .with_method("noop", Method::sync(|_, _| Value::Null))
            .with_hook(HookPoint::Mounted, Hook::sync(|_| {}));

        assert_eq!(script.name.as_deref(), Some("Products"));
        assert_eq!(script.layout, LayoutChoice::Disabled);
        assert!(script.methods.contains_key("noop"));
        assert!(script.hooks.contains_key(&HookPoint::Mounted));
        assert!(matches!(script.data_url, Some(DataUrl::Multiple(ref m)) if m.len() == 2));
    }
}
