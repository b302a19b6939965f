//! Sub-component loading.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared, join_all};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{CachedResource, RouterCache, keys};
use crate::config::RouterConfig;
use crate::module::{ModuleExport, ModuleKind, ModuleLoadError, ModuleRequest, ModuleResolver};
use crate::script::{ComponentRegistry, ScriptDefinition};

type ComponentFuture = Shared<BoxFuture<'static, Result<Arc<ScriptDefinition>, ModuleLoadError>>>;

/// Loads components by name, sharing in-flight loads.
pub struct ComponentLoader {
    config: Arc<RouterConfig>,
    resolver: Arc<dyn ModuleResolver>,
    cache: Arc<RouterCache>,
    in_flight: Arc<Mutex<HashMap<String, ComponentFuture>>>,
    registry: Mutex<Option<ComponentRegistry>>,
}

impl ComponentLoader {
    pub fn new(
        config: Arc<RouterConfig>,
        resolver: Arc<dyn ModuleResolver>,
        cache: Arc<RouterCache>,
    ) -> Self {
        Self {
            config,
            resolver,
            cache,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            registry: Mutex::new(None),
        }
    }

    pub fn component_path(&self, name: &str) -> String {
        format!("{}{}/{name}.js", self.config.src_path, self.config.components_path)
    }

    /// Load one component. Concurrent calls for the same name share a
    /// single resolver call.
    pub async fn load_component(
        &self,
        name: &str,
    ) -> Result<Arc<ScriptDefinition>, ModuleLoadError> {
        if name.is_empty() {
            return Err(ModuleLoadError::failed("Component name must be a non-empty string"));
        }
        let key = keys::component(name);
        if let Some(CachedResource::Component(component)) = self.cache.get(&key) {
            debug!(component = name, "Component loaded from cache");
            return Ok(component);
        }

        let future = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(name) {
                Some(future) => future.clone(),
                None => {
                    let future = self.spawn_load(name);
                    in_flight.insert(name.to_string(), future.clone());
                    future
                }
            }
        };
        future.await
    }

    fn spawn_load(&self, name: &str) -> ComponentFuture {
        let resolver = self.resolver.clone();
        let cache = self.cache.clone();
        let in_flight = self.in_flight.clone();
        let request = ModuleRequest::new(ModuleKind::Component, name, self.component_path(name));

        async move {
            let result = match resolver.resolve(&request).await {
                Ok(ModuleExport::Script(script)) => {
                    let script = if script.name.is_none() {
                        Arc::new((*script).clone().with_name(request.name.clone()))
                    } else {
                        script
                    };
                    cache.set(
                        keys::component(&request.name),
                        CachedResource::Component(script.clone()),
                    );
                    debug!(component = %request.name, "Component loaded");
                    Ok(script)
                }
                Ok(_) => Err(ModuleLoadError::failed(format!(
                    "Component '{}' has no default export",
                    request.name
                ))),
                Err(err) => Err(ModuleLoadError {
                    kind: err.kind,
                    message: format!("Component '{}' not found: {}", request.name, err.message),
                }),
            };
            in_flight.lock().remove(&request.name);
            result
        }
        .boxed()
        .shared()
    }

    /// Load each named component concurrently. Failures are logged and
    /// left out of the result.
    pub async fn load_components<I, S>(&self, names: I) -> ComponentRegistry
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        if names.is_empty() {
            return ComponentRegistry::new();
        }

        let loads = names
            .iter()
            .map(|name| async move { (name.clone(), self.load_component(name).await) });
        let mut registry = ComponentRegistry::new();
        for (name, result) in join_all(loads).await {
            match result {
                Ok(component) => {
                    registry.insert(name, component);
                }
                Err(err) => warn!(component = %name, error = %err, "Failed to load component"),
            }
        }
        info!(requested = names.len(), loaded = registry.len(), "Components loaded");
        registry
    }

    /// Load the production registry bundle. Missing or malformed bundles
    /// yield an empty registry.
    pub async fn load_all_components(&self) -> ComponentRegistry {
        if let Some(registry) = self.registry.lock().clone() {
            return registry;
        }

        let request = ModuleRequest::new(
            ModuleKind::ComponentRegistry,
            "_components",
            format!("{}/_components.js", self.config.routes_path),
        );
        let registry = match self.resolver.resolve(&request).await {
            Ok(ModuleExport::Registry(registry)) => {
                info!(count = registry.len(), "Unified components loaded");
                registry
            }
            Ok(_) => {
                warn!(path = %request.path, "Component bundle exports no registry");
                ComponentRegistry::new()
            }
            Err(err) => {
                warn!(path = %request.path, error = %err, "Failed to load unified components");
                ComponentRegistry::new()
            }
        };
        *self.registry.lock() = Some(registry.clone());
        registry
    }

    /// Forget loaded components and in-flight loads.
    pub fn clear_components(&self) -> usize {
        self.in_flight.lock().clear();
        *self.registry.lock() = None;
        let removed = self.cache.delete_by_pattern(keys::COMPONENT_PREFIX);
        debug!(removed, "All components cleared");
        removed
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::StaticModuleResolver;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use vellum_cache::CacheConfig;

    fn loader(resolver: StaticModuleResolver) -> ComponentLoader {
        loader_with(Arc::new(resolver))
    }

    fn loader_with(resolver: Arc<dyn ModuleResolver>) -> ComponentLoader {
        let cache = Arc::new(RouterCache::new(CacheConfig::memory(Duration::from_secs(60), 20)));
        ComponentLoader::new(Arc::new(RouterConfig::default()), resolver, cache)
    }

    /// Counts calls and answers after a fixed delay.
    struct SlowResolver {
        inner: StaticModuleResolver,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModuleResolver for SlowResolver {
        async fn resolve(&self, request: &ModuleRequest) -> Result<ModuleExport, ModuleLoadError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.inner.resolve(request).await
        }
    }

    #[tokio::test]
    async fn test_load_component_names_default() {
        let resolver =
            StaticModuleResolver::new().with_component("Button", ScriptDefinition::new());
        let loader = loader(resolver);
        let button = loader.load_component("Button").await.unwrap();
        assert_eq!(button.name.as_deref(), Some("Button"));

        let again = loader.load_component("Button").await.unwrap();
        assert!(Arc::ptr_eq(&button, &again));
        assert_eq!(loader.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_loads_share_one_resolve() {
        let resolver = Arc::new(SlowResolver {
            inner: StaticModuleResolver::new().with_component("Card", ScriptDefinition::new()),
            calls: AtomicUsize::new(0),
        });
        let loader = loader_with(resolver.clone());

        let (first, second) =
            futures::join!(loader.load_component("Card"), loader.load_component("Card"));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.in_flight_count(), 0);
    }

    #[tokio::test]
    async fn test_load_components_skips_failures() {
        let resolver = StaticModuleResolver::new().with_component("Card", ScriptDefinition::new());
        let loader = loader(resolver);
        let registry = loader.load_components(["Card", "Missing"]).await;
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["Card"]);
    }

    #[tokio::test]
    async fn test_missing_registry_is_empty() {
        let loader = loader(StaticModuleResolver::new());
        assert!(loader.load_all_components().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_components() {
        let resolver = StaticModuleResolver::new().with_component("Card", ScriptDefinition::new());
        let loader = loader(resolver);
        loader.load_component("Card").await.unwrap();
        assert_eq!(loader.clear_components(), 1);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let loader = loader(StaticModuleResolver::new());
        assert!(loader.load_component("").await.is_err());
    }
}
