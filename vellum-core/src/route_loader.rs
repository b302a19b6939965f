//! Route resolution: script, markup, layout and sub-components merged into
//! one cacheable [`RenderedComponent`].

use std::sync::Arc;
use tracing::{debug, info};
use vellum_http::Fetcher;

use crate::Result;
use crate::cache::{CachedResource, RouterCache, keys};
use crate::component::RenderedComponent;
use crate::components::ComponentLoader;
use crate::config::RouterConfig;
use crate::merge::MergedScript;
use crate::module::ModuleResolver;
use crate::resource::{ResourceLoader, merge_layout_with_template};
use crate::route::{RouteDescriptor, default_template};
use crate::scanner::ComponentScanner;

/// Builds routes from their script, markup, style, layout and
/// sub-components, caching the merged result.
pub struct RouteLoader {
    config: Arc<RouterConfig>,
    cache: Arc<RouterCache>,
    resources: ResourceLoader,
    scanner: ComponentScanner,
    components: ComponentLoader,
}

impl RouteLoader {
    /// Wire the resource, scanner and component loaders over one cache.
    pub fn new(
        config: Arc<RouterConfig>,
        fetcher: Arc<dyn Fetcher>,
        resolver: Arc<dyn ModuleResolver>,
        cache: Arc<RouterCache>,
    ) -> Self {
        Self {
            resources: ResourceLoader::new(
                config.clone(),
                fetcher,
                resolver.clone(),
                cache.clone(),
            ),
            scanner: ComponentScanner::new(cache.clone()),
            components: ComponentLoader::new(config.clone(), resolver, cache.clone()),
            config,
            cache,
        }
    }

    pub fn resources(&self) -> &ResourceLoader {
        &self.resources
    }

    pub fn components(&self) -> &ComponentLoader {
        &self.components
    }

    /// Resolve `route` into a mountable component.
    ///
    /// Cached results are returned as-is. Only a missing or broken route
    /// script fails; every other resource has a fallback.
    pub async fn resolve_route(&self, route: &str) -> Result<Arc<RenderedComponent>> {
        let cache_key = keys::route(route);
        if let Some(CachedResource::Route(component)) = self.cache.get(&cache_key) {
            debug!(route, "Route loaded from cache");
            return Ok(component);
        }

        let script = self.resources.load_script(route).await?;

        let (template, style, layout, layout_script, components) = if self.config.is_production() {
            let template = script.template.clone().unwrap_or_else(|| default_template(route));
            let components = self.components.load_all_components().await;
            (template, None, None, None, components)
        } else {
            let layout_name = if self.config.use_layout {
                script.layout.resolve(&self.config.default_layout)
            } else {
                None
            };

            let (template, style, layout_html, layout_script) = futures::join!(
                self.resources.load_template(route),
                self.resources.load_style(route),
                async {
                    match layout_name {
                        Some(name) => self.resources.load_layout(name).await,
                        None => None,
                    }
                },
                async {
                    match layout_name {
                        Some(name) => self.resources.load_layout_script(name).await,
                        None => None,
                    }
                },
            );

            let merged = match (&layout_html, layout_name) {
                (Some(html), Some(_)) => merge_layout_with_template(html, &template),
                _ => template,
            };
            let names = self.scanner.component_names(
                &merged,
                layout_html.as_deref().zip(layout_name),
            );
            let components = self.components.load_components(&names).await;

            let layout = layout_html.as_ref().and(layout_name).map(str::to_string);
            (merged, Some(style).filter(|s| !s.is_empty()), layout, layout_script, components)
        };

        let merged = MergedScript::merge(layout_script.as_deref(), &script, route);
        let mut registry = components;
        registry.extend(merged.components.iter().map(|(k, v)| (k.clone(), v.clone())));

        let component = Arc::new(RenderedComponent {
            route: RouteDescriptor::new(route),
            template,
            style,
            script: merged,
            components: registry,
            layout,
        });

        self.cache.set(cache_key, CachedResource::Route(component.clone()));
        info!(route, component = %component.name(), "Route resolved");
        Ok(component)
    }

    /// Drop the cached component for `route`.
    pub fn invalidate_route(&self, route: &str) -> bool {
        self.cache.delete(&keys::route(route))
    }

    /// Drop every cached route component.
    pub fn clear_routes(&self) -> usize {
        self.cache.delete_by_pattern(keys::ROUTE_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::module::StaticModuleResolver;
    use crate::script::{ComponentRegistry, Hook, HookPoint, ScriptDefinition};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;
    use vellum_cache::CacheConfig;
    use vellum_http::{FetchRequest, FetchResponse, StatusCode};

    struct Files(HashMap<&'static str, &'static str>);

    #[async_trait]
    impl Fetcher for Files {
        async fn fetch(&self, request: FetchRequest) -> vellum_http::Result<FetchResponse> {
            let path = request.url.trim_start_matches("http://localhost");
            Ok(match self.0.get(path) {
                Some(body) => FetchResponse::text_body(StatusCode::OK, *body),
                None => FetchResponse::text_body(StatusCode::NOT_FOUND, "Not Found"),
            })
        }
    }

    fn loader(
        config: RouterConfig,
        files: &[(&'static str, &'static str)],
        resolver: StaticModuleResolver,
    ) -> RouteLoader {
        let cache = Arc::new(RouterCache::new(CacheConfig::memory(Duration::from_secs(300), 50)));
        RouteLoader::new(
            Arc::new(config),
            Arc::new(Files(files.iter().copied().collect())),
            Arc::new(resolver),
            cache,
        )
    }

    #[tokio::test]
    async fn test_resolve_is_cached() {
        let loader = loader(
            RouterConfig::new(),
            &[],
            StaticModuleResolver::new().with_route("about", ScriptDefinition::new()),
        );
        let first = loader.resolve_route("about").await.unwrap();
        let second = loader.resolve_route("about").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.template.contains("Route: about"));
        assert_eq!(first.name(), "About");
    }

    #[tokio::test]
    async fn test_missing_script_is_not_found() {
        let loader = loader(RouterConfig::new(), &[], StaticModuleResolver::new());
        let err = loader.resolve_route("ghost").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_development_merges_layout_and_components() {
        let mounted = ScriptDefinition::new().with_hook(HookPoint::Mounted, Hook::sync(|_| {}));
        let layout_mounted = mounted.clone();
        let loader = loader(
            RouterConfig::new(),
            &[
                ("/src/views/products.html", "<ProductCard/>"),
                ("/src/styles/products.css", ".p{}"),
                ("/src/views/layout/default.html", "<NavBar/><main>{{ content }}</main>"),
            ],
            StaticModuleResolver::new()
                .with_route("products", mounted)
                .with_layout("default", layout_mounted)
                .with_component("ProductCard", ScriptDefinition::new())
                .with_component("NavBar", ScriptDefinition::new()),
        );

        let component = loader.resolve_route("products").await.unwrap();
        assert_eq!(component.template, "<NavBar/><main><ProductCard/></main>");
        assert_eq!(component.style.as_deref(), Some(".p{}"));
        assert_eq!(component.layout.as_deref(), Some("default"));
        assert_eq!(component.components.keys().collect::<Vec<_>>(), vec!["NavBar", "ProductCard"]);
        assert_eq!(component.script.hook_chain(HookPoint::Mounted).len(), 2);
    }

    #[tokio::test]
    async fn test_layout_opt_out() {
        let loader = loader(
            RouterConfig::new(),
            &[
                ("/src/views/login.html", "<form></form>"),
                ("/src/views/layout/default.html", "<nav></nav>{{ content }}"),
            ],
            StaticModuleResolver::new()
                .with_route("login", ScriptDefinition::new().without_layout()),
        );
        let component = loader.resolve_route("login").await.unwrap();
        assert_eq!(component.template, "<form></form>");
        assert!(component.layout.is_none());
        assert!(component.style.is_none());
    }

    #[tokio::test]
    async fn test_production_uses_bundle() {
        let mut registry = ComponentRegistry::new();
        registry.insert("Chart".to_string(), Arc::new(ScriptDefinition::new()));
        let loader = loader(
            RouterConfig::new().with_environment(Environment::Production),
            &[("/src/views/layout/default.html", "{{ content }}")],
            StaticModuleResolver::new()
                .with_route("stats", ScriptDefinition::new().with_template("<Chart/>"))
                .with_registry(registry),
        );

        let component = loader.resolve_route("stats").await.unwrap();
        assert_eq!(component.template, "<Chart/>");
        assert!(component.layout.is_none());
        assert!(component.components.contains_key("Chart"));
    }

    #[tokio::test]
    async fn test_invalidate_route() {
        let loader = loader(
            RouterConfig::new(),
            &[],
            StaticModuleResolver::new().with_route("about", ScriptDefinition::new()),
        );
        let first = loader.resolve_route("about").await.unwrap();
        assert!(loader.invalidate_route("about"));
        let second = loader.resolve_route("about").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
