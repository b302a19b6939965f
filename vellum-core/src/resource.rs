//! Raw resource loading with per-resource fallbacks.

use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, warn};
use vellum_http::{FetchRequest, Fetcher, HttpClientError};

use crate::cache::{CachedResource, RouterCache, keys};
use crate::config::RouterConfig;
use crate::module::{ModuleExport, ModuleKind, ModuleRequest, ModuleResolver};
use crate::route::default_template;
use crate::script::ScriptDefinition;
use crate::{Result, RouterError};

/// Token replaced by the page markup in a layout.
pub const CONTENT_PLACEHOLDER: &str = "{{ content }}";

/// Marks a layout whose `.container` inside `<main>` receives the page.
pub const MAIN_CONTENT_MARKER: &str = r#"class="main-content""#;

static MAIN_CONTAINER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?s)(<div class="container">).*?(</div>\s*</main>)"#).unwrap());

/// Place page markup inside layout markup.
///
/// Tries the content placeholder, then the main-content container, then
/// appends the page after the layout.
pub fn merge_layout_with_template(layout: &str, template: &str) -> String {
    if layout.contains(CONTENT_PLACEHOLDER) {
        return layout.replacen(CONTENT_PLACEHOLDER, template, 1);
    }
    if layout.contains(MAIN_CONTENT_MARKER) {
        debug!("Using main-content replacement");
        return MAIN_CONTAINER
            .replace(layout, |caps: &regex::Captures<'_>| {
                format!("{}{}{}", &caps[1], template, &caps[2])
            })
            .into_owned();
    }
    debug!("Wrapping template with layout");
    format!("{layout}\n{template}")
}

/// Fetches route markup, styles and layouts and resolves route and layout
/// scripts, substituting a fallback when a non-script resource is missing.
pub struct ResourceLoader {
    config: Arc<RouterConfig>,
    fetcher: Arc<dyn Fetcher>,
    resolver: Arc<dyn ModuleResolver>,
    cache: Arc<RouterCache>,
}

impl ResourceLoader {
    /// Loader reading files through `fetcher` and scripts through
    /// `resolver`, caching layouts and layout scripts in `cache`.
    pub fn new(
        config: Arc<RouterConfig>,
        fetcher: Arc<dyn Fetcher>,
        resolver: Arc<dyn ModuleResolver>,
        cache: Arc<RouterCache>,
    ) -> Self {
        Self {
            config,
            fetcher,
            resolver,
            cache,
        }
    }

    pub fn script_request(&self, route: &str) -> ModuleRequest {
        let path = if self.config.is_production() {
            format!("{}/{route}.js", self.config.routes_path)
        } else {
            format!("{}/logic/{route}.js", self.config.src_path)
        };
        ModuleRequest::new(ModuleKind::RouteScript, route, path)
    }

    /// Load the route's logic module. Missing modules become
    /// [`RouterError::RouteNotFound`].
    pub async fn load_script(&self, route: &str) -> Result<Arc<ScriptDefinition>> {
        let request = self.script_request(route);
        match self.resolver.resolve(&request).await {
            Ok(ModuleExport::Script(script)) => Ok(script),
            Ok(ModuleExport::Empty) => {
                warn!(route, path = %request.path, "Route module has no default export");
                Err(RouterError::route_not_found(route))
            }
            Ok(ModuleExport::Registry(_)) => Err(RouterError::ScriptLoad {
                route: route.to_string(),
                message: format!("{} exports a component registry", request.path),
            }),
            Err(err) => Err(RouterError::from_script_failure(route, err)),
        }
    }

    /// Route markup, or the default template when unavailable.
    pub async fn load_template(&self, route: &str) -> String {
        let url = format!("{}/views/{route}.html", self.config.src_path);
        match self.fetch_text(&url).await {
            Ok(template) => {
                debug!(route, "Template loaded");
                template
            }
            Err(err) => {
                warn!(route, error = %err, "Template not found, using default");
                default_template(route)
            }
        }
    }

    /// Route stylesheet, or empty when unavailable.
    pub async fn load_style(&self, route: &str) -> String {
        let url = format!("{}/styles/{route}.css", self.config.src_path);
        match self.fetch_text(&url).await {
            Ok(style) => style,
            Err(err) => {
                debug!(route, error = %err, "Style not found, no styles applied");
                String::new()
            }
        }
    }

    pub async fn load_layout(&self, layout: &str) -> Option<String> {
        let key = keys::layout(layout);
        if let Some(CachedResource::Text(html)) = self.cache.get(&key) {
            return Some(html);
        }

        let url = format!("{}/views/layout/{layout}.html", self.config.src_path);
        match self.fetch_text(&url).await {
            Ok(html) => {
                self.cache.set(key, CachedResource::Text(html.clone()));
                debug!(layout, "Layout loaded");
                Some(html)
            }
            Err(err) => {
                warn!(layout, error = %err, "Layout not found, no layout applied");
                None
            }
        }
    }

    pub async fn load_layout_script(&self, layout: &str) -> Option<Arc<ScriptDefinition>> {
        let key = keys::layout_script(layout);
        if let Some(CachedResource::Script(script)) = self.cache.get(&key) {
            return Some(script);
        }

        let request = ModuleRequest::new(
            ModuleKind::LayoutScript,
            layout,
            format!("{}/logic/layout/{layout}.js", self.config.src_path),
        );
        match self.resolver.resolve(&request).await {
            Ok(ModuleExport::Script(script)) => {
                self.cache.set(key, CachedResource::Script(script.clone()));
                Some(script)
            }
            Ok(_) => {
                debug!(layout, "Layout module has no script export");
                None
            }
            Err(err) => {
                debug!(layout, error = %err, "Layout script unavailable");
                None
            }
        }
    }

    async fn fetch_text(&self, url: &str) -> std::result::Result<String, HttpClientError> {
        let response = self.fetcher.fetch(FetchRequest::get(url)).await?;
        response.error_for_status()?.text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_placeholder_first_occurrence() {
        let layout = "<header></header>{{ content }}<footer>{{ content }}</footer>";
        assert_eq!(
            merge_layout_with_template(layout, "<p>hi</p>"),
            "<header></header><p>hi</p><footer>{{ content }}</footer>"
        );
    }

    #[test]
    fn test_merge_main_content() {
        let layout =
            "<main class=\"main-content\">\n<div class=\"container\">old\nstuff</div>\n</main>";
        assert_eq!(
            merge_layout_with_template(layout, "<p>hi</p>"),
            "<main class=\"main-content\">\n<div class=\"container\"><p>hi</p></div>\n</main>"
        );
    }

    #[test]
    fn test_merge_placeholder_beats_marker() {
        let layout =
            "<main class=\"main-content\"><div class=\"container\">{{ content }}</div></main>";
        assert_eq!(
            merge_layout_with_template(layout, "X"),
            "<main class=\"main-content\"><div class=\"container\">X</div></main>"
        );
    }

    #[test]
    fn test_merge_fallback_concatenates() {
        assert_eq!(
            merge_layout_with_template("<nav></nav>", "<p>hi</p>"),
            "<nav></nav>\n<p>hi</p>"
        );
    }
}
