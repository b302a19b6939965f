//! Sub-component discovery in markup.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{CachedResource, RouterCache, keys};

static COMPONENT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Z][A-Za-z0-9]*)(?:\s[^>]*)?/?>").unwrap());

/// Standard element names never treated as components, compared
/// case-insensitively.
const HTML_TAGS: &[&str] = &[
    "div", "span", "p", "a", "img", "ul", "ol", "li", "h1", "h2", "h3", "h4", "h5", "h6", "table",
    "thead", "tbody", "tfoot", "tr", "td", "th", "form", "input", "button", "label", "select",
    "option", "textarea", "nav", "header", "footer", "main", "section", "article", "aside",
    "figure", "figcaption", "video", "audio", "canvas", "svg", "iframe", "script", "style", "link",
    "meta", "title", "body", "html", "head", "template", "slot",
];

pub fn is_html_tag(name: &str) -> bool {
    HTML_TAGS.iter().any(|tag| tag.eq_ignore_ascii_case(name))
}

/// Names of capitalized, non-standard tags opened in `markup`.
pub fn scan(markup: &str) -> BTreeSet<String> {
    COMPONENT_TAG
        .captures_iter(markup)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .filter(|name| !is_html_tag(name))
        .map(str::to_string)
        .collect()
}

/// Scanner that remembers each layout's component set.
pub struct ComponentScanner {
    cache: Arc<RouterCache>,
}

impl ComponentScanner {
    /// Scanner storing layout scans in the shared router cache.
    pub fn new(cache: Arc<RouterCache>) -> Self {
        Self { cache }
    }

    pub fn scan(&self, markup: &str) -> BTreeSet<String> {
        scan(markup)
    }

    /// Components used by a layout, cached under the layout name.
    pub fn scan_layout(&self, markup: &str, layout: &str) -> Arc<BTreeSet<String>> {
        let key = keys::layout_components(layout);
        if let Some(CachedResource::Names(names)) = self.cache.get(&key) {
            debug!(layout, "Using cached layout components");
            return names;
        }
        let names = Arc::new(scan(markup));
        debug!(layout, count = names.len(), "Cached layout components");
        self.cache.set(key, CachedResource::Names(names.clone()));
        names
    }

    /// Components referenced by a page plus its layout.
    pub fn component_names(
        &self,
        template: &str,
        layout: Option<(&str, &str)>,
    ) -> BTreeSet<String> {
        let mut names = match layout {
            Some((markup, name)) => (*self.scan_layout(markup, name)).clone(),
            None => BTreeSet::new(),
        };
        names.extend(scan(template));
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vellum_cache::CacheConfig;

    #[test]
    fn test_scan_finds_components() {
        let names = scan(r#"<div><Button label="x"/><Modal>
            <Card /></Modal><Button></Button></div>"#);
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["Button", "Card", "Modal"]);
    }

    #[test]
    fn test_scan_ignores_html_and_lowercase() {
        let names = scan("<Div>x</Div><Table></Table><my-widget></my-widget><span></span>");
        assert!(names.is_empty());
    }

    #[test]
    fn test_closing_tags_alone_do_not_count() {
        assert!(scan("</Orphan>").is_empty());
    }

    #[test]
    fn test_scan_layout_is_cached() {
        let cache = Arc::new(RouterCache::new(CacheConfig::memory(Duration::from_secs(60), 10)));
        let scanner = ComponentScanner::new(cache.clone());

        let first = scanner.scan_layout("<Nav/><Footer/>", "default");
        assert_eq!(first.len(), 2);

        let again = scanner.scan_layout("<Sidebar/>", "default");
        assert!(Arc::ptr_eq(&first, &again));
        assert!(cache.has(&keys::layout_components("default")));

        let names = scanner.component_names("<Card/>", Some(("<Nav/>", "default")));
        assert_eq!(names.len(), 3);
    }
}
