//! Browser location abstraction and URL mapping.

use crate::config::RouterMode;
use crate::query::{QueryParams, build_query_string, parse_query_string};

/// The parts of `window.location` / `window.history` the router uses.
pub trait Location: Send + Sync {
    /// Current hash including the leading `#`, or empty.
    fn hash(&self) -> String;
    fn pathname(&self) -> String;
    /// Current search string including the leading `?`, or empty.
    fn search(&self) -> String;
    fn set_hash(&self, hash: &str);
    fn push_state(&self, url: &str);
    fn replace_state(&self, url: &str);
}

/// Browser events that can change the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationEvent {
    HashChange,
    PopState,
}

/// Route name and query parsed from a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLocation {
    pub route: String,
    pub query: QueryParams,
}

/// Extract the route and query for the given mode.
///
/// Hash mode reads `#/{route}?{query}`, falling back to the search string
/// when the hash has no query. History mode strips `base_path` from the
/// pathname. An empty route is `home`.
pub fn parse_location(
    mode: RouterMode,
    base_path: &str,
    location: &dyn Location,
) -> ParsedLocation {
    match mode {
        RouterMode::Hash => {
            let hash = location.hash();
            let hash_path = hash.strip_prefix('#').unwrap_or(&hash);
            let (path, query) = match hash_path.split_once('?') {
                Some((path, query)) => (path, query.to_string()),
                None => {
                    let search = location.search();
                    (hash_path, search.strip_prefix('?').unwrap_or(&search).to_string())
                }
            };
            let route = path.strip_prefix('/').unwrap_or(path);
            ParsedLocation {
                route: if route.is_empty() { "home".to_string() } else { route.to_string() },
                query: parse_query_string(&query),
            }
        }
        RouterMode::History => {
            let pathname = location.pathname();
            let mut route = pathname.as_str();
            if base_path != "/"
                && let Some(stripped) = route.strip_prefix(base_path.trim_end_matches('/'))
                && (stripped.is_empty() || stripped.starts_with('/'))
            {
                route = stripped;
            }
            let route = route.strip_prefix('/').unwrap_or(route);
            let search = location.search();
            ParsedLocation {
                route: if route.is_empty() { "home".to_string() } else { route.to_string() },
                query: parse_query_string(search.strip_prefix('?').unwrap_or(&search)),
            }
        }
    }
}

/// Path of a route without query: `/` for `home`, `/{route}` otherwise,
/// under `base_path` in history mode.
pub fn route_path(route: &str, mode: RouterMode, base_path: &str) -> String {
    let path = if route == "home" { "/".to_string() } else { format!("/{route}") };
    match mode {
        RouterMode::History if !base_path.is_empty() && base_path != "/" => {
            format!("{}{path}", base_path.trim_end_matches('/'))
        }
        _ => path,
    }
}

/// Browser-visible URL for a route: `#/{route}?{q}` or
/// `{base_path}/{route}?{q}`.
pub fn build_url(route: &str, query: &QueryParams, mode: RouterMode, base_path: &str) -> String {
    let path = route_path(route, mode, base_path);
    let query = build_query_string(query);
    let url = if query.is_empty() { path } else { format!("{path}?{query}") };
    match mode {
        RouterMode::Hash => format!("#{url}"),
        RouterMode::History => url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::params;

    struct Fixed {
        hash: &'static str,
        pathname: &'static str,
        search: &'static str,
    }

    impl Location for Fixed {
        fn hash(&self) -> String {
            self.hash.to_string()
        }
        fn pathname(&self) -> String {
            self.pathname.to_string()
        }
        fn search(&self) -> String {
            self.search.to_string()
        }
        fn set_hash(&self, _hash: &str) {}
        fn push_state(&self, _url: &str) {}
        fn replace_state(&self, _url: &str) {}
    }

    fn at(hash: &'static str, pathname: &'static str, search: &'static str) -> Fixed {
        Fixed { hash, pathname, search }
    }

    #[test]
    fn test_hash_parsing() {
        let parsed = parse_location(RouterMode::Hash, "/", &at("#/products?id=42", "/", ""));
        assert_eq!(parsed.route, "products");
        assert_eq!(parsed.query, params([("id", "42")]));

        let parsed = parse_location(RouterMode::Hash, "/", &at("", "/", ""));
        assert_eq!(parsed.route, "home");

        let parsed = parse_location(RouterMode::Hash, "/", &at("#/admin/users", "/", "?page=2"));
        assert_eq!(parsed.route, "admin/users");
        assert_eq!(parsed.query, params([("page", "2")]));
    }

    #[test]
    fn test_history_parsing() {
        let parsed = parse_location(RouterMode::History, "/app", &at("", "/app/about", "?x=1"));
        assert_eq!(parsed.route, "about");
        assert_eq!(parsed.query, params([("x", "1")]));

        let parsed = parse_location(RouterMode::History, "/", &at("", "/", ""));
        assert_eq!(parsed.route, "home");

        let parsed = parse_location(RouterMode::History, "/app/", &at("", "/app/", ""));
        assert_eq!(parsed.route, "home");
    }

    #[test]
    fn test_build_url() {
        let q = params([("redirect", "dashboard")]);
        assert_eq!(build_url("login", &q, RouterMode::Hash, "/"), "#/login?redirect=dashboard");
        assert_eq!(build_url("home", &QueryParams::new(), RouterMode::Hash, "/"), "#/");
        assert_eq!(build_url("home", &QueryParams::new(), RouterMode::History, "/app"), "/app/");
        assert_eq!(
            build_url("about", &q, RouterMode::History, "/app/"),
            "/app/about?redirect=dashboard"
        );
    }
}
