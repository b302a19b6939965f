//! Router configuration.
//!
//! [`RouterConfig`] deserializes from TOML (or any serde source) with every
//! field optional, and can be built in code with `with_*` methods.
//!
//! ```
//! use vellum_core::config::{Environment, RouterConfig, RouterMode};
//!
//! let config = RouterConfig::from_toml_str(r#"
//!     mode = "history"
//!     environment = "production"
//!     base_path = "/app"
//! "#).unwrap();
//!
//! assert_eq!(config.mode, RouterMode::History);
//! assert_eq!(config.environment, Environment::Production);
//! assert_eq!(config.cache_ttl, 300_000);
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use vellum_auth::{AuthConfig, TokenStorage};
use vellum_cache::{CacheConfig, CacheMode, EvictionPolicy};
use vellum_i18n::I18nConfig;

use crate::logging::{LogConfig, LogLevel};
use crate::{Result, RouterError};

/// Where route resources come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Scripts, templates, styles and layouts are fetched individually.
    #[default]
    Development,
    /// One prebuilt module per route with the template inlined.
    Production,
}

/// URL addressing strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouterMode {
    /// `#/{route}?{query}`
    #[default]
    Hash,
    /// `{base_path}/{route}?{query}`
    History,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub base_path: String,
    pub src_path: String,
    pub mode: RouterMode,
    pub cache_mode: CacheMode,
    /// Milliseconds.
    pub cache_ttl: u64,
    pub max_cache_size: usize,
    pub cache_eviction: EvictionPolicy,
    pub use_layout: bool,
    pub default_layout: String,
    pub environment: Environment,
    pub routes_path: String,
    pub use_i18n: bool,
    pub default_language: String,
    pub i18n_path: String,
    pub log_level: LogLevel,
    pub api_base_url: String,
    /// Milliseconds.
    pub request_timeout: u64,
    /// Milliseconds.
    pub upload_timeout: u64,
    pub auth_enabled: bool,
    pub login_route: String,
    pub protected_routes: Vec<String>,
    pub protected_prefixes: Vec<String>,
    pub public_routes: Vec<String>,
    pub redirect_after_login: String,
    pub auth_cookie_name: String,
    pub auth_storage: TokenStorage,
    /// Scheme and host prefixed onto resolved resource paths.
    pub origin: String,
    /// Component directory below `src_path`.
    pub components_path: String,
    /// Route shown instead of the built-in 404 page.
    pub not_found_route: Option<String>,
    /// Route shown instead of the built-in error page.
    pub error_route: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_path: "/".to_string(),
            src_path: "/src".to_string(),
            mode: RouterMode::Hash,
            cache_mode: CacheMode::Memory,
            cache_ttl: 300_000,
            max_cache_size: 50,
            cache_eviction: EvictionPolicy::LeastRecentlyAccessed,
            use_layout: true,
            default_layout: "default".to_string(),
            environment: Environment::Development,
            routes_path: "/routes".to_string(),
            use_i18n: false,
            default_language: "ko".to_string(),
            i18n_path: "/i18n".to_string(),
            log_level: LogLevel::Info,
            api_base_url: String::new(),
            request_timeout: 30_000,
            upload_timeout: 300_000,
            auth_enabled: false,
            login_route: "login".to_string(),
            protected_routes: Vec::new(),
            protected_prefixes: Vec::new(),
            public_routes: vec!["login".into(), "register".into(), "home".into()],
            redirect_after_login: "home".to_string(),
            auth_cookie_name: "authToken".to_string(),
            auth_storage: TokenStorage::Local,
            origin: "http://localhost".to_string(),
            components_path: "/components".to_string(),
            not_found_route: None,
            error_route: None,
        }
    }
}

impl RouterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RouterError::Config(format!("TOML parse error: {e}")))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RouterError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn with_base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_src_path(mut self, src_path: impl Into<String>) -> Self {
        self.src_path = src_path.into();
        self
    }

    pub fn with_mode(mut self, mode: RouterMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_cache_mode(mut self, mode: CacheMode) -> Self {
        self.cache_mode = mode;
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl.as_millis() as u64;
        self
    }

    pub fn with_max_cache_size(mut self, size: usize) -> Self {
        self.max_cache_size = size;
        self
    }

    pub fn with_layout(mut self, use_layout: bool) -> Self {
        self.use_layout = use_layout;
        self
    }

    pub fn with_default_layout(mut self, layout: impl Into<String>) -> Self {
        self.default_layout = layout.into();
        self
    }

    pub fn with_routes_path(mut self, routes_path: impl Into<String>) -> Self {
        self.routes_path = routes_path.into();
        self
    }

    pub fn with_i18n(mut self, enabled: bool, default_language: impl Into<String>) -> Self {
        self.use_i18n = enabled;
        self.default_language = default_language.into();
        self
    }

    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    pub fn with_auth(mut self, enabled: bool) -> Self {
        self.auth_enabled = enabled;
        self
    }

    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    pub fn with_protected_routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_routes = routes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_protected_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_not_found_route(mut self, route: impl Into<String>) -> Self {
        self.not_found_route = Some(route.into());
        self
    }

    pub fn with_error_route(mut self, route: impl Into<String>) -> Self {
        self.error_route = Some(route.into());
        self
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout)
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_millis(self.upload_timeout)
    }

    /// Turn `path` into an absolute URL.
    ///
    /// `http(s)` URLs pass through. Absolute paths are joined onto the origin
    /// and base path. Relative paths resolve against the directory of
    /// `pathname`.
    pub fn resolve_path(&self, path: &str, pathname: &str) -> String {
        if path.starts_with("http") {
            return path.to_string();
        }
        let origin = self.origin.trim_end_matches('/');

        if path.starts_with('/') {
            if self.base_path.is_empty() || self.base_path == "/" {
                return format!("{origin}{path}");
            }
            let base = self.base_path.trim_end_matches('/');
            return collapse_slashes(&format!("{origin}{base}{path}"));
        }

        let dir = match pathname.rfind('/') {
            Some(idx) => &pathname[..=idx],
            None => "/",
        };
        collapse_slashes(&format!("{origin}{}", normalize_path(&format!("{dir}{path}"))))
    }

    /// Copy of the configuration with `src_path`, `routes_path` and
    /// `i18n_path` resolved to absolute URLs.
    pub fn resolved(&self, pathname: &str) -> Self {
        let mut config = self.clone();
        config.src_path = self.resolve_path(&self.src_path, pathname);
        config.routes_path = self.resolve_path(&self.routes_path, pathname);
        config.i18n_path = self.resolve_path(&self.i18n_path, pathname);
        config
    }

    pub fn to_cache_config(&self) -> CacheConfig {
        CacheConfig::default()
            .with_mode(self.cache_mode)
            .with_ttl(Duration::from_millis(self.cache_ttl))
            .with_max_size(self.max_cache_size)
            .with_eviction(self.cache_eviction)
    }

    pub fn to_auth_config(&self) -> AuthConfig {
        AuthConfig {
            enabled: self.auth_enabled,
            login_route: self.login_route.clone(),
            protected_routes: self.protected_routes.clone(),
            protected_prefixes: self.protected_prefixes.clone(),
            public_routes: self.public_routes.clone(),
            redirect_after_login: self.redirect_after_login.clone(),
            cookie_name: self.auth_cookie_name.clone(),
            storage: self.auth_storage,
        }
    }

    /// Logging setup at the configured level.
    pub fn log_config(&self) -> LogConfig {
        LogConfig::new().level(self.log_level)
    }

    pub fn to_i18n_config(&self) -> I18nConfig {
        I18nConfig::new(self.default_language.clone())
            .with_enabled(self.use_i18n)
            .with_i18n_path(self.i18n_path.clone())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_cache_size == 0 {
            return Err(RouterError::Config("max_cache_size must be at least 1".into()));
        }
        if self.login_route.is_empty() {
            return Err(RouterError::Config("login_route must not be empty".into()));
        }
        if !self.origin.starts_with("http://") && !self.origin.starts_with("https://") {
            return Err(RouterError::Config(format!(
                "origin '{}' is not an http(s) URL",
                self.origin
            )));
        }
        if self.use_i18n && !vellum_i18n::is_valid_language(&self.default_language) {
            return Err(RouterError::Config(format!(
                "default_language '{}' is not a two-letter code",
                self.default_language
            )));
        }
        Ok(())
    }
}

/// Collapse duplicate slashes and resolve `.` and `..` segments.
///
/// The result always starts with `/`. `..` above the root is dropped.
pub fn normalize_path(path: &str) -> String {
    let mut stack: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    format!("/{}", stack.join("/"))
}

fn collapse_slashes(url: &str) -> String {
    let (scheme, rest) = match url.find("://") {
        Some(idx) => url.split_at(idx + 3),
        None => ("", url),
    };
    let mut out = String::with_capacity(url.len());
    out.push_str(scheme);
    let mut prev_slash = false;
    for ch in rest.chars() {
        if ch == '/' && prev_slash {
            continue;
        }
        prev_slash = ch == '/';
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouterConfig::default();
        assert_eq!(config.base_path, "/");
        assert_eq!(config.mode, RouterMode::Hash);
        assert_eq!(config.max_cache_size, 50);
        assert_eq!(config.default_language, "ko");
        assert_eq!(config.public_routes, vec!["login", "register", "home"]);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml() {
        let config = RouterConfig::from_toml_str(
            r#"
            cache_mode = "session"
            max_cache_size = 3
            auth_enabled = true
            protected_prefixes = ["admin/"]
            auth_storage = "sessionStorage"
            log_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.cache_mode, CacheMode::Session);
        assert_eq!(config.max_cache_size, 3);
        assert_eq!(config.auth_storage, TokenStorage::Session);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.login_route, "login");
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        let err = RouterConfig::from_toml_str("mode = 3").unwrap_err();
        assert!(matches!(err, RouterError::Config(_)));
    }

    #[test]
    fn test_resolve_absolute_path() {
        let config = RouterConfig::default();
        assert_eq!(config.resolve_path("/src", "/"), "http://localhost/src");

        let config = config.with_base_path("/app/").with_origin("https://example.com");
        assert_eq!(config.resolve_path("/src", "/app/"), "https://example.com/app/src");
        assert_eq!(config.resolve_path("//src//logic", "/"), "https://example.com/app/src/logic");
    }

    #[test]
    fn test_resolve_relative_and_http() {
        let config = RouterConfig::default();
        assert_eq!(config.resolve_path("./src", "/docs/index.html"), "http://localhost/docs/src");
        assert_eq!(config.resolve_path("../i18n", "/docs/guide/"), "http://localhost/docs/i18n");
        assert_eq!(config.resolve_path("https://cdn.test/src", "/"), "https://cdn.test/src");
    }

    #[test]
    fn test_resolved_config() {
        let config = RouterConfig::default().with_base_path("/app").resolved("/app/");
        assert_eq!(config.src_path, "http://localhost/app/src");
        assert_eq!(config.routes_path, "http://localhost/app/routes");
        assert_eq!(config.i18n_path, "http://localhost/app/i18n");
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/a//b/./c/../d"), "/a/b/d");
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/a/b/"), "/a/b");
        assert_eq!(normalize_path("/../x"), "/x");
    }

    #[test]
    fn test_sub_configs() {
        let config = RouterConfig::default()
            .with_auth(true)
            .with_protected_routes(["dashboard"])
            .with_i18n(true, "en")
            .with_max_cache_size(7);

        let auth = config.to_auth_config();
        assert!(auth.enabled);
        assert!(auth.is_protected("dashboard"));

        let i18n = config.to_i18n_config();
        assert!(i18n.enabled);
        assert_eq!(i18n.default_language, "en");

        assert_eq!(config.to_cache_config().max_size, 7);
    }

    #[test]
    fn test_validate() {
        assert!(RouterConfig::default().with_max_cache_size(0).validate().is_err());
        assert!(RouterConfig::default().with_origin("localhost").validate().is_err());
        assert!(RouterConfig::default().with_i18n(true, "eng").validate().is_err());
    }
}
