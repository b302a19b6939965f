// Authentication configuration

use serde::{Deserialize, Serialize};

use crate::token::TokenStorage;

/// Which routes are gated and where to send unauthenticated users.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub enabled: bool,
    pub login_route: String,
    pub protected_routes: Vec<String>,
    pub protected_prefixes: Vec<String>,
    pub public_routes: Vec<String>,
    pub redirect_after_login: String,
    pub cookie_name: String,
    pub storage: TokenStorage,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            login_route: "login".to_string(),
            protected_routes: Vec::new(),
            protected_prefixes: Vec::new(),
            public_routes: vec!["login".into(), "register".into(), "home".into()],
            redirect_after_login: "home".to_string(),
            cookie_name: "authToken".to_string(),
            storage: TokenStorage::Local,
        }
    }
}

impl AuthConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
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

    pub fn with_public_routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.public_routes = routes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_login_route(mut self, route: impl Into<String>) -> Self {
        self.login_route = route.into();
        self
    }

    pub fn with_redirect_after_login(mut self, route: impl Into<String>) -> Self {
        self.redirect_after_login = route.into();
        self
    }

    pub fn with_storage(mut self, storage: TokenStorage) -> Self {
        self.storage = storage;
        self
    }

    pub fn is_public(&self, route: &str) -> bool {
        self.public_routes.iter().any(|r| r == route)
    }

    /// Listed explicitly, or under one of the protected prefixes.
    pub fn is_protected(&self, route: &str) -> bool {
        self.protected_routes.iter().any(|r| r == route)
            || self.protected_prefixes.iter().any(|p| route.starts_with(p.as_str()))
    }
}
