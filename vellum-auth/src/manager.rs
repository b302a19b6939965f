//! Route authentication gate.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

use crate::config::AuthConfig;
use crate::jwt;
use crate::token::{TokenStorage, TokenStore};
use crate::{AuthError, Result};

/// Application-supplied authentication check, consulted for protected routes
/// instead of the token check.
#[async_trait]
pub trait AuthGuard: Send + Sync {
    /// Whether the current user may enter `route`.
    async fn can_activate(&self, route: &str) -> Result<bool>;
}

/// Why a route was allowed or denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthReason {
    AuthDisabled,
    PublicRoute,
    NotProtected,
    CustomAuthSuccess,
    CustomAuthFailed,
    CustomAuthError,
    Authenticated,
    NotAuthenticated,
}

impl AuthReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthReason::AuthDisabled => "auth_disabled",
            AuthReason::PublicRoute => "public_route",
            AuthReason::NotProtected => "not_protected",
            AuthReason::CustomAuthSuccess => "custom_auth_success",
            AuthReason::CustomAuthFailed => "custom_auth_failed",
            AuthReason::CustomAuthError => "custom_auth_error",
            AuthReason::Authenticated => "authenticated",
            AuthReason::NotAuthenticated => "not_authenticated",
        }
    }
}

/// Outcome of [`AuthManager::check_authentication`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthCheck {
    pub allowed: bool,
    pub reason: AuthReason,
    pub route: String,
}

impl AuthCheck {
    fn new(route: &str, allowed: bool, reason: AuthReason) -> Self {
        Self {
            allowed,
            reason,
            route: route.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEventKind {
    TokenSet,
    TokenRemoved,
    LoginSuccess,
    Logout,
    AuthRequired,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthEvent {
    pub kind: AuthEventKind,
    pub timestamp: i64,
    pub data: serde_json::Value,
}

pub type AuthListener = Arc<dyn Fn(&AuthEvent) + Send + Sync>;

/// Handle returned by [`AuthManager::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStats {
    pub enabled: bool,
    pub is_authenticated: bool,
    pub has_token: bool,
    pub protected_routes_count: usize,
    pub protected_prefixes_count: usize,
    pub public_routes_count: usize,
    pub storage: TokenStorage,
    pub login_route: String,
}

/// Decides whether routes may be entered and owns the access token.
pub struct AuthManager {
    config: AuthConfig,
    tokens: Arc<dyn TokenStore>,
    guard: Option<Arc<dyn AuthGuard>>,
    listeners: RwLock<Vec<(ListenerId, AuthEventKind, AuthListener)>>,
    next_listener: AtomicU64,
}

impl AuthManager {
    pub fn new(config: AuthConfig, tokens: Arc<dyn TokenStore>) -> Self {
        info!(enabled = config.enabled, "AuthManager initialized");
        Self {
            config,
            tokens,
            guard: None,
            listeners: RwLock::new(Vec::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    /// Use a custom check for protected routes.
    pub fn with_guard(mut self, guard: Arc<dyn AuthGuard>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn login_route(&self) -> &str {
        &self.config.login_route
    }

    /// Gate a route.
    ///
    /// Disabled auth, public routes and unprotected routes always pass. For
    /// protected routes the custom guard decides when present (an error from
    /// it denies), otherwise a valid stored token does.
    pub async fn check_authentication(&self, route: &str) -> AuthCheck {
        if !self.config.enabled {
            return AuthCheck::new(route, true, AuthReason::AuthDisabled);
        }
        debug!(route = %route, "Checking authentication");

        if self.config.is_public(route) {
            return AuthCheck::new(route, true, AuthReason::PublicRoute);
        }
        if !self.config.is_protected(route) {
            return AuthCheck::new(route, true, AuthReason::NotProtected);
        }

        if let Some(guard) = &self.guard {
            return match guard.can_activate(route).await {
                Ok(true) => AuthCheck::new(route, true, AuthReason::CustomAuthSuccess),
                Ok(false) => AuthCheck::new(route, false, AuthReason::CustomAuthFailed),
                Err(err) => {
                    error!(route = %route, error = %err, "Custom auth check failed");
                    AuthCheck::new(route, false, AuthReason::CustomAuthError)
                }
            };
        }

        if self.is_authenticated() {
            AuthCheck::new(route, true, AuthReason::Authenticated)
        } else {
            AuthCheck::new(route, false, AuthReason::NotAuthenticated)
        }
    }

    /// A valid token is present. An expired token is removed.
    pub fn is_authenticated(&self) -> bool {
        let Some(token) = self.access_token() else {
            debug!("No token found");
            return false;
        };
        if !jwt::is_token_valid(&token) {
            debug!("Token expired, removing");
            self.remove_access_token(None);
            return false;
        }
        true
    }

    /// First token found in local, then session, then cookie storage.
    pub fn access_token(&self) -> Option<String> {
        TokenStorage::LOOKUP_ORDER
            .iter()
            .find_map(|slot| self.tokens.get(*slot).filter(|t| !t.is_empty()))
    }

    /// Store a token after checking it is not empty or expired.
    pub fn set_access_token(&self, token: &str, storage: Option<TokenStorage>) -> Result<()> {
        if token.is_empty() {
            warn!("Empty token provided");
            return Err(AuthError::EmptyToken);
        }
        if let Err(err) = jwt::validate(token, chrono::Utc::now()) {
            warn!(error = %err, "Token is expired or invalid");
            return Err(err);
        }

        let storage = storage.unwrap_or(self.config.storage);
        self.tokens.set(storage, token);
        self.emit(
            AuthEventKind::TokenSet,
            serde_json::json!({
                "storage": storage.as_str(),
                "tokenLength": token.len(),
                "hasExpiration": token.contains('.'),
            }),
        );
        Ok(())
    }

    /// Remove the token from one slot, or from all of them with `None`.
    pub fn remove_access_token(&self, storage: Option<TokenStorage>) {
        match storage {
            Some(slot) => self.tokens.remove(slot),
            None => TokenStorage::LOOKUP_ORDER
                .iter()
                .for_each(|slot| self.tokens.remove(*slot)),
        }
        let name = storage.map(|s| s.as_str()).unwrap_or("all");
        debug!(storage = name, "Token removed");
        self.emit(AuthEventKind::TokenRemoved, serde_json::json!({ "storage": name }));
    }

    /// Record a login and return the route to continue to.
    pub fn login_success(&self, target: Option<&str>) -> String {
        let redirect = target
            .filter(|t| !t.is_empty())
            .unwrap_or(&self.config.redirect_after_login)
            .to_string();
        info!(target = %redirect, "Login success");
        self.emit(
            AuthEventKind::LoginSuccess,
            serde_json::json!({ "targetRoute": redirect }),
        );
        redirect
    }

    /// Drop all tokens and return the login route.
    pub fn logout(&self) -> String {
        info!("Logging out user");
        self.remove_access_token(None);
        self.emit(AuthEventKind::Logout, serde_json::json!({}));
        self.config.login_route.clone()
    }

    pub fn on(&self, kind: AuthEventKind, listener: AuthListener) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, kind, listener));
        id
    }

    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _, _)| *existing != id);
        listeners.len() != before
    }

    /// Notify listeners registered for `kind`.
    pub fn emit(&self, kind: AuthEventKind, data: serde_json::Value) {
        let event = AuthEvent {
            kind,
            timestamp: chrono::Utc::now().timestamp_millis(),
            data,
        };
        let targets: Vec<AuthListener> = self
            .listeners
            .read()
            .iter()
            .filter(|(_, k, _)| *k == kind)
            .map(|(_, _, listener)| listener.clone())
            .collect();
        for listener in targets {
            listener(&event);
        }
        debug!(kind = ?kind, "Auth event emitted");
    }

    pub fn stats(&self) -> AuthStats {
        AuthStats {
            enabled: self.config.enabled,
            is_authenticated: self.is_authenticated(),
            has_token: self.access_token().is_some(),
            protected_routes_count: self.config.protected_routes.len(),
            protected_prefixes_count: self.config.protected_prefixes.len(),
            public_routes_count: self.config.public_routes.len(),
            storage: self.config.storage,
            login_route: self.config.login_route.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::MemoryTokenStore;
    use parking_lot::Mutex;

    fn manager(config: AuthConfig) -> AuthManager {
        AuthManager::new(config, Arc::new(MemoryTokenStore::new()))
    }

    struct FixedGuard(Option<bool>);

    #[async_trait]
    impl AuthGuard for FixedGuard {
        async fn can_activate(&self, _route: &str) -> Result<bool> {
            self.0
                .ok_or_else(|| AuthError::CheckFailed("backend down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_disabled_allows_everything() {
        let auth = manager(AuthConfig::default().with_protected_routes(["admin"]));
        let check = auth.check_authentication("admin").await;
        assert!(check.allowed);
        assert_eq!(check.reason, AuthReason::AuthDisabled);
    }

    #[tokio::test]
    async fn test_public_and_unprotected_routes() {
        let auth = manager(AuthConfig::enabled().with_protected_prefixes(["admin/"]));
        assert_eq!(auth.check_authentication("home").await.reason, AuthReason::PublicRoute);
        assert_eq!(auth.check_authentication("about").await.reason, AuthReason::NotProtected);

        let check = auth.check_authentication("admin/users").await;
        assert!(!check.allowed);
        assert_eq!(check.reason, AuthReason::NotAuthenticated);
    }

    #[tokio::test]
    async fn test_token_grants_access() {
        let auth = manager(AuthConfig::enabled().with_protected_routes(["dashboard"]));
        auth.set_access_token("opaque", None).unwrap();
        let check = auth.check_authentication("dashboard").await;
        assert!(check.allowed);
        assert_eq!(check.reason, AuthReason::Authenticated);
    }

    #[tokio::test]
    async fn test_custom_guard() {
        let config = AuthConfig::enabled().with_protected_routes(["dashboard"]);
        let ok = manager(config.clone()).with_guard(Arc::new(FixedGuard(Some(true))));
        let denied = manager(config.clone()).with_guard(Arc::new(FixedGuard(Some(false))));
        let broken = manager(config).with_guard(Arc::new(FixedGuard(None)));

        let allowed = ok.check_authentication("dashboard").await;
        assert_eq!(allowed.reason, AuthReason::CustomAuthSuccess);
        let rejected = denied.check_authentication("dashboard").await;
        assert_eq!(rejected.reason, AuthReason::CustomAuthFailed);
        let check = broken.check_authentication("dashboard").await;
        assert!(!check.allowed);
        assert_eq!(check.reason, AuthReason::CustomAuthError);
    }

    #[test]
    fn test_token_lookup_order() {
        let store = Arc::new(MemoryTokenStore::new());
        let auth = AuthManager::new(AuthConfig::enabled(), store.clone());
        store.set(TokenStorage::Cookie, "from-cookie");
        assert_eq!(auth.access_token().as_deref(), Some("from-cookie"));
        store.set(TokenStorage::Session, "from-session");
        assert_eq!(auth.access_token().as_deref(), Some("from-session"));
        store.set(TokenStorage::Local, "from-local");
        assert_eq!(auth.access_token().as_deref(), Some("from-local"));

        auth.remove_access_token(None);
        assert_eq!(auth.access_token(), None);
    }

    #[test]
    fn test_expired_token_rejected_and_purged() {
        let store = Arc::new(MemoryTokenStore::new());
        let auth = AuthManager::new(AuthConfig::enabled(), store.clone());
        let expired = jwt::make_token(serde_json::json!({"exp": 1}));

        assert!(matches!(auth.set_access_token(&expired, None), Err(AuthError::TokenExpired)));
        store.set(TokenStorage::Session, &expired);
        assert!(!auth.is_authenticated());
        assert_eq!(store.get(TokenStorage::Session), None);
    }

    #[test]
    fn test_login_logout_events() {
        let auth = manager(AuthConfig::enabled().with_redirect_after_login("dashboard"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let id = auth.on(
            AuthEventKind::LoginSuccess,
            Arc::new(move |event: &AuthEvent| sink.lock().push(event.data.clone())),
        );

        assert_eq!(auth.login_success(None), "dashboard");
        assert_eq!(auth.login_success(Some("profile")), "profile");
        assert!(auth.off(id));
        auth.login_success(None);

        let seen = seen.lock();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1]["targetRoute"], "profile");
        assert_eq!(auth.logout(), "login");
    }

    #[test]
    fn test_stats() {
        let auth = manager(AuthConfig::enabled().with_protected_routes(["a", "b"]));
        let stats = auth.stats();
        assert!(stats.enabled);
        assert!(!stats.has_token);
        assert_eq!(stats.protected_routes_count, 2);
        assert_eq!(stats.public_routes_count, 3);
    }
}
