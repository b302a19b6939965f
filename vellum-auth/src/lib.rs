//! Authentication gate for Vellum routes.
//!
//! [`AuthManager`] answers one question for the router: may the user enter
//! this route? It also owns the access token (local, session or cookie slot)
//! and emits login/logout/token events.
//!
//! ```
//! use std::sync::Arc;
//! use vellum_auth::*;
//!
//! # tokio_test::block_on(async {
//! let auth = AuthManager::new(
//!     AuthConfig::enabled().with_protected_prefixes(["admin/"]),
//!     Arc::new(MemoryTokenStore::new()),
//! );
//!
//! let check = auth.check_authentication("admin/users").await;
//! assert!(!check.allowed);
//! assert_eq!(check.reason, AuthReason::NotAuthenticated);
//! # });
//! ```

pub mod config;
pub mod error;
pub mod jwt;
pub mod manager;
pub mod token;

pub use config::AuthConfig;
pub use error::{AuthError, Result};
pub use manager::{
    AuthCheck, AuthEvent, AuthEventKind, AuthGuard, AuthListener, AuthManager, AuthReason,
    AuthStats, ListenerId,
};
pub use token::{MemoryTokenStore, TokenStorage, TokenStore, auth_cookie, cookie_value};
