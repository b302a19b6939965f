// Token storage slots

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where an access token is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TokenStorage {
    #[serde(alias = "localStorage")]
    Local,
    #[serde(alias = "sessionStorage")]
    Session,
    Cookie,
}

impl TokenStorage {
    /// Lookup order when reading a token.
    pub const LOOKUP_ORDER: [TokenStorage; 3] =
        [TokenStorage::Local, TokenStorage::Session, TokenStorage::Cookie];

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStorage::Local => "localStorage",
            TokenStorage::Session => "sessionStorage",
            TokenStorage::Cookie => "cookie",
        }
    }
}

/// Backing store for tokens, one value per slot.
pub trait TokenStore: Send + Sync {
    fn get(&self, slot: TokenStorage) -> Option<String>;
    fn set(&self, slot: TokenStorage, token: &str);
    fn remove(&self, slot: TokenStorage);
}

/// Process-local token store.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slots: RwLock<HashMap<TokenStorage, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, slot: TokenStorage) -> Option<String> {
        self.slots.read().get(&slot).cloned()
    }

    fn set(&self, slot: TokenStorage, token: &str) {
        self.slots.write().insert(slot, token.to_string());
    }

    fn remove(&self, slot: TokenStorage) {
        self.slots.write().remove(&slot);
    }
}

/// Build the `Set-Cookie`-style string for a token.
///
/// The cookie carries the JWT expiry when one can be read.
pub fn auth_cookie(name: &str, token: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; path=/; SameSite=Strict",
        name,
        urlencoding::encode(token)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    if let Some(expires) = crate::jwt::expiry(token) {
        cookie.push_str(&format!(
            "; Expires={}",
            expires.format("%a, %d %b %Y %H:%M:%S GMT")
        ));
    }
    cookie
}

/// Read one cookie out of a `document.cookie`-style header.
pub fn cookie_value(cookies: &str, name: &str) -> Option<String> {
    cookies
        .split(';')
        .map(str::trim)
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| urlencoding::decode(value).ok())
        .map(|value| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_value() {
        let cookies = "theme=dark; authToken=abc%20def; other=1";
        assert_eq!(cookie_value(cookies, "authToken"), Some("abc def".to_string()));
        assert_eq!(cookie_value(cookies, "missing"), None);
    }

    #[test]
    fn test_auth_cookie_plain_token() {
        let cookie = auth_cookie("authToken", "opaque", true);
        assert_eq!(cookie, "authToken=opaque; path=/; SameSite=Strict; Secure");
    }

    #[test]
    fn test_storage_names_deserialize() {
        let storage: TokenStorage = serde_json::from_str("\"sessionStorage\"").unwrap();
        assert_eq!(storage, TokenStorage::Session);
        assert_eq!(TokenStorage::Cookie.as_str(), "cookie");
    }
}
