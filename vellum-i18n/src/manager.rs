//! Language state, message loading and translation.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use vellum_cache::CacheStore;
use vellum_http::{FetchRequest, Fetcher};

use crate::messages::{MessageBundle, interpolate};
use crate::{I18nError, Result, format};

/// Cache key holding the last selected language.
pub const LANGUAGE_CACHE_KEY: &str = "vellum_lang";

/// I18n configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct I18nConfig {
    pub enabled: bool,
    pub default_language: String,
    pub fallback_language: String,
    /// Directory message files are fetched from, as `{path}/{lang}.json`.
    pub i18n_path: String,
}

impl Default for I18nConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_language: "ko".to_string(),
            fallback_language: "ko".to_string(),
            i18n_path: "/i18n".to_string(),
        }
    }
}

impl I18nConfig {
    /// Enabled config whose fallback matches the default language.
    pub fn new(default_language: impl Into<String>) -> Self {
        let language = default_language.into();
        Self {
            fallback_language: language.clone(),
            default_language: language,
            ..Self::default()
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_fallback_language(mut self, language: impl Into<String>) -> Self {
        self.fallback_language = language.into();
        self
    }

    pub fn with_i18n_path(mut self, path: impl Into<String>) -> Self {
        self.i18n_path = path.into();
        self
    }
}

/// Payload of a language change notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageChange {
    pub from: String,
    pub to: String,
    /// The new language's bundle came back empty.
    pub empty: bool,
}

pub type LanguageListener = Arc<dyn Fn(&LanguageChange) + Send + Sync>;

/// Handle returned by [`I18nManager::on_language_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

type PendingLoad = Shared<BoxFuture<'static, Arc<MessageBundle>>>;

/// Two-letter lowercase ASCII code.
pub fn is_valid_language(language: &str) -> bool {
    language.len() == 2 && language.bytes().all(|b| b.is_ascii_lowercase())
}

/// Fetches message files; cloned into in-flight load futures.
#[derive(Clone)]
struct MessageLoader {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<CacheStore<Value>>,
    i18n_path: String,
    fallback_language: String,
}

impl MessageLoader {
    async fn load(self, language: String) -> MessageBundle {
        match self.load_file(&language).await {
            Ok(bundle) => bundle,
            Err(err) => {
                error!(language = %language, error = %err, "Failed to load messages file");
                if language == self.fallback_language {
                    warn!(language = %language, "No messages available, using empty bundle");
                    return MessageBundle::new();
                }
                info!(fallback = %self.fallback_language, "Trying fallback language");
                match self.load_file(&self.fallback_language).await {
                    Ok(bundle) => bundle,
                    Err(err) => {
                        error!(error = %err, "Fallback language also failed");
                        MessageBundle::new()
                    }
                }
            }
        }
    }

    async fn load_file(&self, language: &str) -> Result<MessageBundle> {
        let cache_key = format!("i18n_{language}");
        if let Some(cached) = self.cache.get(&cache_key) {
            debug!(language = %language, "Messages loaded from cache");
            return MessageBundle::from_value(cached)
                .ok_or_else(|| I18nError::NotAnObject(language.to_string()));
        }

        let url = format!("{}/{}.json", self.i18n_path.trim_end_matches('/'), language);
        let response = self.fetcher.fetch(FetchRequest::get(url)).await?;
        if !response.ok() {
            return Err(I18nError::LoadFailed {
                language: language.to_string(),
                message: format!("HTTP error! status: {}", response.status().as_u16()),
            });
        }
        let value: Value = response.json()?;
        let bundle = MessageBundle::from_value(value.clone())
            .ok_or_else(|| I18nError::NotAnObject(language.to_string()))?;
        self.cache.set(cache_key, value);
        Ok(bundle)
    }
}

struct LanguageState {
    current: String,
    messages: HashMap<String, Arc<MessageBundle>>,
}

/// Current language plus loaded message bundles.
///
/// Loads never fail outward: a missing file falls back to the fallback
/// language and finally to an empty bundle, so `t` degrades to returning keys.
pub struct I18nManager {
    config: I18nConfig,
    loader: MessageLoader,
    state: RwLock<LanguageState>,
    in_flight: Mutex<HashMap<String, PendingLoad>>,
    listeners: RwLock<Vec<(ListenerId, LanguageListener)>>,
    next_listener: Mutex<u64>,
}

impl I18nManager {
    pub fn new(
        config: I18nConfig,
        fetcher: Arc<dyn Fetcher>,
        cache: Arc<CacheStore<Value>>,
    ) -> Self {
        let loader = MessageLoader {
            fetcher,
            cache,
            i18n_path: config.i18n_path.clone(),
            fallback_language: config.fallback_language.clone(),
        };
        Self {
            state: RwLock::new(LanguageState {
                current: config.default_language.clone(),
                messages: HashMap::new(),
            }),
            config,
            loader,
            in_flight: Mutex::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            next_listener: Mutex::new(1),
        }
    }

    pub fn config(&self) -> &I18nConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Restore the cached language choice and load its messages.
    pub async fn init(&self) {
        if !self.config.enabled {
            info!("I18n system disabled");
            return;
        }
        if let Some(Value::String(cached)) = self.loader.cache.get(LANGUAGE_CACHE_KEY)
            && is_valid_language(&cached)
        {
            debug!(language = %cached, "Language loaded from cache");
            self.state.write().current = cached;
        }
        let current = self.current_language();
        self.load_messages(&current).await;
    }

    pub fn current_language(&self) -> String {
        self.state.read().current.clone()
    }

    /// Switch language, load its messages and notify listeners.
    pub async fn set_language(&self, language: &str) -> Result<()> {
        if !is_valid_language(language) {
            warn!(language = %language, "Invalid language code");
            return Err(I18nError::InvalidLanguage(language.to_string()));
        }

        let from = {
            let mut state = self.state.write();
            if state.current == language {
                debug!(language = %language, "Language already set");
                return Ok(());
            }
            std::mem::replace(&mut state.current, language.to_string())
        };

        let bundle = self.load_messages(language).await;
        self.loader
            .cache
            .set(LANGUAGE_CACHE_KEY, Value::String(language.to_string()));

        let change = LanguageChange {
            from,
            to: language.to_string(),
            empty: bundle.is_empty(),
        };
        info!(from = %change.from, to = %change.to, "Language changed");
        let listeners: Vec<LanguageListener> =
            self.listeners.read().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            listener(&change);
        }
        Ok(())
    }

    /// Load (or return the already loaded) bundle for a language.
    ///
    /// Concurrent calls for the same language share one fetch.
    pub async fn load_messages(&self, language: &str) -> Arc<MessageBundle> {
        if let Some(bundle) = self.state.read().messages.get(language) {
            return bundle.clone();
        }

        let pending = {
            let mut in_flight = self.in_flight.lock();
            in_flight
                .entry(language.to_string())
                .or_insert_with(|| {
                    let loader = self.loader.clone();
                    let language = language.to_string();
                    async move { Arc::new(loader.load(language).await) }
                        .boxed()
                        .shared()
                })
                .clone()
        };

        let bundle = pending.await;
        self.state
            .write()
            .messages
            .insert(language.to_string(), bundle.clone());
        self.in_flight.lock().remove(language);
        bundle
    }

    /// Translate a key in the current language.
    ///
    /// Falls back to the fallback language, then to the key itself.
    pub fn t(&self, key: &str, params: &Map<String, Value>) -> String {
        if !self.config.enabled {
            return key.to_string();
        }
        let state = self.state.read();
        let Some(messages) = state.messages.get(&state.current) else {
            warn!(language = %state.current, "No messages loaded for current language");
            return key.to_string();
        };

        if let Some(message) = messages.lookup(key).and_then(render) {
            return interpolate(&message, params);
        }
        warn!(key = %key, "Translation not found");

        if state.current != self.config.fallback_language
            && let Some(message) = state
                .messages
                .get(&self.config.fallback_language)
                .and_then(|fallback| fallback.lookup(key))
                .and_then(render)
        {
            return interpolate(&message, params);
        }
        key.to_string()
    }

    /// `{key}.singular` when `count == 1`, else `{key}.plural`, with `count`
    /// available as a placeholder.
    pub fn plural(&self, key: &str, count: i64, params: &Map<String, Value>) -> String {
        let suffix = if count == 1 { "singular" } else { "plural" };
        let mut params = params.clone();
        params.insert("count".to_string(), Value::from(count));
        self.t(&format!("{key}.{suffix}"), &params)
    }

    /// Messages of the current language.
    pub fn messages(&self) -> Arc<MessageBundle> {
        let state = self.state.read();
        state.messages.get(&state.current).cloned().unwrap_or_default()
    }

    pub fn format_number(&self, n: f64) -> String {
        format::format_number(n, &self.current_language())
    }

    pub fn format_date<D: chrono::Datelike>(&self, date: &D) -> String {
        format::format_date(date, &self.current_language())
    }

    /// Drop cached message files. Loaded bundles stay in memory.
    pub fn clear_cache(&self) -> usize {
        let cleared = self.loader.cache.delete_by_pattern("i18n_");
        debug!(cleared, "I18n cache cleared");
        cleared
    }

    pub fn on_language_changed(&self, listener: LanguageListener) -> ListenerId {
        let mut next = self.next_listener.lock();
        let id = ListenerId(*next);
        *next += 1;
        self.listeners.write().push((id, listener));
        id
    }

    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        before != listeners.len()
    }
}

fn render(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
