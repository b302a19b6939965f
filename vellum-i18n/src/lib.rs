//! Internationalization for Vellum.
//!
//! Message files are JSON objects fetched from `{i18n_path}/{lang}.json`,
//! cached under `i18n_{lang}`, and queried by dot path.
//!
//! - [`I18nManager::t`] - translation with `{name}` interpolation
//! - [`I18nManager::plural`] - `.singular` / `.plural` selection
//! - [`format_number`] / [`format_date`] - language-aware formatting

pub mod error;
pub mod format;
pub mod manager;
pub mod messages;

pub use error::{I18nError, Result};
pub use format::{format_date, format_number};
pub use manager::{
    I18nConfig, I18nManager, LANGUAGE_CACHE_KEY, LanguageChange, LanguageListener, ListenerId,
    is_valid_language,
};
pub use messages::{MessageBundle, interpolate};
