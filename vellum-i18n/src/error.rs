//! Error types for i18n operations

use thiserror::Error;

/// Errors that can occur during i18n operations.
#[derive(Debug, Error)]
pub enum I18nError {
    /// Language code is not two lowercase ASCII letters
    #[error("Invalid language code: {0}")]
    InvalidLanguage(String),

    /// Message file could not be loaded
    #[error("Failed to load messages for {language}: {message}")]
    LoadFailed { language: String, message: String },

    /// Message file is not a JSON object
    #[error("Message file for {0} is not a JSON object")]
    NotAnObject(String),

    /// JSON parse error
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Fetch error
    #[error("Fetch error: {0}")]
    Http(#[from] vellum_http::HttpClientError),
}

/// Result type for i18n operations.
pub type Result<T> = std::result::Result<T, I18nError>;
