// Error types for the Vellum router

use thiserror::Error;

use crate::module::ModuleLoadError;

/// Result type for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("Route not found: {route}")]
    RouteNotFound { route: String },

    #[error("Failed to load script for route '{route}': {message}")]
    ScriptLoad { route: String, message: String },

    #[error("Module load error: {0}")]
    ModuleLoad(#[from] ModuleLoadError),

    #[error("Data fetch error: {0}")]
    DataFetch(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Form error: {0}")]
    Form(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cache error: {0}")]
    Cache(#[from] vellum_cache::CacheError),

    #[error("HTTP error: {0}")]
    Http(#[from] vellum_http::HttpClientError),

    #[error("Auth error: {0}")]
    Auth(#[from] vellum_auth::AuthError),
}

impl RouterError {
    pub fn route_not_found(route: impl Into<String>) -> Self {
        Self::RouteNotFound {
            route: route.into(),
        }
    }

    /// Classify a resolver failure for a route script.
    ///
    /// Missing modules and failures whose message reads like a missing
    /// resource become [`RouterError::RouteNotFound`]; anything else is a
    /// [`RouterError::ScriptLoad`].
    pub fn from_script_failure(route: &str, err: ModuleLoadError) -> Self {
        if err.is_not_found() {
            Self::route_not_found(route)
        } else {
            Self::ScriptLoad {
                route: route.to_string(),
                message: err.to_string(),
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RouteNotFound { .. })
    }

    /// Status code used by the error page.
    pub fn status_code(&self) -> u16 {
        if self.is_not_found() { 404 } else { 500 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModuleLoadError;

    #[test]
    fn test_missing_module_is_not_found() {
        let missing = ModuleLoadError::missing("/src/logic/about.js");
        let err = RouterError::from_script_failure("about", missing);
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_message_classification() {
        let err = RouterError::from_script_failure(
            "about",
            ModuleLoadError::failed("Failed to fetch dynamically imported module"),
        );
        assert!(err.is_not_found());

        let broken = ModuleLoadError::failed("SyntaxError: unexpected token");
        let err = RouterError::from_script_failure("about", broken);
        assert!(!err.is_not_found());
        assert_eq!(err.status_code(), 500);
        assert!(err.to_string().contains("unexpected token"));
    }

    #[test]
    fn test_other_errors_are_500() {
        assert_eq!(RouterError::Render("boom".into()).status_code(), 500);
        assert_eq!(RouterError::Config("bad".into()).status_code(), 500);
    }
}
