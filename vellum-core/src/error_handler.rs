//! Route error presentation.

use std::sync::Arc;
use tracing::{error, warn};

use crate::RouterError;
use crate::config::RouterConfig;
use crate::render::{ErrorPage, RenderRuntime};

/// How a route error was surfaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorResolution {
    /// Navigate to this configured error route.
    Redirect(String),
    /// The built-in error page was rendered.
    Rendered(ErrorPage),
}

pub struct ErrorHandler {
    config: Arc<RouterConfig>,
    renderer: Arc<dyn RenderRuntime>,
}

impl ErrorHandler {
    pub fn new(config: Arc<RouterConfig>, renderer: Arc<dyn RenderRuntime>) -> Self {
        Self { config, renderer }
    }

    /// Build the error page for `err`.
    pub fn error_page(err: &RouterError, route: &str) -> ErrorPage {
        let code = err.status_code();
        let (title, message) = if err.is_not_found() {
            ("Page Not Found".to_string(), format!("The page '{route}' could not be found."))
        } else {
            ("Something went wrong".to_string(), err.to_string())
        };
        ErrorPage {
            code,
            title,
            message,
            route: route.to_string(),
        }
    }

    /// Surface a resolution or mount failure for `route`.
    ///
    /// A configured not-found or error route is preferred unless it is the
    /// route that failed.
    pub async fn handle_route_error(&self, err: &RouterError, route: &str) -> ErrorResolution {
        let code = err.status_code();
        if err.is_not_found() {
            warn!(route, code, error = %err, "Route not found");
        } else {
            error!(route, code, error = %err, "Route failed to load");
        }

        let target = if err.is_not_found() {
            self.config.not_found_route.as_deref()
        } else {
            self.config.error_route.as_deref()
        };
        if let Some(target) = target.filter(|target| *target != route) {
            return ErrorResolution::Redirect(target.to_string());
        }

        let page = Self::error_page(err, route);
        self.renderer.show_error(page.clone()).await;
        ErrorResolution::Rendered(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_page_codes() {
        let page = ErrorHandler::error_page(&RouterError::route_not_found("ghost"), "ghost");
        assert_eq!(page.code, 404);
        assert!(page.message.contains("ghost"));

        let page = ErrorHandler::error_page(&RouterError::Render("mount exploded".into()), "home");
        assert_eq!(page.code, 500);
        assert!(page.message.contains("mount exploded"));
    }
}
