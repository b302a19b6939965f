// Vellum - a file-convention client-side router
//
// Routes map to view templates, logic modules and stylesheets by name,
// composed into layouts and mounted through a pluggable render runtime.

// Re-export core functionality
pub use vellum_core::*;

pub use vellum_cache;

// Re-export optional crates
#[cfg(feature = "http")]
pub use vellum_http;

#[cfg(feature = "auth")]
pub use vellum_auth;

#[cfg(feature = "i18n")]
pub use vellum_i18n;

#[cfg(feature = "testing")]
pub use vellum_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Collaborators,
        ComponentContext,
        Hook,
        HookPoint,
        Location,
        LocationEvent,
        Method,
        ModuleResolver,
        NavigationOutcome,
        RenderRuntime,
        RenderedComponent,
        Router,
        RouterConfig,
        RouterError,
        RouterMode,
        ScriptDefinition,
        params,
    };

    #[cfg(feature = "http")]
    pub use vellum_http::{Fetcher, HttpFetcher};
}
