// Core library for the Vellum router
// Route resolution, component composition, navigation and the managers a
// mounted component talks to

pub mod api;
pub mod cache;
pub mod component;
pub mod components;
pub mod config;
pub mod error;
pub mod error_handler;
pub mod form;
pub mod location;
pub mod logging;
pub mod merge;
pub mod module;
pub mod navigation;
pub mod query;
pub mod render;
pub mod resource;
pub mod route;
pub mod route_loader;
pub mod router;
pub mod scanner;
pub mod script;
pub mod state;

// Re-export commonly used types
pub use api::{ApiHandler, FetchOptions, MultiFetchResult, ParamSource};
pub use cache::{CachedResource, RouterCache};
pub use component::{ComponentContext, ComponentEvent, RenderedComponent, RouterServices};
pub use components::ComponentLoader;
pub use config::{Environment, RouterConfig, RouterMode};
pub use error::{Result, RouterError};
pub use error_handler::{ErrorHandler, ErrorResolution};
pub use form::{FieldValidator, FormHandler, FormSpec, ValidationFailure};
pub use location::{Location, LocationEvent, ParsedLocation, build_url, parse_location};
pub use logging::{LogConfig, LogFormat, LogLevel, LogOutput};
pub use merge::MergedScript;
pub use module::{
    ModuleErrorKind, ModuleExport, ModuleKind, ModuleLoadError, ModuleRequest, ModuleResolver,
    StaticModuleResolver,
};
pub use navigation::{NavigationOutcome, NavigationToken, Navigator, TransitionState};
pub use query::{
    QueryManager, QueryParams, QueryValue, build_query_string, params, parse_query_string,
};
pub use render::{ContainerId, ErrorPage, MountHandle, MountedComponent, RenderRuntime};
pub use resource::{ResourceLoader, merge_layout_with_template};
pub use route::RouteDescriptor;
pub use route_loader::RouteLoader;
pub use router::{Collaborators, Router};
pub use scanner::ComponentScanner;
pub use script::{
    ComponentRegistry, Computed, DataUrl, Hook, HookError, HookPoint, HookResult, LayoutChoice,
    Method, MethodResult, ScriptDefinition, Watcher,
};
pub use state::StateHandler;
