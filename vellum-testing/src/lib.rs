//! Testing utilities for the Vellum router.
//!
//! Every external capability the router drives has an in-memory stand-in
//! here:
//!
//! - **MockFetcher** - canned HTTP responses keyed by path
//! - **MockModuleResolver** - route, layout and component scripts, with
//!   gates and injected failures
//! - **MockRenderer** - records container, mount and error-page calls
//! - **MockLocation** - `window.location` with recorded history writes
//! - **TestRouterBuilder** - a router wired to all of the above
//!
//! ## Quick Start
//!
//! ```no_run
//! use vellum_core::{NavigationOutcome, RouterConfig, ScriptDefinition};
//! use vellum_testing::*;
//!
//! # tokio_test::block_on(async {
//! let test = TestRouterBuilder::new()
//!     .config(RouterConfig::new().with_layout(false))
//!     .fetcher(MockFetcher::new().with_text("/src/views/home.html", "<h1>Home</h1>"))
//!     .resolver(MockModuleResolver::new().with_route("home", ScriptDefinition::new()))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(test.router.init().await, NavigationOutcome::Rendered);
//! assert_eq!(test.renderer.mounted_routes(), vec!["home"]);
//! # });
//! ```
//!
//! ## Holding a navigation mid-flight
//!
//! ```no_run
//! use vellum_core::ScriptDefinition;
//! use vellum_testing::*;
//!
//! # tokio_test::block_on(async {
//! let resolver = MockModuleResolver::new().with_route("slow", ScriptDefinition::new());
//! let gate = resolver.gate("slow");
//! // ... start navigating to "slow", assert on the in-progress state ...
//! gate.notify_one();
//! # });
//! ```

pub mod fetcher;
pub mod harness;
pub mod location;
pub mod renderer;
pub mod resolver;

pub use fetcher::{MockFetcher, url_path};
pub use harness::{TestRouter, TestRouterBuilder};
pub use location::{LocationWrite, MockLocation};
pub use renderer::{MockRenderer, RenderEvent};
pub use resolver::MockModuleResolver;

pub use vellum_auth::MemoryTokenStore;
