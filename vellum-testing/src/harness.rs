// Test router builder

use std::sync::Arc;
use vellum_auth::{AuthGuard, MemoryTokenStore, TokenStore};
use vellum_core::{Collaborators, Result, Router, RouterConfig};

use crate::{MockFetcher, MockLocation, MockModuleResolver, MockRenderer};

/// A router wired to mocks, with the mocks kept at hand for assertions.
pub struct TestRouter {
    pub router: Router,
    pub fetcher: Arc<MockFetcher>,
    pub resolver: Arc<MockModuleResolver>,
    pub renderer: MockRenderer,
    pub location: Arc<MockLocation>,
    pub tokens: Arc<MemoryTokenStore>,
}

impl TestRouter {
    /// Store a token in the configured slot.
    pub fn login(&self, token: &str) {
        self.tokens.set(self.router.config().auth_storage, token);
    }
}

/// Builder for [`TestRouter`].
pub struct TestRouterBuilder {
    config: RouterConfig,
    fetcher: MockFetcher,
    resolver: MockModuleResolver,
    location: MockLocation,
    guard: Option<Arc<dyn AuthGuard>>,
}

impl Default for TestRouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestRouterBuilder {
    pub fn new() -> Self {
        Self {
            config: RouterConfig::new(),
            fetcher: MockFetcher::new(),
            resolver: MockModuleResolver::new(),
            location: MockLocation::with_hash("#/"),
            guard: None,
        }
    }

    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn fetcher(mut self, fetcher: MockFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn resolver(mut self, resolver: MockModuleResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn location(mut self, location: MockLocation) -> Self {
        self.location = location;
        self
    }

    pub fn auth_guard(mut self, guard: Arc<dyn AuthGuard>) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn build(self) -> Result<TestRouter> {
        let fetcher = Arc::new(self.fetcher);
        let resolver = Arc::new(self.resolver);
        let renderer = MockRenderer::new();
        let location = Arc::new(self.location);
        let tokens = Arc::new(MemoryTokenStore::new());

        let mut collaborators = Collaborators::new(
            fetcher.clone(),
            resolver.clone(),
            Arc::new(renderer.clone()),
            location.clone(),
        )
        .with_token_store(tokens.clone());
        if let Some(guard) = self.guard {
            collaborators = collaborators.with_auth_guard(guard);
        }

        let router = Router::new(self.config, collaborators)?;
        Ok(TestRouter {
            router,
            fetcher,
            resolver,
            renderer,
            location,
            tokens,
        })
    }
}
