//! The router facade.
//!
//! [`Router`] wires the loaders, managers and collaborators together and
//! runs the navigation state machine:
//!
//! 1. parse the location into a route and query
//! 2. drop the trigger if a transition is running, skip it if nothing changed
//! 3. run the auth gate, redirecting to the login route when denied
//! 4. resolve the route and mount it into a fresh container
//! 5. unmount the previous component on the runtime's next frame

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use vellum_auth::{AuthEventKind, AuthGuard, AuthManager, MemoryTokenStore, TokenStore};
use vellum_cache::{CacheStore, SessionStorage};
use vellum_http::Fetcher;
use vellum_i18n::I18nManager;

use crate::api::ApiHandler;
use crate::cache::RouterCache;
use crate::component::{ComponentContext, RenderedComponent, RouterServices};
use crate::config::{RouterConfig, RouterMode};
use crate::error_handler::{ErrorHandler, ErrorResolution};
use crate::form::{FormHandler, FormSpec};
use crate::location::{Location, LocationEvent, build_url, parse_location, route_path};
use crate::module::ModuleResolver;
use crate::navigation::{
    Generation, NavigationOutcome, Navigator, TransitionMachine, TransitionState,
};
use crate::query::{QueryManager, QueryParams, params};
use crate::render::{MountedComponent, RenderRuntime};
use crate::route_loader::RouteLoader;
use crate::script::HookPoint;
use crate::state::StateHandler;
use crate::{Result, RouterError};

/// External capabilities the router drives.
#[derive(Clone)]
pub struct Collaborators {
    pub fetcher: Arc<dyn Fetcher>,
    pub resolver: Arc<dyn ModuleResolver>,
    pub renderer: Arc<dyn RenderRuntime>,
    pub location: Arc<dyn Location>,
    pub tokens: Arc<dyn TokenStore>,
    pub auth_guard: Option<Arc<dyn AuthGuard>>,
    pub session_storage: Option<Arc<dyn SessionStorage>>,
}

impl Collaborators {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        resolver: Arc<dyn ModuleResolver>,
        renderer: Arc<dyn RenderRuntime>,
        location: Arc<dyn Location>,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            renderer,
            location,
            tokens: Arc::new(MemoryTokenStore::new()),
            auth_guard: None,
            session_storage: None,
        }
    }

    pub fn with_token_store(mut self, tokens: Arc<dyn TokenStore>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Custom check consulted for protected routes.
    pub fn with_auth_guard(mut self, guard: Arc<dyn AuthGuard>) -> Self {
        self.auth_guard = Some(guard);
        self
    }

    /// Backing store for `CacheMode::Session`.
    pub fn with_session_storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.session_storage = Some(storage);
        self
    }
}

struct RouterInner {
    config: Arc<RouterConfig>,
    cache: Arc<RouterCache>,
    loader: RouteLoader,
    query: Arc<QueryManager>,
    api: Arc<ApiHandler>,
    auth: Option<Arc<AuthManager>>,
    i18n: Option<Arc<I18nManager>>,
    state: Arc<StateHandler>,
    forms: FormHandler,
    errors: ErrorHandler,
    renderer: Arc<dyn RenderRuntime>,
    location: Arc<dyn Location>,
    services: RouterServices,
    transition: TransitionMachine,
    generation: Generation,
    current_route: RwLock<Option<String>>,
    current_mount: Mutex<Option<MountedComponent>>,
    /// Target of the running `navigate_to`; its route params survive the
    /// route change.
    pending_route: Mutex<Option<String>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Navigation seen from inside components; holds the router weakly.
struct RouterNavigator {
    inner: Weak<RouterInner>,
}

#[async_trait]
impl Navigator for RouterNavigator {
    async fn navigate_to(&self, route: &str, params: Option<QueryParams>) -> NavigationOutcome {
        match self.inner.upgrade() {
            Some(inner) => inner.navigate_to(route, params).await,
            None => NavigationOutcome::Dropped,
        }
    }

    fn current_route(&self) -> String {
        self.inner
            .upgrade()
            .and_then(|inner| inner.current_route.read().clone())
            .unwrap_or_default()
    }
}

/// Client-side router. Cheap to clone.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    /// Build a router. Paths in `config` are resolved against the
    /// location's current pathname.
    pub fn new(config: RouterConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config.resolved(&collaborators.location.pathname()));

        let mut cache = RouterCache::new(config.to_cache_config());
        let mut i18n_cache =
            CacheStore::<Value>::new(config.to_cache_config().with_key_prefix("vellum_i18n_"));
        if let Some(storage) = &collaborators.session_storage {
            cache = cache.with_storage(storage.clone());
            i18n_cache = i18n_cache.with_storage(storage.clone());
        }
        let cache = Arc::new(cache);

        let auth = config.auth_enabled.then(|| {
            let mut manager =
                AuthManager::new(config.to_auth_config(), collaborators.tokens.clone());
            if let Some(guard) = &collaborators.auth_guard {
                manager = manager.with_guard(guard.clone());
            }
            Arc::new(manager)
        });
        let i18n = config.use_i18n.then(|| {
            Arc::new(I18nManager::new(
                config.to_i18n_config(),
                collaborators.fetcher.clone(),
                Arc::new(i18n_cache),
            ))
        });

        let query = Arc::new(QueryManager::new());
        let api = Arc::new(ApiHandler::new(
            config.clone(),
            collaborators.fetcher.clone(),
            query.clone(),
            auth.clone(),
        ));
        let state = Arc::new(StateHandler::new());
        let generation = Generation::new();

        let inner = Arc::new_cyclic(|weak: &Weak<RouterInner>| {
            let navigator = Arc::new(RouterNavigator { inner: weak.clone() });
            let mut services =
                RouterServices::new(config.clone(), query.clone(), api.clone(), navigator)
                    .with_state(state.clone())
                    .with_generation(generation.clone());
            if let Some(auth) = &auth {
                services = services.with_auth(auth.clone());
            }
            if let Some(i18n) = &i18n {
                services = services.with_i18n(i18n.clone());
            }

            RouterInner {
                loader: RouteLoader::new(
                    config.clone(),
                    collaborators.fetcher.clone(),
                    collaborators.resolver.clone(),
                    cache.clone(),
                ),
                forms: FormHandler::new(config.clone(), collaborators.fetcher.clone()),
                errors: ErrorHandler::new(config.clone(), collaborators.renderer.clone()),
                renderer: collaborators.renderer.clone(),
                location: collaborators.location.clone(),
                config: config.clone(),
                cache,
                query,
                api,
                auth,
                i18n,
                state,
                services,
                transition: TransitionMachine::new(),
                generation,
                current_route: RwLock::new(None),
                current_mount: Mutex::new(None),
                pending_route: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
            }
        });

        info!(
            mode = ?inner.config.mode,
            environment = ?inner.config.environment,
            auth = inner.auth.is_some(),
            i18n = inner.i18n.is_some(),
            "Router created"
        );
        Ok(Self { inner })
    }

    /// Restore the language and render the initial location.
    pub async fn init(&self) -> NavigationOutcome {
        let inner = &self.inner;
        if let Some(i18n) = &inner.i18n {
            i18n.init().await;
        }
        match inner.config.mode {
            RouterMode::Hash if inner.location.hash().is_empty() => {
                inner.location.set_hash("#/");
                inner.handle_route_change().await
            }
            RouterMode::History if inner.location.pathname() == "/" => {
                inner.navigate_to("home", None).await
            }
            _ => inner.handle_route_change().await,
        }
    }

    /// Navigate to `route`, with `params` as route parameters.
    pub async fn navigate_to(&self, route: &str, params: Option<QueryParams>) -> NavigationOutcome {
        self.inner.navigate_to(route, params).await
    }

    /// Re-read the location after a browser event.
    pub async fn handle_location_event(&self, event: LocationEvent) -> NavigationOutcome {
        match (self.inner.config.mode, event) {
            (RouterMode::Hash, LocationEvent::HashChange)
            | (RouterMode::History, LocationEvent::PopState) => {
                self.inner.handle_route_change().await
            }
            _ => {
                debug!(?event, "Location event ignored in this mode");
                NavigationOutcome::Unchanged
            }
        }
    }

    /// Feed browser events from `events` into the router until the sender
    /// is dropped.
    pub fn spawn_event_loop(&self, mut events: mpsc::Receiver<LocationEvent>) -> JoinHandle<()> {
        let router = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let outcome = router.handle_location_event(event).await;
                debug!(?event, ?outcome, "Location event handled");
            }
            debug!("Location event loop stopped");
        })
    }

    pub fn current_route(&self) -> String {
        self.inner.current_route.read().clone().unwrap_or_default()
    }

    pub fn transition_state(&self) -> TransitionState {
        self.inner.transition.state()
    }

    /// Context of the mounted component.
    pub fn current_component(&self) -> Option<ComponentContext> {
        self.inner.current_mount.lock().as_ref().map(|mount| mount.ctx.clone())
    }

    /// Resolve a route without mounting it.
    pub async fn resolve_route(&self, route: &str) -> Result<Arc<RenderedComponent>> {
        self.inner.loader.resolve_route(route).await
    }

    /// Merge `params` into the query and sync the URL.
    pub fn set_query_params(&self, params: QueryParams, replace: bool) {
        self.inner.query.set_query_params(params, replace);
        self.inner.sync_query_url();
    }

    pub fn remove_query_params<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.inner.query.remove_query_params(keys);
        self.inner.sync_query_url();
    }

    pub fn clear_query_params(&self) {
        self.inner.query.clear_query_params();
        self.inner.sync_query_url();
    }

    /// Submit a form on behalf of the mounted component.
    pub async fn submit_form(&self, form: &FormSpec) -> Result<Value> {
        let ctx = self
            .current_component()
            .ok_or_else(|| RouterError::Form("No component is mounted".into()))?;
        self.inner.forms.submit(form, &ctx).await
    }

    /// Spawned cleanup and data-fetch tasks still held by the router.
    /// Finished tasks are dropped on the next spawn.
    pub fn tracked_tasks(&self) -> usize {
        self.inner.tasks.lock().len()
    }

    /// Wait for spawned cleanup and data-fetch tasks.
    pub async fn settle(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.inner.tasks.lock());
            if tasks.is_empty() {
                break;
            }
            for task in tasks {
                if let Err(err) = task.await {
                    warn!(error = %err, "Router task failed");
                }
            }
        }
    }

    /// Unmount everything and reset caches and state.
    pub async fn destroy(&self) {
        let inner = &self.inner;
        for task in std::mem::take(&mut *inner.tasks.lock()) {
            task.abort();
        }
        let mount = inner.current_mount.lock().take();
        if let Some(mount) = mount {
            mount.unmount().await;
        }
        inner.generation.advance();

        let cleared = inner.cache.clear();
        inner.loader.components().clear_components();
        if let Some(i18n) = &inner.i18n {
            i18n.clear_cache();
        }
        inner.query.reset();
        inner.state.destroy();
        inner.renderer.clear();
        *inner.current_route.write() = None;
        info!(cleared, "Router destroyed");
    }

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    pub fn cache(&self) -> &RouterCache {
        &self.inner.cache
    }

    pub fn route_loader(&self) -> &RouteLoader {
        &self.inner.loader
    }

    pub fn query(&self) -> &QueryManager {
        &self.inner.query
    }

    pub fn api(&self) -> &ApiHandler {
        &self.inner.api
    }

    pub fn state(&self) -> &StateHandler {
        &self.inner.state
    }

    pub fn forms(&self) -> &FormHandler {
        &self.inner.forms
    }

    pub fn auth(&self) -> Option<&AuthManager> {
        self.inner.auth.as_deref()
    }

    pub fn i18n(&self) -> Option<&I18nManager> {
        self.inner.i18n.as_deref()
    }

    pub fn services(&self) -> &RouterServices {
        &self.inner.services
    }
}

impl RouterInner {
    fn navigate_to<'a>(
        &'a self,
        route: &'a str,
        params: Option<QueryParams>,
    ) -> BoxFuture<'a, NavigationOutcome> {
        async move {
            if self.transition.is_in_progress() {
                debug!(route, "Navigation dropped, transition in progress");
                return NavigationOutcome::Dropped;
            }

            let current = self.current_route.read().clone();
            if current.as_deref() != Some(route) {
                self.query.clear_query_params();
            }
            self.query.set_current_route_params(params.clone());
            *self.pending_route.lock() = Some(route.to_string());
            self.update_url(route, params.as_ref());
            self.handle_route_change().await
        }
        .boxed()
    }

    fn update_url(&self, route: &str, params: Option<&QueryParams>) {
        let query = match params {
            Some(params) => params.clone(),
            None => self.query.query_params(),
        };
        let url = build_url(route, &query, self.config.mode, &self.config.base_path);

        match self.config.mode {
            RouterMode::Hash => {
                if self.location.hash() != url {
                    self.location.set_hash(&url);
                }
            }
            RouterMode::History => {
                let current = format!("{}{}", self.location.pathname(), self.location.search());
                if current == url {
                    return;
                }
                let path = route_path(route, self.config.mode, &self.config.base_path);
                if self.location.pathname() == path {
                    self.location.replace_state(&url);
                } else {
                    self.location.push_state(&url);
                }
            }
        }
    }

    /// Write the current route and query back to the URL without
    /// navigating.
    fn sync_query_url(&self) {
        let Some(route) = self.current_route.read().clone() else {
            return;
        };
        let url = build_url(
            &route,
            &self.query.query_params(),
            self.config.mode,
            &self.config.base_path,
        );
        match self.config.mode {
            RouterMode::Hash if self.location.hash() != url => self.location.set_hash(&url),
            RouterMode::History => self.location.replace_state(&url),
            RouterMode::Hash => {}
        }
    }

    fn handle_route_change(&self) -> BoxFuture<'_, NavigationOutcome> {
        async move {
            let parsed = parse_location(self.config.mode, &self.config.base_path, &*self.location);
            let pending = self.pending_route.lock().take();

            if self.transition.is_in_progress() {
                debug!(route = %parsed.route, "Route change dropped, transition in progress");
                return NavigationOutcome::Dropped;
            }
            let unchanged = self.current_route.read().as_deref() == Some(parsed.route.as_str())
                && !self.query.has_query_params_changed(&parsed.query);
            if unchanged {
                return NavigationOutcome::Unchanged;
            }
            let Some(guard) = self.transition.try_begin() else {
                return NavigationOutcome::Dropped;
            };

            let route_changed = self.current_route.read().as_deref() != Some(parsed.route.as_str());
            if route_changed && pending.as_deref() != Some(parsed.route.as_str()) {
                self.query.set_current_route_params(None);
            }
            self.query.set_current_query_params(parsed.query);
            *self.current_route.write() = Some(parsed.route.clone());
            let generation = self.generation.advance();
            debug!(route = %parsed.route, generation, "Route change");

            let route = parsed.route;
            if let Some(auth) = &self.auth {
                let check = auth.check_authentication(&route).await;
                if !check.allowed {
                    let login = auth.login_route().to_string();
                    info!(
                        route = %route,
                        reason = check.reason.as_str(),
                        "Authentication required"
                    );
                    auth.emit(
                        AuthEventKind::AuthRequired,
                        json!({ "originalRoute": route, "loginRoute": login }),
                    );
                    drop(guard);
                    let redirect = (route != login).then(|| params([("redirect", route.as_str())]));
                    self.navigate_to(&login, redirect).await;
                    return NavigationOutcome::Redirected(login);
                }
            }

            match self.load_and_render(&route).await {
                Ok(()) => NavigationOutcome::Rendered,
                Err(err) => match self.errors.handle_route_error(&err, &route).await {
                    ErrorResolution::Rendered(page) => NavigationOutcome::Failed(page.code),
                    ErrorResolution::Redirect(target) => {
                        drop(guard);
                        self.navigate_to(&target, None).await;
                        NavigationOutcome::Redirected(target)
                    }
                },
            }
        }
        .boxed()
    }

    async fn load_and_render(&self, route: &str) -> Result<()> {
        let component = self.loader.resolve_route(route).await?;
        self.render_with_transition(component, route).await
    }

    /// Mount into a fresh container and schedule the previous component's
    /// cleanup for the next frame.
    async fn render_with_transition(
        &self,
        component: Arc<RenderedComponent>,
        route: &str,
    ) -> Result<()> {
        let container = self.renderer.create_container(route);
        self.renderer.mark_exiting(container);

        if !self.config.is_production()
            && let Some(style) = &component.style
        {
            self.renderer.apply_style(route, style);
        }

        let ctx = ComponentContext::new(component.clone(), self.services.clone());
        // Hook failures are logged by the chain and do not abort the mount.
        let _ = component.script.run_hook(HookPoint::BeforeMount, &ctx).await;
        let handle = self.renderer.mount(container, component.clone(), ctx.clone()).await?;
        let _ = component.script.run_hook(HookPoint::Mounted, &ctx).await;

        if component.script.data_url.is_some() {
            let fetch_ctx = ctx.clone();
            self.track(tokio::spawn(async move {
                fetch_ctx.fetch_all_data().await;
            }));
        }

        let previous = self
            .current_mount
            .lock()
            .replace(MountedComponent::new(container, ctx, handle));

        let frame = self.renderer.next_frame();
        let renderer = self.renderer.clone();
        self.track(tokio::spawn(async move {
            frame.await;
            renderer.remove_exiting_containers();
            if let Some(previous) = previous {
                previous.unmount().await;
            }
        }));

        info!(route, container, component = %component.name(), "Route rendered");
        Ok(())
    }

    /// Keep a spawned task for `settle`/`destroy`, reaping finished ones.
    fn track(&self, task: JoinHandle<()>) {
        let mut tasks = self.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }
}
