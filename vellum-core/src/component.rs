//! Rendered components and the per-mount component context.
//!
//! A [`RenderedComponent`] is the immutable, cacheable result of resolving a
//! route. Each mount gets a fresh [`ComponentContext`] holding the reactive
//! state, the router services and a [`NavigationToken`] for the navigation
//! that created it.

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, warn};
use vellum_auth::{AuthManager, TokenStorage};
use vellum_i18n::I18nManager;

use crate::api::{ApiHandler, FetchOptions, ParamSource};
use crate::config::RouterConfig;
use crate::merge::MergedScript;
use crate::navigation::{Generation, NavigationToken, Navigator};
use crate::query::{QueryManager, params_from_json, params_to_json};
use crate::route::RouteDescriptor;
use crate::script::{ComponentRegistry, DataUrl, HookError, MethodResult};
use crate::state::StateHandler;

/// Methods the router provides to every component. They take precedence
/// over same-named script methods.
pub const BUILTIN_METHODS: &[&str] = &[
    "navigateTo",
    "getCurrentRoute",
    "getParams",
    "getParam",
    "$t",
    "$isAuthenticated",
    "$logout",
    "$loginSuccess",
    "$checkAuth",
    "$getToken",
    "$setToken",
    "$removeToken",
    "$fetchData",
    "$fetchMultipleData",
    "$fetchAllData",
];

pub const DATA_LOADED: &str = "data-loaded";
pub const DATA_ERROR: &str = "data-error";

/// A fully resolved route, ready to mount.
#[derive(Debug, Clone)]
pub struct RenderedComponent {
    pub route: RouteDescriptor,
    /// Page markup with the layout merged in.
    pub template: String,
    /// Route stylesheet (development only).
    pub style: Option<String>,
    pub script: MergedScript,
    pub components: ComponentRegistry,
    pub layout: Option<String>,
}

impl RenderedComponent {
    pub fn name(&self) -> &str {
        &self.script.name
    }

    /// Router-injected fields.
    pub fn system_data(&self, services: &RouterServices) -> Map<String, Value> {
        let language = services
            .i18n
            .as_ref()
            .map(|i18n| i18n.current_language())
            .unwrap_or_else(|| services.config.default_language.clone());

        let mut data = Map::new();
        data.insert("currentRoute".into(), Value::String(self.route.name.clone()));
        data.insert("$query".into(), params_to_json(&services.query.query_params()));
        data.insert("$params".into(), params_to_json(&services.query.get_all_params()));
        data.insert("$lang".into(), Value::String(language));
        data.insert("$dataLoading".into(), Value::Bool(false));
        data
    }

    /// Layout data, then page data, then system data.
    pub fn initial_state(&self, services: &RouterServices) -> Map<String, Value> {
        let mut state = self.script.initial_data();
        state.extend(self.system_data(services));
        state
    }
}

/// Router collaborators reachable from inside a component.
#[derive(Clone)]
pub struct RouterServices {
    pub config: Arc<RouterConfig>,
    pub query: Arc<QueryManager>,
    pub api: Arc<ApiHandler>,
    pub auth: Option<Arc<AuthManager>>,
    pub i18n: Option<Arc<I18nManager>>,
    pub state: Arc<StateHandler>,
    pub navigator: Arc<dyn Navigator>,
    pub generation: Generation,
}

impl RouterServices {
    pub fn new(
        config: Arc<RouterConfig>,
        query: Arc<QueryManager>,
        api: Arc<ApiHandler>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config,
            query,
            api,
            auth: None,
            i18n: None,
            state: Arc::new(StateHandler::new()),
            navigator,
            generation: Generation::new(),
        }
    }

    pub fn with_auth(mut self, auth: Arc<AuthManager>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_i18n(mut self, i18n: Arc<I18nManager>) -> Self {
        self.i18n = Some(i18n);
        self
    }

    pub fn with_state(mut self, state: Arc<StateHandler>) -> Self {
        self.state = state;
        self
    }

    pub fn with_generation(mut self, generation: Generation) -> Self {
        self.generation = generation;
        self
    }
}

/// An event emitted by a component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentEvent {
    pub name: String,
    pub payload: Value,
}

pub type EventListener = Arc<dyn Fn(&Value) + Send + Sync>;

struct ContextInner {
    component: Arc<RenderedComponent>,
    services: RouterServices,
    state: RwLock<Map<String, Value>>,
    token: NavigationToken,
    events: Mutex<Vec<ComponentEvent>>,
    listeners: Mutex<Vec<(String, EventListener)>>,
}

/// Per-mount state handed to hooks, methods, computed values and watchers.
#[derive(Clone)]
pub struct ComponentContext {
    inner: Arc<ContextInner>,
}

impl std::fmt::Debug for ComponentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentContext")
            .field("route", &self.route())
            .field("generation", &self.inner.token.generation())
            .finish()
    }
}

impl ComponentContext {
    /// Create a context bound to the current navigation generation.
    pub fn new(component: Arc<RenderedComponent>, services: RouterServices) -> Self {
        let state = component.initial_state(&services);
        let token = services.generation.token();
        Self {
            inner: Arc::new(ContextInner {
                component,
                services,
                state: RwLock::new(state),
                token,
                events: Mutex::new(Vec::new()),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn route(&self) -> &str {
        &self.inner.component.route.name
    }

    pub fn component(&self) -> &Arc<RenderedComponent> {
        &self.inner.component
    }

    pub fn services(&self) -> &RouterServices {
        &self.inner.services
    }

    pub fn token(&self) -> &NavigationToken {
        &self.inner.token
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.state.read().get(key).cloned()
    }

    /// Set a state key, notifying the script's watcher for it on change.
    pub fn set(&self, key: &str, value: Value) {
        let old = self.inner.state.write().insert(key.to_string(), value.clone());
        let old = old.unwrap_or(Value::Null);
        if old != value
            && let Some(watcher) = self.inner.component.script.watch.get(key)
        {
            watcher.notify(self, &value, &old);
        }
    }

    pub fn update(&self, values: Map<String, Value>) {
        for (key, value) in values {
            self.set(&key, value);
        }
    }

    /// Snapshot of the reactive state.
    pub fn state(&self) -> Map<String, Value> {
        self.inner.state.read().clone()
    }

    /// Evaluate a computed value. `params` is always available.
    pub fn computed(&self, name: &str) -> Option<Value> {
        if let Some(computed) = self.inner.component.script.computed.get(name) {
            return Some(computed.get(self));
        }
        (name == "params").then(|| params_to_json(&self.services().query.get_all_params()))
    }

    pub fn emit(&self, name: &str, payload: Value) {
        debug!(route = %self.route(), event = name, "Component event");
        self.inner.events.lock().push(ComponentEvent {
            name: name.to_string(),
            payload: payload.clone(),
        });
        let listeners: Vec<EventListener> = self
            .inner
            .listeners
            .lock()
            .iter()
            .filter(|(event, _)| event == name)
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener(&payload);
        }
    }

    pub fn on(&self, name: &str, listener: EventListener) {
        self.inner.listeners.lock().push((name.to_string(), listener));
    }

    /// Events emitted so far, oldest first.
    pub fn events(&self) -> Vec<ComponentEvent> {
        self.inner.events.lock().clone()
    }

    /// Invoke a builtin or script method by name.
    pub async fn call(&self, name: &str, args: Vec<Value>) -> MethodResult {
        if BUILTIN_METHODS.contains(&name) {
            return self.call_builtin(name, &args).await;
        }
        match self.inner.component.script.methods.get(name) {
            Some(method) => method.call(self.clone(), args).await,
            None => {
                let component = self.inner.component.name();
                Err(format!("Method '{name}' not found on {component}").into())
            }
        }
    }

    async fn call_builtin(&self, name: &str, args: &[Value]) -> MethodResult {
        let services = self.services();
        let arg = |i: usize| args.get(i).and_then(Value::as_str);

        match name {
            "navigateTo" => {
                let route = arg(0).ok_or("navigateTo requires a route name")?;
                let params = args.get(1).filter(|v| v.is_object()).map(params_from_json);
                services.navigator.navigate_to(route, params).await;
                Ok(Value::Null)
            }
            "getCurrentRoute" => Ok(Value::String(services.navigator.current_route())),
            "getParams" => Ok(params_to_json(&services.query.get_all_params())),
            "getParam" => {
                let key = arg(0).ok_or("getParam requires a key")?;
                Ok(services
                    .query
                    .get_param(key)
                    .map(|v| v.to_json())
                    .or_else(|| args.get(1).cloned())
                    .unwrap_or(Value::Null))
            }
            "$t" => {
                let key = arg(0).ok_or("$t requires a key")?;
                let params = args.get(1).and_then(Value::as_object).cloned().unwrap_or_default();
                Ok(Value::String(match &services.i18n {
                    Some(i18n) => i18n.t(key, &params),
                    None => key.to_string(),
                }))
            }
            "$isAuthenticated" => Ok(Value::Bool(
                services.auth.as_ref().is_some_and(|auth| auth.is_authenticated()),
            )),
            "$logout" => match &services.auth {
                Some(auth) => {
                    let route = auth.logout();
                    services.navigator.navigate_to(&route, None).await;
                    Ok(Value::String(route))
                }
                None => Ok(Value::Null),
            },
            "$loginSuccess" => match &services.auth {
                Some(auth) => {
                    let route = auth.login_success(arg(0));
                    services.navigator.navigate_to(&route, None).await;
                    Ok(Value::String(route))
                }
                None => Ok(Value::Null),
            },
            "$checkAuth" => {
                let route = arg(0).unwrap_or(self.route());
                match &services.auth {
                    Some(auth) => Ok(serde_json::to_value(auth.check_authentication(route).await)?),
                    None => Ok(json!({
                        "allowed": true,
                        "reason": "auth_disabled",
                        "route": route,
                    })),
                }
            }
            "$getToken" => Ok(services
                .auth
                .as_ref()
                .and_then(|auth| auth.access_token())
                .map(Value::String)
                .unwrap_or(Value::Null)),
            "$setToken" => {
                let token = arg(0).ok_or("$setToken requires a token")?;
                let Some(auth) = &services.auth else {
                    return Ok(Value::Bool(false));
                };
                auth.set_access_token(token, storage_arg(args.get(1)))?;
                Ok(Value::Bool(true))
            }
            "$removeToken" => {
                if let Some(auth) = &services.auth {
                    auth.remove_access_token(storage_arg(args.get(0)));
                }
                Ok(Value::Null)
            }
            "$fetchData" => Ok(self.fetch_data(arg(0)).await.unwrap_or(Value::Null)),
            "$fetchMultipleData" => Ok(self.fetch_multiple_data().await.unwrap_or(Value::Null)),
            "$fetchAllData" => Ok(self.fetch_all_data().await.unwrap_or(Value::Null)),
            other => Err(HookError::from(format!("Unknown builtin method '{other}'"))),
        }
    }

    /// Fetch the script's `dataURL`.
    ///
    /// A single URL merges the response object into state. With a map,
    /// `api_name` refreshes one entry and `None` refreshes all of them.
    /// Results from a superseded navigation are discarded.
    pub async fn fetch_data(&self, api_name: Option<&str>) -> Option<Value> {
        let data_url = self.inner.component.script.data_url.clone()?;
        let url = match (&data_url, api_name) {
            (DataUrl::Single(url), _) => url.clone(),
            (DataUrl::Multiple(urls), Some(name)) => urls.get(name)?.clone(),
            (DataUrl::Multiple(_), None) => return self.fetch_multiple_data().await,
        };

        self.set("$dataLoading", Value::Bool(true));
        let result = self
            .services()
            .api
            .fetch_data(&url, Some(self as &dyn ParamSource), FetchOptions::default())
            .await;
        self.set("$dataLoading", Value::Bool(false));

        if !self.token().is_current() {
            debug!(route = %self.route(), url = %url, "Discarding data from superseded navigation");
            return None;
        }

        match result {
            Ok(data) => {
                debug!(route = %self.route(), url = %url, "Data fetched");
                let loaded = match api_name.filter(|_| matches!(data_url, DataUrl::Multiple(_))) {
                    Some(name) => {
                        self.set(name, data.clone());
                        let mut loaded = Map::new();
                        loaded.insert(name.to_string(), data);
                        Value::Object(loaded)
                    }
                    None => {
                        if let Value::Object(fields) = &data {
                            self.update(fields.clone());
                        }
                        data
                    }
                };
                self.emit(DATA_LOADED, loaded.clone());
                Some(loaded)
            }
            Err(err) => {
                warn!(
                    route = %self.route(),
                    url = %url,
                    error = %err,
                    "Failed to fetch component data"
                );
                self.emit(DATA_ERROR, Value::String(err.to_string()));
                None
            }
        }
    }

    /// Fetch every entry of a map `dataURL` concurrently.
    ///
    /// Successes are merged into state under their keys; failures are
    /// reported separately through a `data-error` event.
    pub async fn fetch_multiple_data(&self) -> Option<Value> {
        let Some(DataUrl::Multiple(urls)) = self.inner.component.script.data_url.clone() else {
            return None;
        };

        self.set("$dataLoading", Value::Bool(true));
        let outcome = self
            .services()
            .api
            .fetch_multiple_data(&urls, Some(self as &dyn ParamSource))
            .await;
        self.set("$dataLoading", Value::Bool(false));

        if !self.token().is_current() {
            debug!(route = %self.route(), "Discarding data from superseded navigation");
            return None;
        }

        for (key, value) in &outcome.results {
            self.set(key, value.clone());
        }
        let results = Value::Object(outcome.results.clone());
        let errors = outcome.errors_json();
        if !outcome.results.is_empty() {
            self.emit(DATA_LOADED, results.clone());
        }
        if !outcome.errors.is_empty() {
            self.emit(DATA_ERROR, errors.clone());
        }
        Some(json!({ "results": results, "errors": errors }))
    }

    /// Fetch whatever `dataURL` declares.
    pub async fn fetch_all_data(&self) -> Option<Value> {
        match self.inner.component.script.data_url {
            Some(DataUrl::Single(_)) => self.fetch_data(None).await,
            Some(DataUrl::Multiple(_)) => self.fetch_multiple_data().await,
            None => None,
        }
    }
}

fn storage_arg(value: Option<&Value>) -> Option<TokenStorage> {
    let value = value?;
    let value = value.get("storage").unwrap_or(value);
    serde_json::from_value(value.clone()).ok()
}

/// Route parameters, then state, then computed values.
impl ParamSource for ComponentContext {
    fn lookup_param(&self, name: &str) -> Option<Value> {
        self.services()
            .query
            .get_param(name)
            .map(|v| v.to_json())
            .or_else(|| self.get(name).filter(|v| !v.is_null()))
            .or_else(|| self.computed(name).filter(|v| !v.is_null()))
    }
}
