//! Form submission.
//!
//! Forms are described by a [`FormSpec`] rather than bound to DOM nodes.
//! Submitting one resolves `{param}` placeholders in the action, validates
//! every field, sends JSON (or multipart when files are attached) and
//! optionally navigates to a redirect route afterwards.

use parking_lot::Mutex;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use vellum_http::{FetchRequest, Fetcher, HttpClientError, Method, MultipartPart};

use crate::api::ParamSource;
use crate::component::ComponentContext;
use crate::config::RouterConfig;
use crate::{Result, RouterError};

/// Delay between a successful submission and its redirect.
pub const REDIRECT_DELAY: Duration = Duration::from_secs(1);

/// A rule checked against one field's value.
#[derive(Debug, Clone)]
pub enum FieldValidator {
    Required,
    Pattern(Regex),
    MinLength(usize),
    MaxLength(usize),
    /// Component method called with the value; must return `true`.
    Custom(String),
}

impl FieldValidator {
    fn describe(&self) -> String {
        match self {
            FieldValidator::Required => "required".to_string(),
            FieldValidator::Pattern(re) => format!("pattern {}", re.as_str()),
            FieldValidator::MinLength(n) => format!("minLength {n}"),
            FieldValidator::MaxLength(n) => format!("maxLength {n}"),
            FieldValidator::Custom(name) => name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub field: String,
    pub rule: String,
}

/// A form and its submission options.
#[derive(Debug, Clone)]
pub struct FormSpec {
    pub id: String,
    /// Target URL; may contain `{param}` placeholders.
    pub action: String,
    pub method: Method,
    pub fields: Map<String, Value>,
    pub files: Vec<MultipartPart>,
    pub validators: BTreeMap<String, Vec<FieldValidator>>,
    pub redirect: Option<String>,
    pub success_handler: Option<String>,
    pub error_handler: Option<String>,
    pub loading_handler: Option<String>,
}

impl FormSpec {
    pub fn new(id: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            method: Method::POST,
            fields: Map::new(),
            files: Vec::new(),
            validators: BTreeMap::new(),
            redirect: None,
            success_handler: None,
            error_handler: None,
            loading_handler: None,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_file(mut self, file: MultipartPart) -> Self {
        self.files.push(file);
        self
    }

    pub fn with_validator(mut self, field: impl Into<String>, validator: FieldValidator) -> Self {
        self.validators.entry(field.into()).or_default().push(validator);
        self
    }

    pub fn with_redirect(mut self, route: impl Into<String>) -> Self {
        self.redirect = Some(route.into());
        self
    }

    pub fn with_success_handler(mut self, method: impl Into<String>) -> Self {
        self.success_handler = Some(method.into());
        self
    }

    pub fn with_error_handler(mut self, method: impl Into<String>) -> Self {
        self.error_handler = Some(method.into());
        self
    }

    pub fn with_loading_handler(mut self, method: impl Into<String>) -> Self {
        self.loading_handler = Some(method.into());
        self
    }
}

fn field_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

struct InFlight {
    forms: Arc<Mutex<HashSet<String>>>,
    id: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.forms.lock().remove(&self.id);
    }
}

pub struct FormHandler {
    config: Arc<RouterConfig>,
    fetcher: Arc<dyn Fetcher>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    redirect_delay: Duration,
}

impl FormHandler {
    pub fn new(config: Arc<RouterConfig>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config,
            fetcher,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            redirect_delay: REDIRECT_DELAY,
        }
    }

    pub fn with_redirect_delay(mut self, delay: Duration) -> Self {
        self.redirect_delay = delay;
        self
    }

    pub fn is_submitting(&self, form_id: &str) -> bool {
        self.in_flight.lock().contains(form_id)
    }

    /// Resolve `{param}` placeholders from the component.
    pub fn process_action_params(&self, action: &str, ctx: &ComponentContext) -> String {
        ctx.services()
            .api
            .process_url_parameters(action, Some(ctx as &dyn ParamSource))
    }

    /// Check every field rule. Custom validators that fail or are missing
    /// are logged; a missing one passes.
    pub async fn validate(
        &self,
        form: &FormSpec,
        ctx: &ComponentContext,
    ) -> Vec<ValidationFailure> {
        let mut failures = Vec::new();
        for (field, rules) in &form.validators {
            let value = field_text(form.fields.get(field).unwrap_or(&Value::Null));
            for rule in rules {
                let valid = match rule {
                    FieldValidator::Required => !value.trim().is_empty(),
                    FieldValidator::Pattern(re) => value.is_empty() || re.is_match(&value),
                    FieldValidator::MinLength(n) => value.is_empty() || value.chars().count() >= *n,
                    FieldValidator::MaxLength(n) => value.chars().count() <= *n,
                    FieldValidator::Custom(method) => self.run_custom(method, &value, ctx).await,
                };
                if !valid {
                    failures.push(ValidationFailure {
                        field: field.clone(),
                        rule: rule.describe(),
                    });
                }
            }
        }
        failures
    }

    async fn run_custom(&self, method: &str, value: &str, ctx: &ComponentContext) -> bool {
        if !ctx.component().script.methods.contains_key(method) {
            warn!(method, "Validation function not found");
            return true;
        }
        match ctx.call(method, vec![Value::String(value.to_string())]).await {
            Ok(result) => result.as_bool().unwrap_or(false),
            Err(err) => {
                warn!(method, error = %err, "Validation function error");
                false
            }
        }
    }

    /// Validate and submit `form` on behalf of `ctx`.
    ///
    /// Rejected while another submission of the same form id is running.
    /// The loading handler is called with `true` before and `false` after;
    /// the success or error handler receives the outcome.
    pub async fn submit(&self, form: &FormSpec, ctx: &ComponentContext) -> Result<Value> {
        let _guard = {
            let mut forms = self.in_flight.lock();
            if !forms.insert(form.id.clone()) {
                return Err(RouterError::Form(format!(
                    "Form '{}' is already being submitted",
                    form.id
                )));
            }
            InFlight {
                forms: self.in_flight.clone(),
                id: form.id.clone(),
            }
        };

        self.notify(ctx, form.loading_handler.as_deref(), vec![json!(true)]).await;
        let result = self.submit_inner(form, ctx).await;
        match &result {
            Ok(response) => {
                self.notify(ctx, form.success_handler.as_deref(), vec![response.clone()]).await;
                if let Some(route) = form.redirect.clone() {
                    let navigator = ctx.services().navigator.clone();
                    let delay = self.redirect_delay;
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        navigator.navigate_to(&route, None).await;
                    });
                }
            }
            Err(err) => {
                warn!(form = %form.id, error = %err, "Form submission error");
                self.notify(ctx, form.error_handler.as_deref(), vec![json!(err.to_string())]).await;
            }
        }
        self.notify(ctx, form.loading_handler.as_deref(), vec![json!(false)]).await;
        result
    }

    async fn submit_inner(&self, form: &FormSpec, ctx: &ComponentContext) -> Result<Value> {
        let action = self.process_action_params(&form.action, ctx);

        let failures = self.validate(form, ctx).await;
        if !failures.is_empty() {
            let fields: Vec<&str> = failures.iter().map(|f| f.field.as_str()).collect();
            return Err(RouterError::Form(format!("Validation failed: {}", fields.join(", "))));
        }

        let has_files = !form.files.is_empty();
        let timeout = if has_files {
            self.config.upload_timeout()
        } else {
            self.config.request_timeout()
        };
        debug!(form = %form.id, action = %action, files = form.files.len(), "Form submitting");

        let mut request = FetchRequest::new(form.method.clone(), action.clone())
            .with_header("Accept", "application/json")
            .with_timeout(timeout);
        if let Some(token) = ctx.services().auth.as_ref().and_then(|auth| auth.access_token()) {
            request = request.with_bearer(&token);
        }
        request = if has_files {
            let mut parts: Vec<MultipartPart> = form
                .fields
                .iter()
                .map(|(name, value)| MultipartPart::Text {
                    name: name.clone(),
                    value: field_text(value),
                })
                .collect();
            parts.extend(form.files.iter().cloned());
            request.with_multipart(parts)
        } else {
            request.with_json(&form.fields)?
        };

        let response = tokio::time::timeout(timeout, self.fetcher.fetch(request))
            .await
            .map_err(|_| HttpClientError::Timeout(timeout))??;

        if !response.ok() {
            let status = response.status().as_u16();
            let message = response
                .json::<Value>()
                .ok()
                .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {}: {}", status, response.status_text()));
            return Err(HttpClientError::Response { status, message }.into());
        }

        Ok(response.json::<Value>().unwrap_or_else(|_| json!({ "success": true })))
    }

    async fn notify(&self, ctx: &ComponentContext, handler: Option<&str>, args: Vec<Value>) {
        let Some(method) = handler else {
            return;
        };
        if let Err(err) = ctx.call(method, args).await {
            warn!(method, error = %err, "Form handler failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiHandler;
    use crate::component::{RenderedComponent, RouterServices};
    use crate::merge::MergedScript;
    use crate::navigation::{NavigationOutcome, Navigator};
    use crate::query::{QueryManager, QueryParams, params};
    use crate::route::RouteDescriptor;
    use crate::script::{ComponentRegistry, Method as ScriptMethod, ScriptDefinition};
    use async_trait::async_trait;
    use vellum_http::{FetchBody, FetchResponse, StatusCode};

    #[derive(Default)]
    struct Server {
        requests: Mutex<Vec<FetchRequest>>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl Fetcher for Server {
        async fn fetch(&self, request: FetchRequest) -> vellum_http::Result<FetchResponse> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let url = request.url.clone();
            self.requests.lock().push(request);
            Ok(if url.contains("bad") {
                FetchResponse::json_body(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    &json!({"message": "Email taken"}),
                )
            } else {
                FetchResponse::json_body(StatusCode::CREATED, &json!({"id": 9}))
            })
        }
    }

    #[derive(Default)]
    struct Nav(Mutex<Vec<String>>);

    #[async_trait]
    impl Navigator for Nav {
        async fn navigate_to(
            &self,
            route: &str,
            _params: Option<QueryParams>,
        ) -> NavigationOutcome {
            self.0.lock().push(route.to_string());
            NavigationOutcome::Rendered
        }

        fn current_route(&self) -> String {
            "signup".into()
        }
    }

    fn context(script: ScriptDefinition, nav: Arc<Nav>) -> ComponentContext {
        let config = Arc::new(RouterConfig::new());
        let query = Arc::new(QueryManager::new());
        query.set_current_route_params(Some(params([("teamId", "5")])));
        let fetcher = Arc::new(Server::default());
        let api = Arc::new(ApiHandler::new(config.clone(), fetcher, query.clone(), None));
        let services = RouterServices::new(config, query, api, nav);
        let component = Arc::new(RenderedComponent {
            route: RouteDescriptor::new("signup"),
            template: String::new(),
            style: None,
            script: MergedScript::merge(None, &script, "signup"),
            components: ComponentRegistry::new(),
            layout: None,
        });
        ComponentContext::new(component, services)
    }

    #[tokio::test]
    async fn test_submit_json_with_params() {
        let server = Arc::new(Server::default());
        let handler = FormHandler::new(Arc::new(RouterConfig::new()), server.clone());
        let ctx = context(ScriptDefinition::new(), Arc::default());

        let form =
            FormSpec::new("signup", "/api/teams/{teamId}/members").with_field("email", "a@b.c");
        let response = handler.submit(&form, &ctx).await.unwrap();
        assert_eq!(response, json!({"id": 9}));

        let requests = server.requests.lock();
        assert_eq!(requests[0].url, "/api/teams/5/members");
        assert_eq!(requests[0].method, Method::POST);
        assert_eq!(requests[0].json_body(), Some(json!({"email": "a@b.c"})));
        assert!(!handler.is_submitting("signup"));
    }

    #[tokio::test]
    async fn test_files_use_multipart() {
        let server = Arc::new(Server::default());
        let handler = FormHandler::new(Arc::new(RouterConfig::new()), server.clone());
        let ctx = context(ScriptDefinition::new(), Arc::default());

        let form = FormSpec::new("upload", "/api/avatar")
            .with_field("caption", "me")
            .with_file(MultipartPart::File {
                name: "avatar".into(),
                filename: "me.png".into(),
                content_type: Some("image/png".into()),
                data: bytes::Bytes::from_static(b"png"),
            });
        handler.submit(&form, &ctx).await.unwrap();

        let requests = server.requests.lock();
        assert!(matches!(&requests[0].body, FetchBody::Multipart(parts) if parts.len() == 2));
        assert_eq!(requests[0].timeout, Some(RouterConfig::new().upload_timeout()));
    }

    #[tokio::test]
    async fn test_validation_blocks_submit() {
        let server = Arc::new(Server::default());
        let handler = FormHandler::new(Arc::new(RouterConfig::new()), server.clone());
        let script = ScriptDefinition::new().with_method(
            "isCompanyEmail",
            ScriptMethod::sync(|_, args| {
                json!(args[0].as_str().is_some_and(|v| v.ends_with("@corp.io")))
            }),
        );
        let ctx = context(script, Arc::default());

        let form = FormSpec::new("signup", "/api/users")
            .with_field("email", "a@gmail.com")
            .with_field("name", "")
            .with_validator("name", FieldValidator::Required)
            .with_validator("email", FieldValidator::Custom("isCompanyEmail".into()))
            .with_validator("email", FieldValidator::MaxLength(64));

        let failures = handler.validate(&form, &ctx).await;
        assert_eq!(
            failures,
            vec![
                ValidationFailure { field: "email".into(), rule: "isCompanyEmail".into() },
                ValidationFailure { field: "name".into(), rule: "required".into() },
            ]
        );
        assert!(matches!(handler.submit(&form, &ctx).await, Err(RouterError::Form(_))));
        assert!(server.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_error_message_from_body() {
        let handler = FormHandler::new(Arc::new(RouterConfig::new()), Arc::new(Server::default()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let script = ScriptDefinition::new().with_method(
            "onError",
            ScriptMethod::sync(move |_, args| {
                sink.lock().push(args[0].clone());
                Value::Null
            }),
        );
        let ctx = context(script, Arc::default());

        let form = FormSpec::new("signup", "/api/bad").with_error_handler("onError");
        let err = handler.submit(&form, &ctx).await.unwrap_err();
        assert!(err.to_string().contains("Email taken"));
        assert_eq!(seen.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_submission_rejected() {
        let server = Arc::new(Server {
            delay: Some(Duration::from_millis(50)),
            ..Server::default()
        });
        let handler = FormHandler::new(Arc::new(RouterConfig::new()), server.clone());
        let ctx = context(ScriptDefinition::new(), Arc::default());
        let form = FormSpec::new("signup", "/api/users");

        let (first, second) = tokio::join!(handler.submit(&form, &ctx), async {
            tokio::task::yield_now().await;
            handler.submit(&form, &ctx).await
        });
        assert!(first.is_ok());
        assert!(matches!(second, Err(RouterError::Form(_))));
        assert_eq!(server.requests.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_redirect_after_delay() {
        let nav = Arc::new(Nav::default());
        let handler = FormHandler::new(Arc::new(RouterConfig::new()), Arc::new(Server::default()));
        let ctx = context(ScriptDefinition::new(), nav.clone());

        let form = FormSpec::new("signup", "/api/users").with_redirect("welcome");
        handler.submit(&form, &ctx).await.unwrap();
        assert!(nav.0.lock().is_empty());

        tokio::time::sleep(REDIRECT_DELAY + Duration::from_millis(10)).await;
        assert_eq!(*nav.0.lock(), vec!["welcome".to_string()]);
    }
}
