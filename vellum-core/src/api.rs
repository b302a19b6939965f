//! JSON API access for components.

use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use vellum_auth::AuthManager;
use vellum_http::{FetchRequest, Fetcher, HttpClientError, Method, MultipartPart};

use crate::config::RouterConfig;
use crate::query::QueryManager;
use crate::{Result, RouterError};

static URL_PARAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^}]+)\}").unwrap());

/// Something that can supply values for `{name}` placeholders.
pub trait ParamSource: Send + Sync {
    fn lookup_param(&self, name: &str) -> Option<Value>;
}

impl ParamSource for Map<String, Value> {
    fn lookup_param(&self, name: &str) -> Option<Value> {
        self.get(name).filter(|v| !v.is_null()).cloned()
    }
}

/// Per-request options for [`ApiHandler::fetch_data`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    /// JSON body for POST, PUT and PATCH.
    pub data: Option<Value>,
    /// Multipart body; takes precedence over `data`.
    pub multipart: Option<Vec<MultipartPart>>,
    pub timeout: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            data: None,
            multipart: None,
            timeout: None,
        }
    }
}

impl FetchOptions {
    pub fn method(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_multipart(mut self, parts: Vec<MultipartPart>) -> Self {
        self.multipart = Some(parts);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Settled results of a multi-endpoint fetch.
#[derive(Debug, Default)]
pub struct MultiFetchResult {
    pub results: Map<String, Value>,
    pub errors: BTreeMap<String, RouterError>,
}

impl MultiFetchResult {
    /// Errors as a JSON object of messages.
    pub fn errors_json(&self) -> Value {
        Value::Object(
            self.errors
                .iter()
                .map(|(k, e)| (k.clone(), Value::String(e.to_string())))
                .collect(),
        )
    }
}

fn param_to_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(param_to_string)
                .collect::<Vec<_>>()
                .join(","),
        ),
        other => Some(other.to_string()),
    }
}

fn error_message(body: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|field| body.get(field).and_then(Value::as_str).map(str::to_string))
}

pub struct ApiHandler {
    config: Arc<RouterConfig>,
    fetcher: Arc<dyn Fetcher>,
    query: Arc<QueryManager>,
    auth: Option<Arc<AuthManager>>,
}

impl ApiHandler {
    pub fn new(
        config: Arc<RouterConfig>,
        fetcher: Arc<dyn Fetcher>,
        query: Arc<QueryManager>,
        auth: Option<Arc<AuthManager>>,
    ) -> Self {
        Self {
            config,
            fetcher,
            query,
            auth,
        }
    }

    /// Substitute `{name}` placeholders from `source`, then the current
    /// parameters. Unresolved placeholders are kept as written.
    pub fn process_url_parameters(&self, url: &str, source: Option<&dyn ParamSource>) -> String {
        URL_PARAM
            .replace_all(url, |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                let value = source
                    .and_then(|s| s.lookup_param(name))
                    .or_else(|| self.query.get_param(name).map(|v| v.to_json()))
                    .and_then(|v| param_to_string(&v));
                match value {
                    Some(value) => {
                        debug!(param = name, value = %value, "URL parameter resolved");
                        urlencoding::encode(&value).into_owned()
                    }
                    None => {
                        warn!(param = name, "URL parameter not found, keeping placeholder");
                        caps[0].to_string()
                    }
                }
            })
            .into_owned()
    }

    fn full_url(&self, url: &str, method: &Method) -> String {
        let absolute = url.starts_with("http://") || url.starts_with("https://");
        let mut full = if absolute || self.config.api_base_url.is_empty() {
            url.to_string()
        } else {
            format!(
                "{}/{}",
                self.config.api_base_url.trim_end_matches('/'),
                url.trim_start_matches('/')
            )
        };
        if *method == Method::GET {
            let query = self.query.query_string();
            if !query.is_empty() {
                full.push(if full.contains('?') { '&' } else { '?' });
                full.push_str(&query);
            }
        }
        full
    }

    /// Fetch a JSON object.
    ///
    /// GET requests carry the current query string. A non-JSON or
    /// non-object success body yields `{"success": true}`.
    pub async fn fetch_data(
        &self,
        url: &str,
        source: Option<&dyn ParamSource>,
        options: FetchOptions,
    ) -> Result<Value> {
        let processed = self.process_url_parameters(url, source);
        let full_url = self.full_url(&processed, &options.method);
        debug!(url = %full_url, method = %options.method, "Fetching data");

        let mut request = FetchRequest::new(options.method.clone(), full_url.clone())
            .with_header("Accept", "application/json")
            .with_timeout(options.timeout.unwrap_or_else(|| self.config.request_timeout()));
        if let Some(token) = self.auth.as_ref().and_then(|auth| auth.access_token()) {
            request = request.with_bearer(&token);
        }

        let accepts_body = [Method::POST, Method::PUT, Method::PATCH].contains(&options.method);
        if let Some(parts) = options.multipart {
            request = request.with_multipart(parts);
        } else if let Some(data) = options.data.as_ref().filter(|_| accepts_body) {
            request = request.with_json(data)?;
        } else {
            request = request.with_header("Content-Type", "application/json");
        }
        for (name, value) in options.headers {
            request = request.with_header(name, value);
        }

        let response = self.fetcher.fetch(request).await.inspect_err(|err| {
            error!(url = %full_url, error = %err, "Failed to fetch data");
        })?;

        if !response.ok() {
            let status = response.status().as_u16();
            let message = response
                .json::<Value>()
                .ok()
                .and_then(|body| error_message(&body))
                .unwrap_or_else(|| format!("HTTP {}: {}", status, response.status_text()));
            error!(url = %full_url, status, message = %message, "Failed to fetch data");
            return Err(HttpClientError::Response { status, message }.into());
        }

        match response.json::<Value>() {
            Ok(data @ Value::Object(_)) => Ok(data),
            _ => Ok(json!({ "success": true })),
        }
    }

    /// GET every endpoint concurrently. One endpoint's failure does not
    /// affect the others.
    pub async fn fetch_multiple_data(
        &self,
        endpoints: &BTreeMap<String, String>,
        source: Option<&dyn ParamSource>,
    ) -> MultiFetchResult {
        let fetches = endpoints.iter().map(|(key, url)| async move {
            (key.clone(), self.fetch_data(url, source, FetchOptions::default()).await)
        });

        let mut outcome = MultiFetchResult::default();
        for (key, result) in join_all(fetches).await {
            match result {
                Ok(data) => {
                    outcome.results.insert(key, data);
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "Failed to fetch data for key");
                    outcome.errors.insert(key, err);
                }
            }
        }
        outcome
    }

    pub async fn get(&self, url: &str, source: Option<&dyn ParamSource>) -> Result<Value> {
        self.fetch_data(url, source, FetchOptions::method(Method::GET)).await
    }

    pub async fn post(
        &self,
        url: &str,
        data: Value,
        source: Option<&dyn ParamSource>,
    ) -> Result<Value> {
        self.fetch_data(url, source, FetchOptions::method(Method::POST).with_data(data)).await
    }

    pub async fn put(
        &self,
        url: &str,
        data: Value,
        source: Option<&dyn ParamSource>,
    ) -> Result<Value> {
        self.fetch_data(url, source, FetchOptions::method(Method::PUT).with_data(data)).await
    }

    pub async fn patch(
        &self,
        url: &str,
        data: Value,
        source: Option<&dyn ParamSource>,
    ) -> Result<Value> {
        self.fetch_data(url, source, FetchOptions::method(Method::PATCH).with_data(data)).await
    }

    pub async fn delete(&self, url: &str, source: Option<&dyn ParamSource>) -> Result<Value> {
        self.fetch_data(url, source, FetchOptions::method(Method::DELETE)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::params;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use vellum_http::{FetchResponse, StatusCode};

    #[derive(Default)]
    struct Recorder {
        requests: Mutex<Vec<FetchRequest>>,
        responses: Mutex<Vec<FetchResponse>>,
    }

    #[async_trait]
    impl Fetcher for Recorder {
        async fn fetch(&self, request: FetchRequest) -> vellum_http::Result<FetchResponse> {
            self.requests.lock().push(request);
            let response = self.responses.lock().pop();
            Ok(response.unwrap_or_else(|| FetchResponse::new(StatusCode::NOT_FOUND)))
        }
    }

    fn handler(recorder: Arc<Recorder>, query: Arc<QueryManager>) -> ApiHandler {
        let config = RouterConfig::default().with_api_base_url("https://api.test/v1/");
        ApiHandler::new(Arc::new(config), recorder, query, None)
    }

    #[test]
    fn test_placeholders() {
        let query = Arc::new(QueryManager::new());
        query.set_current_query_params(params([("tab", "a b")]));
        let api = handler(Arc::new(Recorder::default()), query);

        let mut state = Map::new();
        state.insert("id".into(), json!(7));
        let url = api.process_url_parameters("/users/{id}/{tab}/{missing}", Some(&state));
        assert_eq!(url, "/users/7/a%20b/{missing}");
    }

    #[tokio::test]
    async fn test_get_appends_query_and_base() {
        let recorder = Arc::new(Recorder::default());
        recorder
            .responses
            .lock()
            .push(FetchResponse::json_body(StatusCode::OK, &json!({"items": []})));
        let query = Arc::new(QueryManager::new());
        query.set_current_query_params(params([("page", "2")]));
        let api = handler(recorder.clone(), query);

        let data = api.get("/items", None).await.unwrap();
        assert_eq!(data, json!({"items": []}));
        let requests = recorder.requests.lock();
        assert_eq!(requests[0].url, "https://api.test/v1/items?page=2");
        assert_eq!(requests[0].header("accept"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_error_message_from_body() {
        let recorder = Arc::new(Recorder::default());
        recorder.responses.lock().push(FetchResponse::json_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            &json!({"message": "bad email"}),
        ));
        let api = handler(recorder, Arc::new(QueryManager::new()));

        let err = api.post("/users", json!({"email": "x"}), None).await.unwrap_err();
        match err {
            RouterError::Http(HttpClientError::Response { status, message }) => {
                assert_eq!(status, 422);
                assert_eq!(message, "bad email");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_non_object_body_is_success() {
        let recorder = Arc::new(Recorder::default());
        recorder.responses.lock().push(FetchResponse::text_body(StatusCode::OK, "done"));
        let api = handler(recorder.clone(), Arc::new(QueryManager::new()));

        assert_eq!(api.delete("/users/1", None).await.unwrap(), json!({"success": true}));
        assert_eq!(recorder.requests.lock()[0].method, Method::DELETE);
    }

    #[tokio::test]
    async fn test_post_sends_json() {
        let recorder = Arc::new(Recorder::default());
        let created = FetchResponse::json_body(StatusCode::CREATED, &json!({"id": 1}));
        recorder.responses.lock().push(created);
        let api = handler(recorder.clone(), Arc::new(QueryManager::new()));

        api.post("users", json!({"name": "kim"}), None).await.unwrap();
        let requests = recorder.requests.lock();
        assert_eq!(requests[0].url, "https://api.test/v1/users");
        assert_eq!(requests[0].json_body(), Some(json!({"name": "kim"})));
    }
}
