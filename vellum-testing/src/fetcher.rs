// Mock fetch primitive

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use vellum_http::{FetchRequest, FetchResponse, Fetcher, StatusCode};

#[derive(Debug, Clone)]
struct Canned {
    status: StatusCode,
    body: Bytes,
    content_type: &'static str,
}

/// Fetcher serving canned responses keyed by URL path.
///
/// Origins and query strings are ignored when matching, so
/// `http://localhost/src/views/home.html?x=1` matches `/src/views/home.html`.
/// Unknown paths answer `404 Not Found`.
#[derive(Debug, Default)]
pub struct MockFetcher {
    responses: RwLock<HashMap<String, Canned>>,
    delays: RwLock<HashMap<String, Duration>>,
    calls: Mutex<Vec<FetchRequest>>,
}

/// Path component of an absolute or relative URL.
pub fn url_path(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        return parsed.path().to_string();
    }
    url.split(['?', '#']).next().unwrap_or_default().to_string()
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(self, path: &str, body: &str) -> Self {
        self.respond(path, StatusCode::OK, body, "text/plain");
        self
    }

    pub fn with_json(self, path: &str, body: Value) -> Self {
        self.respond(path, StatusCode::OK, &body.to_string(), "application/json");
        self
    }

    pub fn with_status(self, path: &str, status: StatusCode, body: &str) -> Self {
        self.respond(path, status, body, "text/plain");
        self
    }

    /// Delay every response for `path`.
    pub fn with_delay(self, path: &str, delay: Duration) -> Self {
        self.delays.write().insert(path.to_string(), delay);
        self
    }

    pub fn respond(&self, path: &str, status: StatusCode, body: &str, content_type: &'static str) {
        self.responses.write().insert(
            path.to_string(),
            Canned {
                status,
                body: Bytes::copy_from_slice(body.as_bytes()),
                content_type,
            },
        );
    }

    pub fn calls(&self) -> Vec<FetchRequest> {
        self.calls.lock().clone()
    }

    /// How often `path` was requested.
    pub fn call_count(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|r| url_path(&r.url) == path).count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, request: FetchRequest) -> vellum_http::Result<FetchResponse> {
        let path = url_path(&request.url);
        let url = request.url.clone();
        self.calls.lock().push(request);

        let delay = self.delays.read().get(&path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let canned = self.responses.read().get(&path).cloned();
        Ok(match canned {
            Some(canned) => FetchResponse::new(canned.status)
                .with_header("content-type", canned.content_type)
                .with_body(canned.body)
                .with_url(url),
            None => FetchResponse::text_body(StatusCode::NOT_FOUND, "Not Found").with_url(url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_url_path() {
        assert_eq!(url_path("http://localhost/src/views/home.html?x=1"), "/src/views/home.html");
        assert_eq!(url_path("/api/users?page=2"), "/api/users");
    }

    #[tokio::test]
    async fn test_canned_responses() {
        let fetcher = MockFetcher::new().with_json("/api/users", json!({"users": []}));

        let request = FetchRequest::get("http://localhost/api/users");
        let response = fetcher.fetch(request).await.unwrap();
        assert!(response.ok());
        assert_eq!(response.json::<Value>().unwrap(), json!({"users": []}));

        let response = fetcher.fetch(FetchRequest::get("/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(fetcher.call_count("/api/users"), 1);
    }
}
