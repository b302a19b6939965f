//! Fetch response.

use crate::{HttpClientError, Result};
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;

/// A fully buffered response.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    url: String,
}

impl FetchResponse {
    /// Create a response with an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            url: String::new(),
        }
    }

    /// A plain-text response.
    pub fn text_body(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status)
            .with_header("content-type", "text/plain; charset=utf-8")
            .with_body(body.into())
    }

    /// A JSON response.
    pub fn json_body(status: StatusCode, value: &serde_json::Value) -> Self {
        Self::new(status)
            .with_header("content-type", "application/json")
            .with_body(value.to_string())
    }

    /// Create a response from a reqwest response.
    pub(crate) async fn from_reqwest(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().to_string();
        let body = response.bytes().await?;
        Ok(Self {
            status,
            headers,
            body,
            url,
        })
    }

    /// Set the body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            http::header::HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Set the final URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Check if the status is 2xx.
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Canonical reason phrase for the status.
    pub fn status_text(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    /// Get the response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Get a specific header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get the content type if available.
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Check if the content type declares JSON.
    pub fn is_json(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct.contains("application/json"))
    }

    /// The URL the response came from.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get the response body as bytes.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Get the response body as text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| HttpClientError::Json(e.to_string()))
    }

    /// Parse the response body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| HttpClientError::Json(e.to_string()))
    }

    /// Turn a non-2xx response into an error.
    pub fn error_for_status(self) -> Result<Self> {
        if self.ok() {
            return Ok(self);
        }
        Err(HttpClientError::Response {
            status: self.status.as_u16(),
            message: format!("HTTP {}: {}", self.status.as_u16(), self.status_text()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_response() {
        let response = FetchResponse::json_body(StatusCode::OK, &serde_json::json!({"id": 42}));
        assert!(response.ok());
        assert!(response.is_json());
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["id"], 42);
    }

    #[test]
    fn test_error_for_status() {
        let response = FetchResponse::new(StatusCode::NOT_FOUND);
        assert_eq!(response.status_text(), "Not Found");
        let err = response.error_for_status().unwrap_err();
        assert_eq!(err.status_code(), Some(404));
    }
}
