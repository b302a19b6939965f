//! Request description handed to a [`Fetcher`](crate::Fetcher).

use crate::Result;
use bytes::Bytes;
use http::Method;
use serde::Serialize;
use std::time::Duration;

/// One part of a multipart body.
#[derive(Debug, Clone, PartialEq)]
pub enum MultipartPart {
    /// Plain text field.
    Text { name: String, value: String },
    /// File upload.
    File {
        name: String,
        filename: String,
        content_type: Option<String>,
        data: Bytes,
    },
}

impl MultipartPart {
    /// Field name of the part.
    pub fn name(&self) -> &str {
        match self {
            MultipartPart::Text { name, .. } | MultipartPart::File { name, .. } => name,
        }
    }
}

/// Request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FetchBody {
    #[default]
    Empty,
    Bytes(Bytes),
    Multipart(Vec<MultipartPart>),
}

/// A fetch request: method, URL, headers, body, optional timeout.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: FetchBody,
    pub timeout: Option<Duration>,
}

impl FetchRequest {
    /// Create a request.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: FetchBody::Empty,
            timeout: None,
        }
    }

    /// Create a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// Create a POST request.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Set or replace a header. Names compare case-insensitively.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// Set a `Bearer` authorization header.
    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }

    /// Serialize `value` as the JSON body.
    pub fn with_json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        self.body = FetchBody::Bytes(Bytes::from(body));
        Ok(self.with_header("Content-Type", "application/json"))
    }

    /// Set a raw body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = FetchBody::Bytes(body.into());
        self
    }

    /// Set a multipart body.
    pub fn with_multipart(mut self, parts: Vec<MultipartPart>) -> Self {
        self.body = FetchBody::Multipart(parts);
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Look up a header value.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The JSON body, if the body parses as JSON.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        match &self.body {
            FetchBody::Bytes(bytes) => serde_json::from_slice(bytes).ok(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_replacement_is_case_insensitive() {
        let request = FetchRequest::get("/api/users")
            .with_header("accept", "text/html")
            .with_header("Accept", "application/json");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("ACCEPT"), Some("application/json"));
    }

    #[test]
    fn test_json_body() {
        let request = FetchRequest::post("/api/login")
            .with_json(&serde_json::json!({"user": "kim"}))
            .unwrap()
            .with_bearer("abc");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert_eq!(request.header("authorization"), Some("Bearer abc"));
        assert_eq!(request.json_body(), Some(serde_json::json!({"user": "kim"})));
    }
}
