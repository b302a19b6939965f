//! Fetch trait and the reqwest-backed client.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::{
    FetchBody, FetchRequest, FetchResponse, HttpClientConfig, HttpClientError, MultipartPart,
    Result,
};

/// The fetch primitive: `(request) -> response`.
///
/// Non-2xx statuses are returned as responses, not errors; callers decide
/// what a failure means for them.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform a request.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;
}

#[async_trait]
impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        (**self).fetch(request).await
    }
}

/// HTTP client over reqwest.
#[derive(Clone)]
pub struct HttpFetcher {
    inner: reqwest::Client,
    config: Arc<HttpClientConfig>,
}

impl HttpFetcher {
    /// Create a new client with the given configuration.
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| HttpClientError::RequestBuild(e.to_string()))?;

        Ok(Self {
            inner,
            config: Arc::new(config),
        })
    }

    /// Create a client with default configuration.
    pub fn default_client() -> Result<Self> {
        Self::new(HttpClientConfig::default())
    }

    /// Get the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Resolve a possibly relative URL against the configured base URL.
    pub fn resolve_url(&self, url: &str) -> Result<url::Url> {
        match url::Url::parse(url) {
            Ok(parsed) => Ok(parsed),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self
                    .config
                    .base_url
                    .as_deref()
                    .ok_or_else(|| HttpClientError::InvalidUrl(url.to_string()))?;
                Ok(url::Url::parse(base)?.join(url)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn build(&self, request: FetchRequest) -> Result<reqwest::RequestBuilder> {
        let url = self.resolve_url(&request.url)?;
        let mut builder = self.inner.request(request.method, url);

        for (name, value) in &self.config.default_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        builder = match request.body {
            FetchBody::Empty => builder,
            FetchBody::Bytes(bytes) => builder.body(bytes),
            FetchBody::Multipart(parts) => builder.multipart(multipart_form(parts)?),
        };
        Ok(builder)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let timeout = request.timeout.unwrap_or(self.config.timeout);
        debug!(method = %request.method, url = %request.url, "Sending request");

        let response = self.build(request)?.send().await.map_err(|e| {
            if e.is_timeout() {
                HttpClientError::Timeout(timeout)
            } else if e.is_connect() {
                HttpClientError::Connection(e.to_string())
            } else {
                HttpClientError::Http(e)
            }
        })?;
        FetchResponse::from_reqwest(response).await
    }
}

fn multipart_form(parts: Vec<MultipartPart>) -> Result<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        form = match part {
            MultipartPart::Text { name, value } => form.text(name, value),
            MultipartPart::File {
                name,
                filename,
                content_type,
                data,
            } => {
                let mut file = reqwest::multipart::Part::bytes(data.to_vec()).file_name(filename);
                if let Some(content_type) = content_type {
                    file = file
                        .mime_str(&content_type)
                        .map_err(|e| HttpClientError::RequestBuild(e.to_string()))?;
                }
                form.part(name, file)
            }
        };
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_client_with_config() {
        let config = HttpClientConfig::builder()
            .timeout(Duration::from_secs(60))
            .base_url("https://api.example.com")
            .build();

        let client = HttpFetcher::new(config).unwrap();
        assert_eq!(client.config().timeout, Duration::from_secs(60));
        assert_eq!(
            client.resolve_url("/users").unwrap().as_str(),
            "https://api.example.com/users"
        );
    }

    #[test]
    fn test_relative_url_without_base() {
        let client = HttpFetcher::default_client().unwrap();
        assert!(matches!(
            client.resolve_url("/users"),
            Err(HttpClientError::InvalidUrl(_))
        ));
        assert!(client.resolve_url("http://localhost/x").is_ok());
    }
}
