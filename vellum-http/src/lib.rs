//! Fetch primitive for Vellum.
//!
//! The router never talks to the network directly; it goes through the
//! [`Fetcher`] trait. [`HttpFetcher`] is the production implementation on
//! top of reqwest, and tests substitute in-memory fetchers.
//!
//! # Example
//!
//! ```no_run
//! use vellum_http::{Fetcher, FetchRequest, HttpClientConfig, HttpFetcher};
//!
//! # tokio_test::block_on(async {
//! let fetcher = HttpFetcher::new(
//!     HttpClientConfig::builder().base_url("http://localhost:8080").build(),
//! )
//! .unwrap();
//! let response = fetcher.fetch(FetchRequest::get("/src/views/home.html")).await.unwrap();
//! if response.ok() {
//!     println!("{}", response.text().unwrap());
//! }
//! # });
//! ```

mod client;
mod config;
mod error;
mod request;
mod response;

pub use client::{Fetcher, HttpFetcher};
pub use config::{HttpClientConfig, HttpClientConfigBuilder};
pub use error::{HttpClientError, Result};
pub use request::{FetchBody, FetchRequest, MultipartPart};
pub use response::FetchResponse;

pub use http::{Method, StatusCode};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        FetchRequest, FetchResponse, Fetcher, HttpClientConfig, HttpClientError, HttpFetcher,
        Result,
    };
}
