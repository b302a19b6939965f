//! HttpFetcher against a mock server.

use std::time::Duration;
use vellum_http::*;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn fetcher_for(server: &MockServer) -> HttpFetcher {
    HttpFetcher::new(HttpClientConfig::builder().base_url(server.uri()).build()).unwrap()
}

#[tokio::test]
async fn test_get_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/src/views/home.html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Home</h1>"))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server).await;
    let response = fetcher
        .fetch(FetchRequest::get("/src/views/home.html"))
        .await
        .unwrap();

    assert!(response.ok());
    assert_eq!(response.text().unwrap(), "<h1>Home</h1>");
}

#[tokio::test]
async fn test_non_success_is_a_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server).await;
    let response = fetcher.fetch(FetchRequest::get("/missing")).await.unwrap();

    assert!(!response.ok());
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.status_text(), "Not Found");
}

#[tokio::test]
async fn test_post_json_with_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/login"))
        .and(header("authorization", "Bearer t0k"))
        .and(body_json(serde_json::json!({"user": "kim"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})),
        )
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server).await;
    let request = FetchRequest::post("/api/login")
        .with_json(&serde_json::json!({"user": "kim"}))
        .unwrap()
        .with_bearer("t0k");
    let response = fetcher.fetch(request).await.unwrap();

    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_per_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server).await;
    let err = fetcher
        .fetch(FetchRequest::get("/slow").with_timeout(Duration::from_millis(50)))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
}
