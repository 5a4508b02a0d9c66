//! Front-end HTTP API, end to end.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use scrape_relay::config::ProcessingConfig;
use scrape_relay::http::HttpServer;

mod common;

use common::FakeFactory;

async fn get(server: &HttpServer, uri: &str) -> (StatusCode, Value, bool) {
    let response = server
        .router()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let has_request_id = response.headers().contains_key("x-request-id");
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap(), has_request_id)
}

fn encode(url: &str) -> String {
    url::form_urlencoded::byte_serialize(url.as_bytes()).collect()
}

#[tokio::test]
async fn health_reports_healthy() {
    let server = HttpServer::new(common::scraping_config(common::closed_port().await));

    let (status, body, has_request_id) = get(&server, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy"}));
    assert!(has_request_id);
}

#[tokio::test]
async fn missing_url_is_bad_request() {
    let server = HttpServer::new(common::scraping_config(common::closed_port().await));

    let (status, body, _) = get(&server, "/scrape").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"status": "error", "message": "URL parameter is required"}));
}

#[tokio::test]
async fn unparseable_query_is_json_bad_request() {
    let server = HttpServer::new(common::scraping_config(common::closed_port().await));

    let response = server
        .router()
        .oneshot(Request::builder().uri("/scrape?url=a&url=b").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("url"));
    assert_eq!(server.fetcher().calls(), 0);
}

#[tokio::test]
async fn invalid_url_rejected_without_fetching() {
    let server = HttpServer::new(common::scraping_config(common::closed_port().await));

    let (status, body, _) = get(&server, "/scrape?url=not-a-url").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid URL format");
    assert_eq!(server.fetcher().calls(), 0);
}

#[tokio::test]
async fn processing_down_still_succeeds() {
    let origin = common::start_origin().await;
    let server = HttpServer::new(common::scraping_config(common::closed_port().await));

    let page = format!("http://{}/page", origin);
    let (status, body, _) = get(&server, &format!("/scrape?url={}", encode(&page))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["scraping_data"]["title"], "Mock Page");
    assert_eq!(body["processing_data"]["error"], "Processing server not available");
    assert_eq!(body["processing_data"]["screenshot"], Value::Null);
    assert_eq!(body["processing_data"]["thumbnails"], json!([]));
}

#[tokio::test]
async fn fetch_failure_is_error_status() {
    let origin = common::start_origin().await;
    let server = HttpServer::new(common::scraping_config(common::closed_port().await));

    let missing = format!("http://{}/missing", origin);
    let (status, body, _) = get(&server, &format!("/scrape?url={}", encode(&missing))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().contains("404"));
    assert!(body.get("scraping_data").is_none());
}

#[tokio::test]
async fn unsupported_scheme_fails_at_fetch() {
    let server = HttpServer::new(common::scraping_config(common::closed_port().await));

    let (status, body, _) = get(&server, &format!("/scrape?url={}", encode("ftp://127.0.0.1:1/x"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "error");
    assert!(body.get("scraping_data").is_none());
    assert_eq!(server.fetcher().calls(), 1);
}

#[tokio::test]
async fn slow_scrape_times_out() {
    let origin = common::start_origin().await;
    let mut config = common::scraping_config(common::closed_port().await);
    config.scraping.request_timeout_secs = 1;
    let server = HttpServer::new(config);

    let hang = format!("http://{}/hang", origin);
    let (status, body, _) = get(&server, &format!("/scrape?url={}", encode(&hang))).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body, json!({"status": "error", "message": "Request timeout"}));
}

#[tokio::test]
async fn end_to_end_with_processing_server() {
    let origin = common::start_origin().await;
    let factory = FakeFactory {
        fail_screenshot: true,
        ..FakeFactory::default()
    };
    let processing = common::start_processing(factory, ProcessingConfig::default()).await;
    let server = HttpServer::new(common::scraping_config(processing.addr));

    let page = format!("http://{}/page", origin);
    let (status, body, _) = get(&server, &format!("/scrape?url={}", encode(&page))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], page);
    assert_eq!(body["status"], "success");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));

    let scraping = &body["scraping_data"];
    assert_eq!(scraping["title"], "Mock Page");
    assert_eq!(scraping["structure"], json!({"h2": 2}));
    assert_eq!(scraping["images_count"], 1);
    assert_eq!(scraping["text_content"], "Mock Page First Second next");
    assert_eq!(scraping["meta_tags"]["description"], "A page for tests");
    assert_eq!(scraping["links"], json!([format!("http://{}/next", origin)]));

    let processing_data = &body["processing_data"];
    assert_eq!(processing_data["screenshot"], Value::Null);
    assert_eq!(processing_data["performance"]["num_requests"], 4);
    assert_eq!(processing_data["thumbnails"].as_array().unwrap().len(), 1);
    assert!(processing_data.get("error").is_none());

    processing.shutdown.trigger();
    processing.handle.await.unwrap().unwrap();
}
