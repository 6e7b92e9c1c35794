//! HTTP surface: health, photo endpoints and the caching proxy fallback

mod common;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, StatusCode, header},
};
use axum_test::TestServer;
use serde_json::Value;
use tower::ServiceExt;

use common::{Reply, ScriptedFetcher, noisy_png, shell_network, solid_png};
use estela_pod::compression::{CompressionConfig, ImageCompressor};
use estela_pod::config::Config;
use estela_pod::offline::{
    CacheStorage, MemoryCacheStorage, OfflineWorker, SEC_FETCH_DEST, WorkerHost,
};
use estela_pod::web::WebServer;

struct TestApp {
    router: Router,
    network: Arc<ScriptedFetcher>,
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.worker.upstream_url = common::ORIGIN.to_string();
    config.worker.app_shell = vec![
        "/".to_string(),
        "/index.html".to_string(),
        "/manifest.json".to_string(),
    ];
    config
}

async fn app_with(config: Config, register: bool) -> TestApp {
    let network = shell_network();
    let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
    let host = Arc::new(WorkerHost::new(network.clone()));

    if register {
        let worker = OfflineWorker::new(
            estela_pod::offline::WorkerOptions::from_config(&config.worker).unwrap(),
            network.clone(),
            storage,
        );
        host.register(Arc::new(worker)).await.unwrap();
    }

    let compressor = ImageCompressor::new(CompressionConfig::from(&config.compression)).unwrap();
    let server = WebServer::new(config, host, compressor, None).await.unwrap();
    TestApp {
        router: server.into_router(),
        network,
    }
}

async fn app() -> TestApp {
    app_with(test_config(), true).await
}

async fn send_request(
    app: &Router,
    request: Request<Body>,
) -> (StatusCode, axum::http::HeaderMap, axum::body::Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

fn get(uri: &str, destination: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .header(SEC_FETCH_DEST, destination)
        .body(Body::empty())
        .unwrap()
}

fn post(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

fn json(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_health_reports_active_worker() {
    let app = app().await;
    let server = TestServer::new(app.router).unwrap();

    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "healthy");
    assert_eq!(body["data"]["worker_state"], "activated");
    assert_eq!(body["data"]["cache_name"], "estela-pod-v1");
    assert_eq!(body["data"]["clients"], 1);
}

#[tokio::test]
async fn test_health_degraded_without_worker() {
    let app = app_with(test_config(), false).await;
    let server = TestServer::new(app.router).unwrap();

    let body: Value = server.get("/health").await.json();
    assert_eq!(body["data"]["status"], "degraded");
    assert!(body["data"].get("worker_state").is_none());
}

#[tokio::test]
async fn test_proxy_serves_upstream_response() {
    let app = app().await;
    app.network
        .set("/assets/app.js", Reply::Status(200, "console.log('pod')"));

    let (status, headers, body) = send_request(&app.router, get("/assets/app.js", "script")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "console.log('pod')");
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
}

#[tokio::test]
async fn test_proxy_passes_error_status_through() {
    let app = app().await;

    let (status, _, body) = send_request(&app.router, get("/nowhere", "document")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "not found");
}

#[tokio::test]
async fn test_proxy_serves_app_shell_when_upstream_is_down() {
    let app = app().await;
    app.network.set_all(Reply::Offline);

    let (status, _, body) = send_request(&app.router, get("/index.html", "document")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<html>shell</html>");
}

#[tokio::test]
async fn test_proxy_reports_bad_gateway_without_network_or_cache() {
    let app = app().await;
    app.network.set("/photo.png", Reply::Offline);

    let (status, _, body) = send_request(&app.router, get("/photo.png", "image")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let body = json(&body);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_proxy_forwards_query_and_backend_calls() {
    let app = app().await;
    app.network
        .set("/rest/v1/parcels", Reply::Status(200, "[]"));

    let (status, _, body) =
        send_request(&app.router, get("/rest/v1/parcels?select=id", "empty")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
    assert_eq!(app.network.calls_to("/rest/v1/parcels"), 1);
}

#[tokio::test]
async fn test_proxy_keeps_scheme_relative_path_on_upstream_origin() {
    let app = app().await;

    let (status, _, _) =
        send_request(&app.router, get("//attacker.example/steal?x=1", "document")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let requests = app.network.requests();
    let forwarded = requests
        .iter()
        .find(|r| r.url.path() == "//attacker.example/steal")
        .expect("request forwarded upstream");
    assert_eq!(forwarded.url.host_str(), Some("pod.example"));
    assert_eq!(forwarded.url.query(), Some("x=1"));
    assert!(
        requests
            .iter()
            .all(|r| r.url.host_str() == Some("pod.example"))
    );
}

#[tokio::test]
async fn test_proxy_keeps_non_utf8_header_bytes() {
    let app = app().await;
    app.network
        .set("/assets/app.js", Reply::Status(200, "ok"));
    app.network.set_header(
        "x-parcel-note",
        HeaderValue::from_bytes(b"r\xe9cup\xe9r\xe9").unwrap(),
    );

    let request = Request::builder()
        .method(Method::GET)
        .uri("/assets/app.js")
        .header(SEC_FETCH_DEST, "script")
        .header("x-device-name", HeaderValue::from_bytes(b"Bote \xf1and\xfa").unwrap())
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send_request(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-parcel-note"].as_bytes(), b"r\xe9cup\xe9r\xe9");
    let forwarded = app
        .network
        .requests()
        .into_iter()
        .find(|r| r.url.path() == "/assets/app.js")
        .unwrap();
    assert_eq!(
        forwarded.headers["x-device-name"].as_bytes(),
        b"Bote \xf1and\xfa"
    );
}

#[tokio::test]
async fn test_compress_endpoint_returns_jpeg_with_metadata() {
    let app = app().await;

    let (status, headers, body) =
        send_request(&app.router, post("/api/v1/photos/compress", noisy_png(64, 48))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/jpeg");
    assert_eq!(headers["x-photo-quality"], "0.80");
    assert_eq!(headers["x-photo-width"], "64");
    assert_eq!(headers["x-photo-height"], "48");
    assert_eq!(headers["x-photo-attempts"], "1");
    assert_eq!(&body[..2], &[0xFF, 0xD8]);
}

#[tokio::test]
async fn test_compress_endpoint_scales_large_photos() {
    let mut config = test_config();
    config.compression.max_dimension = 100;
    let app = app_with(config, true).await;

    let (status, headers, _) =
        send_request(&app.router, post("/api/v1/photos/compress", solid_png(400, 200))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["x-photo-width"], "100");
    assert_eq!(headers["x-photo-height"], "50");
}

#[tokio::test]
async fn test_compress_endpoint_rejects_bad_input() {
    let app = app().await;

    let (status, _, _) = send_request(&app.router, post("/api/v1/photos/compress", Vec::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send_request(
        &app.router,
        post("/api/v1/photos/compress", b"\x89PNG but truncated".to_vec()),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json(&body)["success"], false);
}

#[tokio::test]
async fn test_request_body_limit() {
    let mut config = test_config();
    config.web.max_request_size = 1024;
    let app = app_with(config, true).await;

    let (status, _, _) =
        send_request(&app.router, post("/api/v1/photos/compress", vec![0u8; 4096])).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_upload_validates_path_then_requires_storage() {
    let app = app().await;
    let parcel_id = uuid::Uuid::new_v4();

    let (status, _, _) = send_request(
        &app.router,
        post(&format!("/api/v1/photos/returns/{parcel_id}"), solid_png(8, 8)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send_request(
        &app.router,
        post("/api/v1/photos/pickup/not-a-parcel", solid_png(8, 8)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send_request(
        &app.router,
        post(&format!("/api/v1/photos/delivery/{parcel_id}"), solid_png(8, 8)),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json(&body)["success"], false);
}
