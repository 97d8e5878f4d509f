//! End-to-end tests of the request pipeline over a real socket.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use devstack_backend::cache::{CacheClient, MemoryBackend};
use devstack_backend::config::Environment;
use devstack_backend::http::{AppError, AppState, RequestContext, ResponseCacheLayer};
use devstack_sdk::{ErrorEnvelope, CORRELATION_HEADER};
use serde_json::{json, Value};

mod common;

#[tokio::test]
async fn test_correlation_id_echoed() {
    let app = common::spawn_app().await;

    let resp = app.client.get("/", Some("trace-me-123")).await.unwrap();
    assert_eq!(resp.headers()[CORRELATION_HEADER], "trace-me-123");
}

#[tokio::test]
async fn test_correlation_id_generated() {
    let app = common::spawn_app().await;

    let first = app.client.get("/health", None).await.unwrap();
    let second = app.client.get("/health", None).await.unwrap();
    let a = first.headers()[CORRELATION_HEADER].to_str().unwrap().to_string();
    let b = second.headers()[CORRELATION_HEADER].to_str().unwrap().to_string();

    assert!(a.starts_with("req-"));
    assert_ne!(a, b);
}

#[tokio::test]
async fn test_info_endpoints() {
    let app = common::spawn_app().await;

    let root = app.client.info().await.unwrap();
    assert_eq!(root.version, "v1");
    assert_eq!(root.endpoints.health, "/health");
    assert_eq!(root.endpoints.api, "/api/v1");

    let api = app.client.api_info("v1").await.unwrap();
    assert_eq!(api.environment, "development");
    assert!(chrono::DateTime::parse_from_rfc3339(&api.timestamp).is_ok());
}

#[tokio::test]
async fn test_root_is_cached() {
    let app = common::spawn_app().await;

    let first = app.client.get("/", None).await.unwrap();
    assert_eq!(first.headers()["x-cache"], "MISS");
    let first = first.bytes().await.unwrap();

    let second = app.client.get("/", None).await.unwrap();
    assert_eq!(second.headers()["x-cache"], "HIT");
    assert_eq!(second.bytes().await.unwrap(), first);
    assert!(app.backend.contains("cache:GET:/"));
}

fn counted_routes(calls: Arc<AtomicUsize>, cache: CacheClient) -> Router<AppState> {
    Router::new().route(
        "/counted",
        get(move |ctx: RequestContext| {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                ctx.logger.debug("counted handler", json!({ "n": n }));
                Json(json!({ "n": n }))
            }
        })
        .route_layer(ResponseCacheLayer::new(cache, Duration::from_secs(60))),
    )
}

#[tokio::test]
async fn test_cached_handler_runs_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let backend = MemoryBackend::new();
    let cache = CacheClient::new(Arc::new(backend.clone()), Duration::from_secs(60));
    let app = common::spawn_app_with(
        common::test_config(Environment::Test),
        counted_routes(calls.clone(), cache),
    )
    .await;

    let a = reqwest::get(app.url("/counted?x=1")).await.unwrap().text().await.unwrap();
    let b = reqwest::get(app.url("/counted?x=1")).await.unwrap().text().await.unwrap();

    assert_eq!(a, b);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(backend.contains("cache:GET:/counted?x=1"));
}

#[tokio::test]
async fn test_post_never_cached() {
    let app = common::spawn_app().await;
    let client = reqwest::Client::new();

    let resp = client.post(app.url("/")).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
    assert!(!app.backend.contains("cache:POST:/"));
    assert!(app.backend.is_empty());
}

#[tokio::test]
async fn test_cache_outage_does_not_change_response() {
    let app = common::spawn_app().await;
    let healthy = app.client.info().await.unwrap();

    app.backend.set_available(false);
    let resp = app.client.get("/", None).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: Value = resp.json().await.unwrap();

    assert_eq!(body["message"], healthy.message);
    assert_eq!(body["version"], healthy.version);
}

#[tokio::test]
async fn test_unknown_route_envelope() {
    let app = common::spawn_app().await;

    let resp = app.client.get("/does/not/exist", Some("corr-404")).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    assert_eq!(resp.headers()[CORRELATION_HEADER], "corr-404");

    let envelope: ErrorEnvelope = resp.json().await.unwrap();
    assert_eq!(envelope.error.status_code, 404);
    assert_eq!(envelope.error.correlation_id, "corr-404");
    assert!(envelope.error.message.contains("/does/not/exist"));
    assert!(envelope.error.stack.is_some());
}

#[tokio::test]
async fn test_production_hides_stack() {
    let extra = Router::new().route(
        "/fail",
        get(|| async { Err::<Json<Value>, _>(AppError::Internal("kaput".into())) }),
    );
    let app = common::spawn_app_with(common::test_config(Environment::Production), extra).await;

    let resp = app.client.get("/fail", None).await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let correlation = resp.headers()[CORRELATION_HEADER].to_str().unwrap().to_string();

    let envelope: ErrorEnvelope = resp.json().await.unwrap();
    assert_eq!(envelope.error.message, "kaput");
    assert_eq!(envelope.error.correlation_id, correlation);
    assert!(envelope.error.stack.is_none());
}

#[tokio::test]
async fn test_security_and_cors_headers() {
    let app = common::spawn_app().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(app.url("/"))
        .header("origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();

    let headers = resp.headers();
    assert_eq!(headers["access-control-allow-origin"], "http://localhost:3000");
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
    assert_eq!(headers["x-content-type-options"], "nosniff");
}
