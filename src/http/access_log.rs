//! Request/response logging.
//!
//! One "Incoming request" line on entry and one completion line once the
//! response exists, classified by status: 5xx error, 4xx warn, else info.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::json;

use crate::config::LogLevel;
use crate::http::correlation::RequestContext;
use crate::observability::{metrics, Logger};
use crate::SERVICE_NAME;

/// Second pipeline stage. Runs inside the correlation stage, outside the
/// cache stage, so cache hits are logged too.
pub async fn access_log_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let logger = req
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.logger.clone())
        .unwrap_or_else(|| Logger::service(SERVICE_NAME));

    let method = req.method().clone();
    let url = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let ip = client_ip(&req);
    let user_agent = req
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    logger.info(
        "Incoming request",
        json!({
            "method": method.as_str(),
            "url": url,
            "ip": ip,
            "user_agent": user_agent,
        }),
    );

    let response = next.run(req).await;

    let status = response.status();
    let metadata = json!({
        "method": method.as_str(),
        "url": url,
        "status_code": status.as_u16(),
        "duration_ms": start.elapsed().as_millis() as u64,
        "ip": ip,
    });
    match completion_level(status) {
        LogLevel::Error => logger.error("Request failed", metadata),
        LogLevel::Warn => logger.warn("Request error", metadata),
        _ => logger.info("Request completed", metadata),
    }
    metrics::record_request(method.as_str(), status.as_u16(), start);

    response
}

/// Severity of the completion line for a status.
pub fn completion_level(status: StatusCode) -> LogLevel {
    if status.is_server_error() {
        LogLevel::Error
    } else if status.is_client_error() {
        LogLevel::Warn
    } else {
        LogLevel::Info
    }
}

fn client_ip(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Environment;
    use crate::http::cache::X_CACHE;
    use crate::http::correlation::X_CORRELATION_ID;
    use crate::http::server::{build_router, testing::state};
    use crate::observability::logger::CORRELATION_FIELD;
    use crate::observability::logging::{capture, OutputFormat};
    use axum::body::Body;
    use serde_json::Value;
    use tower::ServiceExt;
    use tracing::Level;

    fn get(uri: &str, correlation_id: &'static str) -> Request {
        axum::http::Request::builder()
            .uri(uri)
            .header(X_CORRELATION_ID, correlation_id)
            .body(Body::empty())
            .unwrap()
    }

    fn lines_for<'a>(lines: &'a [Value], correlation_id: &str) -> Vec<&'a Value> {
        lines
            .iter()
            .filter(|line| line[CORRELATION_FIELD] == correlation_id)
            .collect()
    }

    #[tokio::test]
    async fn test_every_request_logs_entry_and_completion() {
        let (subscriber, buf) = capture::subscriber(OutputFormat::Json, Level::DEBUG);
        let _guard = tracing::subscriber::set_default(subscriber);
        let router = build_router(state(Environment::Test));

        let first = router.clone().oneshot(get("/", "corr-first")).await.unwrap();
        let second = router.clone().oneshot(get("/", "corr-second")).await.unwrap();
        let missing = router.oneshot(get("/nope", "corr-missing")).await.unwrap();

        assert_eq!(first.headers()[&X_CACHE], "MISS");
        assert_eq!(second.headers()[&X_CACHE], "HIT");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let lines = buf.json_lines();
        for id in ["corr-first", "corr-second"] {
            let tagged = lines_for(&lines, id);
            let messages: Vec<_> = tagged.iter().map(|l| l["message"].as_str().unwrap()).collect();
            assert_eq!(messages.first(), Some(&"Incoming request"), "{:?}", messages);
            assert_eq!(messages.last(), Some(&"Request completed"), "{:?}", messages);

            let completed = tagged.last().unwrap();
            assert_eq!(completed["level"], "info");
            assert_eq!(completed["service"], SERVICE_NAME);
            assert_eq!(completed["method"], "GET");
            assert_eq!(completed["url"], "/");
            assert_eq!(completed["status_code"], 200);
            assert!(completed["duration_ms"].is_u64());
        }

        let completed = *lines_for(&lines, "corr-missing").last().unwrap();
        assert_eq!(completed["message"], "Request error");
        assert_eq!(completed["level"], "warn");
        assert_eq!(completed["status_code"], 404);
    }

    #[test]
    fn test_completion_level() {
        assert_eq!(completion_level(StatusCode::OK), LogLevel::Info);
        assert_eq!(completion_level(StatusCode::NOT_MODIFIED), LogLevel::Info);
        assert_eq!(completion_level(StatusCode::NOT_FOUND), LogLevel::Warn);
        assert_eq!(completion_level(StatusCode::TOO_MANY_REQUESTS), LogLevel::Warn);
        assert_eq!(completion_level(StatusCode::INTERNAL_SERVER_ERROR), LogLevel::Error);
        assert_eq!(completion_level(StatusCode::SERVICE_UNAVAILABLE), LogLevel::Error);
    }
}
