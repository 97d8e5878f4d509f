//! Correlation id assignment.
//!
//! # Responsibilities
//! - Reuse the caller's `X-Correlation-Id` or generate one
//! - Attach a [`RequestContext`] to the request for downstream stages
//! - Echo the id on the response byte-for-byte
//!
//! # Design Decisions
//! - Runs first, so every later log line and error body carries the id
//! - Generated ids are unique on a best-effort basis, not cryptographic

use std::fmt;

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use serde_json::Value;

use crate::http::error::AppError;
use crate::observability::logger::CORRELATION_FIELD;
use crate::observability::Logger;
use crate::SERVICE_NAME;

pub const X_CORRELATION_ID: HeaderName = HeaderName::from_static("x-correlation-id");

const SUFFIX_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;

/// Opaque per-request identifier.
///
/// Keeps the header value exactly as received for the echo, plus a text
/// form for logs and error bodies. Non-UTF-8 bytes are replaced in the text
/// form only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationId {
    header: HeaderValue,
    text: String,
}

impl CorrelationId {
    /// `req-<unix millis>-<9 base36 chars>`.
    pub fn generate() -> Self {
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_ALPHABET[fastrand::usize(..SUFFIX_ALPHABET.len())] as char)
            .collect();
        Self::from_text(format!("req-{}-{}", Utc::now().timestamp_millis(), suffix))
    }

    /// The caller-supplied id, when present and non-empty. The value is
    /// used as sent, including whitespace and obs-text bytes.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(&X_CORRELATION_ID)
            .filter(|v| !v.is_empty())
            .map(|v| Self {
                header: v.clone(),
                text: String::from_utf8_lossy(v.as_bytes()).into_owned(),
            })
    }

    fn from_text(text: String) -> Self {
        let header = HeaderValue::from_str(&text)
            .unwrap_or_else(|_| HeaderValue::from_static("invalid"));
        Self { header, text }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The value echoed in `X-Correlation-Id`.
    pub fn header_value(&self) -> &HeaderValue {
        &self.header
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Per-request values threaded through the pipeline.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub correlation_id: CorrelationId,
    /// Tagged with `service` and `correlation_id`.
    pub logger: Logger,
}

impl RequestContext {
    pub fn new(correlation_id: CorrelationId) -> Self {
        let logger = Logger::service(SERVICE_NAME)
            .child([(CORRELATION_FIELD, Value::from(correlation_id.as_str()))]);
        Self {
            correlation_id,
            logger,
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestContext {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .ok_or_else(|| AppError::Internal("request context missing".into()))
    }
}

/// First pipeline stage.
pub async fn correlation_middleware(mut req: Request, next: Next) -> Response {
    let correlation_id =
        CorrelationId::from_headers(req.headers()).unwrap_or_else(CorrelationId::generate);
    req.extensions_mut()
        .insert(RequestContext::new(correlation_id.clone()));

    let mut response = next.run(req).await;

    response
        .headers_mut()
        .insert(X_CORRELATION_ID, correlation_id.header_value().clone());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    fn router() -> Router {
        Router::new()
            .route("/", get(|ctx: RequestContext| async move { ctx.correlation_id.to_string() }))
            .layer(from_fn(correlation_middleware))
    }

    async fn echo(value: Option<HeaderValue>) -> (Option<HeaderValue>, String) {
        let mut req = axum::http::Request::builder().uri("/");
        if let Some(value) = value {
            req = req.header(X_CORRELATION_ID, value);
        }
        let response = router()
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let echoed = response.headers().get(X_CORRELATION_ID).cloned();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (echoed, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn test_generated_shape() {
        let id = CorrelationId::generate();
        let parts: Vec<&str> = id.as_str().split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "req");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_generated_ids_differ() {
        assert_ne!(CorrelationId::generate(), CorrelationId::generate());
    }

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        assert!(CorrelationId::from_headers(&headers).is_none());

        headers.insert(X_CORRELATION_ID, HeaderValue::from_static(""));
        assert!(CorrelationId::from_headers(&headers).is_none());

        headers.insert(X_CORRELATION_ID, HeaderValue::from_static("abc-123"));
        assert_eq!(
            CorrelationId::from_headers(&headers).unwrap().as_str(),
            "abc-123"
        );

        headers.insert(X_CORRELATION_ID, HeaderValue::from_static(" padded "));
        assert_eq!(
            CorrelationId::from_headers(&headers).unwrap().as_str(),
            " padded "
        );
    }

    #[tokio::test]
    async fn test_echo_preserves_raw_bytes() {
        let sent = HeaderValue::from_bytes(b"caf\xe9-42").unwrap();
        let (echoed, seen) = echo(Some(sent.clone())).await;

        assert_eq!(echoed.unwrap().as_bytes(), sent.as_bytes());
        assert_eq!(seen, "caf\u{fffd}-42");
    }

    #[tokio::test]
    async fn test_echo_keeps_surrounding_whitespace() {
        let sent = HeaderValue::from_static("\t trace-7 ");
        let (echoed, seen) = echo(Some(sent.clone())).await;

        assert_eq!(echoed.unwrap(), sent);
        assert_eq!(seen, "\t trace-7 ");
    }

    #[tokio::test]
    async fn test_missing_id_is_generated_and_echoed() {
        let (echoed, seen) = echo(None).await;

        let echoed = echoed.unwrap();
        assert!(seen.starts_with("req-"));
        assert_eq!(echoed.to_str().unwrap(), seen);
    }

    #[test]
    fn test_context_logger_tags() {
        let ctx = RequestContext::new(CorrelationId::from_text("req-1".into()));
        assert_eq!(ctx.logger.tag(CORRELATION_FIELD), Some(&Value::from("req-1")));
        assert_eq!(ctx.logger.tag("service"), Some(&Value::from(SERVICE_NAME)));
    }
}
