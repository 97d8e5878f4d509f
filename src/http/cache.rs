//! Read-through response cache for idempotent JSON endpoints.
//!
//! A tower decorator around a handler: on a hit the handler is skipped and
//! the stored body is replayed; on a miss the handler's 2xx JSON body is
//! stored under `cache:<METHOD>:<path>[?query]` before being returned.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::extract::Request;
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use tower::{Layer, Service};

use crate::cache::CacheClient;
use crate::http::correlation::RequestContext;
use crate::http::error::AppError;
use crate::observability::{metrics, Logger};
use crate::SERVICE_NAME;

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

#[derive(Clone)]
pub struct ResponseCacheLayer {
    cache: CacheClient,
    ttl: Duration,
}

impl ResponseCacheLayer {
    pub fn new(cache: CacheClient, ttl: Duration) -> Self {
        Self { cache, ttl }
    }
}

impl<S> Layer<S> for ResponseCacheLayer {
    type Service = ResponseCache<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ResponseCache {
            inner,
            cache: self.cache.clone(),
            ttl: self.ttl,
        }
    }
}

#[derive(Clone)]
pub struct ResponseCache<S> {
    inner: S,
    cache: CacheClient,
    ttl: Duration,
}

impl<S> Service<Request> for ResponseCache<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        // Keep the service that was polled ready.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let cache = self.cache.clone();
        let ttl = self.ttl;

        Box::pin(async move {
            let Some(key) = cache_key(&req) else {
                return inner.call(req).await;
            };
            let logger = req
                .extensions()
                .get::<RequestContext>()
                .map(|ctx| ctx.logger.clone())
                .unwrap_or_else(|| Logger::service(SERVICE_NAME));

            if let Some(body) = cache.get::<Value>(&key).await {
                metrics::record_cache_lookup(true);
                logger.debug("Serving cached response", json!({ "key": key }));
                return Ok(replay(&body));
            }
            metrics::record_cache_lookup(false);

            let response = inner.call(req).await?;
            Ok(store(&cache, &key, ttl, response, &logger).await)
        })
    }
}

/// `None` when the request must bypass the cache: anything but GET, or a
/// request carrying credentials.
pub fn cache_key(req: &Request) -> Option<String> {
    if req.method() != Method::GET {
        return None;
    }
    let headers = req.headers();
    if headers.contains_key(header::AUTHORIZATION) || headers.contains_key(header::COOKIE) {
        return None;
    }
    let target = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| req.uri().path());
    Some(format!("cache:{}:{}", req.method(), target))
}

fn replay(body: &Value) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => json_response(StatusCode::OK, bytes, "HIT"),
        Err(e) => AppError::Internal(format!("cached body unencodable: {}", e)).into_response(),
    }
}

fn json_response(status: StatusCode, bytes: Vec<u8>, cache_status: &'static str) -> Response {
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(X_CACHE, HeaderValue::from_static(cache_status));
    response
}

async fn store(
    cache: &CacheClient,
    key: &str,
    ttl: Duration,
    response: Response,
    logger: &Logger,
) -> Response {
    if !response.status().is_success() || !is_json(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return AppError::Internal(format!("failed to buffer response: {}", e))
                .into_response()
        }
    };
    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };
    // Re-encode so a miss and a later hit produce identical bytes.
    let encoded = match serde_json::to_vec(&value) {
        Ok(encoded) => encoded,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };

    if !cache.set(key, &value, Some(ttl)).await {
        logger.warn("Response not cached", json!({ "key": key }));
    }

    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.insert(X_CACHE, HeaderValue::from_static("MISS"));
    Response::from_parts(parts, Body::from(encoded))
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"))
}
