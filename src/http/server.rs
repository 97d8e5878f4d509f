//! HTTP server setup.
//!
//! # Responsibilities
//! - Assemble the request pipeline around the routes
//! - Serve over plain TCP or rustls
//! - Stop accepting and drain on shutdown
//!
//! # Pipeline (outermost first)
//! ```text
//! correlation → access log → security headers → CORS → timeout
//!     → body limit → error envelope → panic guard → routes
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::cache::CacheClient;
use crate::config::AppConfig;
use crate::health::HealthAggregator;
use crate::http::access_log::access_log_middleware;
use crate::http::correlation::correlation_middleware;
use crate::http::error::{error_envelope, panic_response};
use crate::routing;
use crate::security::{cors_layer, with_security_headers};

/// In-flight TLS connections get this long to finish after shutdown.
const TLS_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub cache: CacheClient,
    pub health: HealthAggregator,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, cache: CacheClient, health: HealthAggregator) -> Self {
        Self {
            config,
            cache,
            health,
        }
    }
}

/// Router with the built-in routes only.
pub fn build_router(state: AppState) -> Router {
    build_router_with(state, Router::new())
}

/// Router with `extra` routes merged in ahead of the 404 fallback. Extra
/// routes run inside the same pipeline as the built-in ones.
#[allow(deprecated)]
pub fn build_router_with(state: AppState, extra: Router<AppState>) -> Router {
    let server = state.config.server.clone();

    let router = routing::routes(&state)
        .merge(extra)
        .fallback(routing::handlers::not_found)
        .with_state(state)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(from_fn_with_state(server.environment, error_envelope))
        .layer(RequestBodyLimitLayer::new(server.body_limit_bytes))
        .layer(TimeoutLayer::new(server.request_timeout))
        .layer(cors_layer(server.cors_origin));

    with_security_headers(router)
        .layer(from_fn(access_log_middleware))
        .layer(from_fn(correlation_middleware))
}

/// HTTP(S) front end.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: build_router(state),
        }
    }

    pub fn with_router(router: Router) -> Self {
        Self { router }
    }

    /// Serve plain HTTP until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires, then drain.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let trigger = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            trigger.graceful_shutdown(Some(TLS_DRAIN_TIMEOUT));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::state;
    use super::*;
    use crate::config::Environment;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::routing::{get, post};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_pipeline_headers() {
        let response = build_router(state(Environment::Development))
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-correlation-id"));
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    }

    #[tokio::test]
    async fn test_fallback_is_enveloped() {
        let response = build_router(state(Environment::Development))
            .oneshot(
                Request::builder()
                    .uri("/nope")
                    .header("x-correlation-id", "abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["x-correlation-id"], "abc");
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["correlationId"], "abc");
        assert_eq!(body["error"]["statusCode"], 404);
    }

    #[tokio::test]
    async fn test_extra_routes_share_pipeline() {
        let extra = Router::new().route("/echo", post(|body: String| async move { body }));
        let router = build_router_with(state(Environment::Test), extra);

        let ok = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/echo")
                    .body(Body::from("short"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        assert!(ok.headers().contains_key("x-correlation-id"));

        let too_big = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/echo")
                    .header(header::CONTENT_LENGTH, "64")
                    .body(Body::from("x".repeat(64)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(too_big.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_unknown_method_on_known_path() {
        let extra = Router::new().route("/only-get", get(|| async { "ok" }));
        let response = build_router_with(state(Environment::Test), extra)
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/only-get")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
