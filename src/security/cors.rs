//! Cross-origin policy.

use axum::http::HeaderValue;
use tower_http::cors::{AllowHeaders, AllowMethods, CorsLayer};

use crate::http::correlation::X_CORRELATION_ID;

/// Credentialed CORS for exactly one origin. Methods and headers mirror the
/// preflight, since a wildcard is not allowed alongside credentials.
pub fn cors_layer(origin: HeaderValue) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers([X_CORRELATION_ID])
}
