//! Route table.
//!
//! ```text
//! GET /               → handlers::root      (response-cached)
//! GET /api/{version}  → handlers::api_info
//! GET /health         → handlers::health
//! *                   → handlers::not_found (JSON 404)
//! ```

pub mod handlers;

use axum::routing::get;
use axum::Router;

use crate::http::{AppState, ResponseCacheLayer};

pub const HEALTH_PATH: &str = "/health";

/// Path of the versioned API info endpoint.
pub fn api_path(version: &str) -> String {
    format!("/api/{}", version)
}

pub fn routes(state: &AppState) -> Router<AppState> {
    let cache = ResponseCacheLayer::new(state.cache.clone(), state.cache.default_ttl());

    Router::new()
        .route("/", get(handlers::root).route_layer(cache))
        .route(&api_path(&state.config.server.api_version), get(handlers::api_info))
        .route(HEALTH_PATH, get(handlers::health))
}
