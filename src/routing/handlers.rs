//! Endpoint handlers.

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;

use super::{api_path, HEALTH_PATH};
use crate::health::{HealthReport, HealthStatus};
use crate::http::{AppError, AppState, RequestContext};
use crate::SERVICE_TITLE;

#[derive(Debug, Serialize)]
pub struct RootInfo {
    pub message: &'static str,
    pub version: String,
    pub endpoints: Endpoints,
}

#[derive(Debug, Serialize)]
pub struct Endpoints {
    pub health: &'static str,
    pub api: String,
}

#[derive(Debug, Serialize)]
pub struct ApiInfo {
    pub message: &'static str,
    pub version: String,
    pub environment: &'static str,
    pub timestamp: String,
}

/// `GET /`: service description.
pub async fn root(State(state): State<AppState>) -> Json<RootInfo> {
    let version = state.config.server.api_version.clone();
    Json(RootInfo {
        message: SERVICE_TITLE,
        endpoints: Endpoints {
            health: HEALTH_PATH,
            api: api_path(&version),
        },
        version,
    })
}

/// `GET /api/{version}`.
pub async fn api_info(State(state): State<AppState>) -> Json<ApiInfo> {
    let server = &state.config.server;
    Json(ApiInfo {
        message: SERVICE_TITLE,
        version: server.api_version.clone(),
        environment: server.environment.as_str(),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

/// `GET /health`: 200 when every dependency answers, 503 otherwise.
pub async fn health(
    State(state): State<AppState>,
    ctx: RequestContext,
) -> (StatusCode, Json<HealthReport>) {
    let report = state.health.check().await;
    if report.status != HealthStatus::Ok {
        ctx.logger.warn(
            "Health check failed",
            json!({ "status": report.status, "services": report.services }),
        );
    }
    (report.http_status(), Json(report))
}

pub async fn not_found(method: Method, uri: Uri) -> AppError {
    AppError::NotFound(format!("Cannot {} {}", method, uri.path()))
}
