//! Composite dependency health.

use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::HealthProbe;
use crate::observability::metrics;

/// Overall status of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Error,
}

/// Per-dependency status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Healthy,
    Unhealthy,
    Unknown,
}

impl From<bool> for ServiceState {
    fn from(healthy: bool) -> Self {
        if healthy {
            ServiceState::Healthy
        } else {
            ServiceState::Unhealthy
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatuses {
    pub database: ServiceState,
    pub redis: ServiceState,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    /// ISO-8601, millisecond precision, taken when the report is built.
    pub timestamp: String,
    pub services: ServiceStatuses,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthReport {
    pub fn http_status(&self) -> StatusCode {
        match self.status {
            HealthStatus::Ok => StatusCode::OK,
            HealthStatus::Degraded | HealthStatus::Error => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Runs the store and cache probes and folds them into one report.
#[derive(Clone)]
pub struct HealthAggregator {
    store: Arc<dyn HealthProbe>,
    cache: Arc<dyn HealthProbe>,
}

impl HealthAggregator {
    pub fn new(store: Arc<dyn HealthProbe>, cache: Arc<dyn HealthProbe>) -> Self {
        Self { store, cache }
    }

    /// Probe both dependencies concurrently. Each probe runs on its own
    /// task; a probe that panics turns the report into `error`.
    pub async fn check(&self) -> HealthReport {
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        let store_task = tokio::spawn(async move { store.probe().await });
        let cache_task = tokio::spawn(async move { cache.probe().await });

        let (store_result, cache_result) = tokio::join!(store_task, cache_task);

        let (status, services, error) = match (store_result, cache_result) {
            (Ok(store_ok), Ok(cache_ok)) => {
                metrics::record_dependency_health(self.store.name(), store_ok);
                metrics::record_dependency_health(self.cache.name(), cache_ok);
                let status = if store_ok && cache_ok {
                    HealthStatus::Ok
                } else {
                    HealthStatus::Degraded
                };
                let services = ServiceStatuses {
                    database: store_ok.into(),
                    redis: cache_ok.into(),
                };
                (status, services, None)
            }
            (store_result, cache_result) => {
                let error = [store_result.as_ref().err(), cache_result.as_ref().err()]
                    .into_iter()
                    .flatten()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                tracing::error!(error = %error, "Health aggregation failed");
                let services = ServiceStatuses {
                    database: store_result.map_or(ServiceState::Unknown, ServiceState::from),
                    redis: cache_result.map_or(ServiceState::Unknown, ServiceState::from),
                };
                (HealthStatus::Error, services, Some(error))
            }
        };

        HealthReport {
            status,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            services,
            error,
        }
    }
}
