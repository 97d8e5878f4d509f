//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → aggregator.rs (spawn one probe per dependency)
//!     → HealthProbe::probe (store: SELECT NOW(), cache: PING)
//!     → HealthReport (ok / degraded / error)
//! ```
//!
//! # Design Decisions
//! - Probes never fail; an unreachable dependency is `false`
//! - Reports are computed per request and never cached

pub mod aggregator;

use async_trait::async_trait;

pub use aggregator::{HealthAggregator, HealthReport, HealthStatus, ServiceState, ServiceStatuses};

/// A liveness check against one dependency.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Dependency name used in logs and metrics.
    fn name(&self) -> &'static str;

    /// `true` when a trivial round trip succeeds.
    async fn probe(&self) -> bool;
}
