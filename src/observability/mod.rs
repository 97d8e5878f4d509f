//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logger.rs (tagged records: service, correlation id, metadata)
//!     → logging.rs (subscriber: console + rotated files)
//!     → metrics.rs (counters, gauges, histograms)
//! ```
//!
//! # Design Decisions
//! - Correlation id flows through every request-scoped record
//! - JSON lines outside development for machine parsing
//! - Metrics are cheap and optional

pub mod logger;
pub mod logging;
pub mod metrics;

pub use logger::Logger;
pub use logging::{init_logging, LoggingError, LoggingGuard, OutputFormat};
