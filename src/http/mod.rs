//! HTTP request pipeline.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → correlation.rs (assign id, attach RequestContext)
//!     → access_log.rs (incoming + completion lines, metrics)
//!     → [security headers, CORS, timeout, body limit]
//!     → error.rs (AppError → JSON envelope)
//!     → cache.rs (read-through cache, cacheable routes only)
//!     → handler
//! ```

pub mod access_log;
pub mod cache;
pub mod correlation;
pub mod error;
pub mod server;

pub use cache::ResponseCacheLayer;
pub use correlation::{CorrelationId, RequestContext, X_CORRELATION_ID};
pub use error::AppError;
pub use server::{build_router, build_router_with, AppState, HttpServer};
