//! Process-wide response hardening.
//!
//! # Data Flow
//! ```text
//! Outgoing response:
//!     → cors.rs (origin allow-list, credentials, exposed headers)
//!     → headers.rs (hardening headers, only when absent)
//! ```
//!
//! # Design Decisions
//! - One configured origin, matched exactly
//! - Handlers may override any hardening header they set themselves

pub mod cors;
pub mod headers;

pub use cors::cors_layer;
pub use headers::with_security_headers;
