//! Devstack backend library.
//!
//! An HTTP API scaffold over PostgreSQL and Redis: validated environment
//! configuration, structured logging, a correlation-id request pipeline
//! with an optional read-through response cache, and a dependency health
//! endpoint.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Dependencies
pub mod cache;
pub mod health;
pub mod store;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod security;

pub use config::AppConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;

/// `service` tag stamped on request-scoped log lines.
pub const SERVICE_NAME: &str = "backend";

/// Human-readable name returned by the info endpoints.
pub const SERVICE_TITLE: &str = "Devstack Backend API";
