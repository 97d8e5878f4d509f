//! Relational store access.
//!
//! # Responsibilities
//! - Own the bounded PostgreSQL connection pool
//! - Execute parameterized statements
//! - Provide the liveness probe used by `/health`
//! - Evict connections idle longer than the configured timeout
//!
//! # Design Decisions
//! - Constructed once at startup and shared through `Arc`
//! - Connections are opened lazily by the pool on first use
//! - Query failures propagate to the caller; there are no retries

pub mod client;

pub use client::{PoolStatus, StoreClient, StoreError};
