//! Caching layer.
//!
//! # Data Flow
//! ```text
//! http::cache (response decorator)
//!     → client.rs (JSON encode/decode, failure absorption, logging)
//!     → backend.rs (CacheBackend trait)
//!         → redis.rs (production)
//!         → memory.rs (tests, outage simulation)
//! ```
//!
//! # Design Decisions
//! - The cache is advisory: an outage degrades latency, never correctness
//! - Values are stored as JSON text with a per-entry TTL

pub mod backend;
pub mod client;
pub mod memory;
pub mod redis;

pub use backend::{CacheBackend, CacheError, CacheResult};
pub use client::CacheClient;
pub use memory::MemoryBackend;
pub use self::redis::RedisBackend;
