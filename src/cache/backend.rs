//! Key-value backend contract.

use std::time::Duration;

use async_trait::async_trait;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("invalid cache endpoint: {0}")]
    Endpoint(String),

    #[error("cache backend unavailable")]
    Unavailable,

    #[error("ttl must be at least one second")]
    InvalidTtl,
}

/// Raw operations against a key-value store holding text values.
///
/// Implementations report failures; the fault-tolerant layer on top is
/// [`CacheClient`](super::CacheClient).
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Write `value` expiring after `ttl`.
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;

    /// Delete keys, returning how many existed.
    async fn del(&self, keys: &[String]) -> CacheResult<usize>;

    /// Keys matching a glob pattern (`*`, `?`, `[...]`).
    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>>;

    async fn ping(&self) -> CacheResult<()>;
}
