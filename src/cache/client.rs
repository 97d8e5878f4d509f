//! Fault-tolerant cache operations.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;

use super::backend::CacheBackend;
use crate::health::HealthProbe;
use crate::observability::Logger;

/// Advisory cache. No operation ever returns an error: failures are logged
/// and degrade to a miss, `false` or `0`.
#[derive(Clone)]
pub struct CacheClient {
    backend: Arc<dyn CacheBackend>,
    default_ttl: Duration,
    logger: Logger,
}

impl CacheClient {
    pub fn new(backend: Arc<dyn CacheBackend>, default_ttl: Duration) -> Self {
        Self {
            backend,
            default_ttl,
            logger: Logger::service("cache"),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Deserialized value, or `None` on a miss or any failure.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                self.logger.debug("Cache miss", json!({ "key": key }));
                return None;
            }
            Err(e) => {
                self.logger
                    .error("Cache get error", json!({ "key": key, "error": e.to_string() }));
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                self.logger.debug("Cache hit", json!({ "key": key }));
                Some(value)
            }
            Err(e) => {
                self.logger.error(
                    "Cache entry undecodable",
                    json!({ "key": key, "error": e.to_string() }),
                );
                None
            }
        }
    }

    /// Store `value` as JSON. `ttl` defaults to the configured TTL.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let serialized = match serde_json::to_string(value) {
            Ok(s) => s,
            Err(e) => {
                self.logger
                    .error("Cache set error", json!({ "key": key, "error": e.to_string() }));
                return false;
            }
        };

        match self.backend.set_ex(key, serialized, ttl).await {
            Ok(()) => {
                self.logger
                    .debug("Cache set", json!({ "key": key, "ttl_secs": ttl.as_secs_f64() }));
                true
            }
            Err(e) => {
                self.logger
                    .error("Cache set error", json!({ "key": key, "error": e.to_string() }));
                false
            }
        }
    }

    pub async fn del(&self, key: &str) -> bool {
        match self.backend.del(&[key.to_string()]).await {
            Ok(_) => {
                self.logger.debug("Cache deleted", json!({ "key": key }));
                true
            }
            Err(e) => {
                self.logger
                    .error("Cache delete error", json!({ "key": key, "error": e.to_string() }));
                false
            }
        }
    }

    /// Delete every key matching a glob pattern. Returns the number of keys
    /// found, 0 on failure.
    pub async fn clear(&self, pattern: &str) -> usize {
        let result = async {
            let keys = self.backend.keys(pattern).await?;
            if !keys.is_empty() {
                self.backend.del(&keys).await?;
            }
            Ok::<_, super::CacheError>(keys.len())
        }
        .await;

        match result {
            Ok(count) => {
                if count > 0 {
                    self.logger
                        .debug("Cache cleared", json!({ "pattern": pattern, "count": count }));
                }
                count
            }
            Err(e) => {
                self.logger.error(
                    "Cache clear error",
                    json!({ "pattern": pattern, "error": e.to_string() }),
                );
                0
            }
        }
    }

    /// Liveness probe against the backend.
    pub async fn ping(&self) -> bool {
        match self.backend.ping().await {
            Ok(()) => true,
            Err(e) => {
                self.logger
                    .error("Cache connection test failed", json!({ "error": e.to_string() }));
                false
            }
        }
    }
}

#[async_trait]
impl HealthProbe for CacheClient {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn probe(&self) -> bool {
        self.ping().await
    }
}
