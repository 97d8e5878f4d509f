//! Redis-backed cache storage.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use url::Url;

use super::backend::{CacheBackend, CacheError, CacheResult};
use crate::config::CacheConfig;

/// Bound on establishing the shared connection, so a probe against a
/// down server answers promptly instead of backing off for seconds.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// After a failed connect, calls fail fast with `Unavailable` for this long.
const RECONNECT_COOLDOWN: Duration = Duration::from_secs(5);

/// Redis backend. The connection is opened on first use and reused for
/// the life of the handle. A failed attempt is retried once the reconnect
/// cooldown has passed.
pub struct RedisBackend {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
    endpoint: String,
    cooldown: Duration,
    last_failure: Mutex<Option<Instant>>,
}

impl RedisBackend {
    pub fn new(config: &CacheConfig) -> CacheResult<Self> {
        let url = connection_url(config)?;
        let client = redis::Client::open(url.as_str())?;

        Ok(Self {
            client,
            conn: OnceCell::new(),
            endpoint: format!("{}:{}", config.host, config.port),
            cooldown: RECONNECT_COOLDOWN,
            last_failure: Mutex::new(None),
        })
    }

    pub fn with_reconnect_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn connection(&self) -> CacheResult<ConnectionManager> {
        if let Some(conn) = self.conn.get() {
            return Ok(conn.clone());
        }
        let conn = self
            .conn
            .get_or_try_init(|| async {
                // Callers queued behind a failed attempt land here too.
                if self.cooling_down() {
                    return Err(CacheError::Unavailable);
                }
                let config = ConnectionManagerConfig::new()
                    .set_number_of_retries(1)
                    .set_connection_timeout(CONNECT_TIMEOUT);
                match ConnectionManager::new_with_config(self.client.clone(), config).await {
                    Ok(manager) => {
                        tracing::info!(service = "cache", endpoint = %self.endpoint, "Redis connection established");
                        Ok(manager)
                    }
                    Err(e) => {
                        self.record_failure();
                        tracing::warn!(
                            service = "cache",
                            endpoint = %self.endpoint,
                            retry_in_ms = self.cooldown.as_millis() as u64,
                            error = %e,
                            "Redis connection failed"
                        );
                        Err(CacheError::from(e))
                    }
                }
            })
            .await?;
        Ok(conn.clone())
    }

    fn cooling_down(&self) -> bool {
        self.last_failure
            .lock()
            .ok()
            .and_then(|last| *last)
            .is_some_and(|at| at.elapsed() < self.cooldown)
    }

    fn record_failure(&self) {
        if let Ok(mut last) = self.last_failure.lock() {
            *last = Some(Instant::now());
        }
    }
}

fn connection_url(config: &CacheConfig) -> CacheResult<Url> {
    let mut url = Url::parse("redis://localhost")
        .map_err(|e| CacheError::Endpoint(e.to_string()))?;
    url.set_host(Some(&config.host))
        .map_err(|e| CacheError::Endpoint(format!("{}: {}", config.host, e)))?;
    url.set_port(Some(config.port))
        .map_err(|_| CacheError::Endpoint(format!("port {}", config.port)))?;
    if !config.password.is_empty() {
        url.set_password(Some(&config.password))
            .map_err(|_| CacheError::Endpoint("password".into()))?;
    }
    Ok(url)
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        let seconds = ttl_seconds(ttl)?;
        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(key, value, seconds).await?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> CacheResult<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        let removed: usize = conn.del(keys.to_vec()).await?;
        Ok(removed)
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await?;
        Ok(keys)
    }

    async fn ping(&self) -> CacheResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Redis expiries are whole seconds; sub-second TTLs round up.
fn ttl_seconds(ttl: Duration) -> CacheResult<u64> {
    if ttl.is_zero() {
        return Err(CacheError::InvalidTtl);
    }
    let mut seconds = ttl.as_secs();
    if ttl.subsec_nanos() > 0 {
        seconds += 1;
    }
    Ok(seconds)
}
