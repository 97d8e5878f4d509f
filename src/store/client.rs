//! PostgreSQL pool handle.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_postgres::{
    Config, CreatePoolError, ManagerConfig, Pool, PoolConfig, PoolError, RecyclingMethod, Runtime,
};
use serde_json::json;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};

use crate::config::StoreConfig;
use crate::health::HealthProbe;
use crate::observability::Logger;

/// Statements are logged up to this many characters.
const STATEMENT_LOG_CHARS: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create connection pool: {0}")]
    Create(#[from] CreatePoolError),

    #[error("failed to acquire connection: {0}")]
    Pool(#[from] PoolError),

    #[error("query failed: {0}")]
    Query(#[from] tokio_postgres::Error),
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub max_size: usize,
    pub size: usize,
    pub available: usize,
}

/// Shared handle over the connection pool.
pub struct StoreClient {
    pool: Pool,
    config: StoreConfig,
    logger: Logger,
}

impl StoreClient {
    /// Build the pool. No connection is opened until the first query.
    pub fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut cfg = Config::new();
        cfg.host = Some(config.host.clone());
        cfg.port = Some(config.port);
        cfg.dbname = Some(config.database.clone());
        cfg.user = Some(config.user.clone());
        cfg.password = Some(config.password.clone());
        cfg.connect_timeout = Some(config.connect_timeout);
        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });

        let mut pool_config = PoolConfig::new(config.max_connections);
        pool_config.timeouts.wait = Some(config.connect_timeout);
        pool_config.timeouts.create = Some(config.connect_timeout);
        cfg.pool = Some(pool_config);

        let pool = cfg.create_pool(Some(Runtime::Tokio1), NoTls)?;

        Ok(Self {
            pool,
            config: config.clone(),
            logger: Logger::service("database"),
        })
    }

    /// Execute a parameterized statement and return its rows.
    pub async fn query(
        &self,
        text: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, StoreError> {
        let start = Instant::now();
        let result = self.run(text, params).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(rows) => {
                self.logger.debug(
                    "Query executed",
                    json!({
                        "duration_ms": duration_ms,
                        "statement": truncate_statement(text),
                        "rows": rows.len(),
                    }),
                );
                Ok(rows)
            }
            Err(e) => {
                self.logger.error(
                    "Database query error",
                    json!({
                        "duration_ms": duration_ms,
                        "statement": truncate_statement(text),
                        "error": e.to_string(),
                    }),
                );
                Err(e)
            }
        }
    }

    async fn run(&self, text: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>, StoreError> {
        let client = self.pool.get().await?;
        Ok(client.query(text, params).await?)
    }

    /// Liveness probe. Never fails; an unreachable store yields `false`.
    pub async fn test_connection(&self) -> bool {
        match self.query("SELECT NOW()", &[]).await {
            Ok(_) => {
                self.logger.debug(
                    "PostgreSQL connection established",
                    json!({
                        "database": self.config.database,
                        "host": format!("{}:{}", self.config.host, self.config.port),
                    }),
                );
                true
            }
            Err(e) => {
                self.logger
                    .error("PostgreSQL connection failed", json!({ "error": e.to_string() }));
                false
            }
        }
    }

    pub fn status(&self) -> PoolStatus {
        let status = self.pool.status();
        PoolStatus {
            max_size: status.max_size,
            size: status.size,
            available: status.available,
        }
    }

    /// Periodically drop connections idle longer than the configured
    /// timeout. Stops on shutdown.
    pub fn spawn_idle_reaper(&self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let pool = self.pool.clone();
        let idle_timeout = self.config.idle_timeout;
        let logger = self.logger.clone();
        let period = (idle_timeout / 2).max(Duration::from_millis(100));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let result = pool.retain(|_, metrics| metrics.last_used() < idle_timeout);
                        if !result.removed.is_empty() {
                            logger.debug(
                                "Closed idle connections",
                                json!({ "closed": result.removed.len(), "retained": result.retained }),
                            );
                        }
                    }
                    _ = shutdown.recv() => {
                        tracing::debug!("Idle connection reaper stopping");
                        break;
                    }
                }
            }
        })
    }
}

#[async_trait]
impl HealthProbe for StoreClient {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn probe(&self) -> bool {
        self.test_connection().await
    }
}

fn truncate_statement(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(STATEMENT_LOG_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
