//! Startup orchestration.
//!
//! # Responsibilities
//! - Refuse to start on missing or invalid configuration
//! - Check TLS material before any dependency is touched
//! - Build the store, cache and health handles and inject them
//! - Bind the listener last and serve until a termination signal
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Unreachable dependencies are not fatal; `/health` reports them

use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::BuildError;
use serde_json::json;
use tokio::net::TcpListener;

use crate::cache::{CacheClient, CacheError, RedisBackend};
use crate::config::validation::render_diagnostic;
use crate::config::{self, AppConfig, ConfigError};
use crate::health::HealthAggregator;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::{signals, Shutdown};
use crate::net::{load_tls_config, verify_tls_materials, TlsError};
use crate::observability::{metrics, Logger};
use crate::store::{StoreClient, StoreError};
use crate::SERVICE_NAME;

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("store setup failed: {0}")]
    Store(#[from] StoreError),

    #[error("cache setup failed: {0}")]
    Cache(#[from] CacheError),

    #[error("metrics exporter failed: {0}")]
    Metrics(#[from] BuildError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Load configuration from the environment. On failure print the
/// diagnostic to stderr and exit with status 1; logging is not up yet.
pub fn load_config_or_exit() -> AppConfig {
    match config::load_from_env() {
        Ok(config) => config,
        Err(e) => {
            let errors = e.validation_errors();
            if errors.is_empty() {
                eprintln!("{}", e);
            } else {
                eprintln!("{}", render_diagnostic(errors));
            }
            std::process::exit(1);
        }
    }
}

/// Bring every subsystem up and serve until SIGINT/SIGTERM.
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    let config = Arc::new(config);
    let server = &config.server;
    let logger = Logger::service(SERVICE_NAME);

    if let Some(tls) = &server.tls {
        if let Err(e) = verify_tls_materials(tls) {
            logger.error(
                "SSL certificates not found",
                json!({
                    "cert_path": tls.cert_path.display().to_string(),
                    "key_path": tls.key_path.display().to_string(),
                }),
            );
            return Err(e.into());
        }
    }

    if let Some(port) = server.metrics_port {
        metrics::init_metrics(SocketAddr::from(([0, 0, 0, 0], port)))?;
    }

    let shutdown = Shutdown::new();

    let store = Arc::new(StoreClient::connect(&config.store)?);
    let pool = store.status();
    logger.info(
        "Database pool created",
        json!({
            "host": config.store.host,
            "database": config.store.database,
            "max_size": pool.max_size,
            "idle_timeout_secs": config.store.idle_timeout.as_secs(),
        }),
    );
    let cache = CacheClient::new(
        Arc::new(RedisBackend::new(&config.cache)?),
        config.cache.default_ttl,
    );
    let health = HealthAggregator::new(store.clone(), Arc::new(cache.clone()));
    let reaper = store.spawn_idle_reaper(shutdown.subscribe());

    let initial = health.check().await;
    logger.info(
        "Dependency status",
        json!({ "status": initial.status, "services": initial.services }),
    );

    let state = AppState::new(config.clone(), cache, health);
    let http = HttpServer::new(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], server.port));

    {
        let shutdown = shutdown.clone();
        let logger = logger.clone();
        tokio::spawn(async move {
            let signal = signals::wait_for_termination().await;
            logger.info(
                "Shutdown signal received, shutting down gracefully",
                json!({ "signal": signal }),
            );
            shutdown.trigger();
        });
    }

    let startup = json!({
        "environment": server.environment.as_str(),
        "port": server.port,
        "api_version": server.api_version,
        "cors_origin": server.cors_origin.to_str().unwrap_or_default(),
        "ssl": server.tls.is_some(),
    });

    let result = match &server.tls {
        Some(tls) => {
            let rustls = load_tls_config(tls).await?;
            logger.info("Backend server starting (HTTPS)", startup);
            logger.info(&format!("Server running at https://{}", addr), json!({}));
            http.run_tls(addr, rustls, shutdown.subscribe()).await
        }
        None => {
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|source| StartupError::Bind { addr, source })?;
            logger.info("Backend server starting", startup);
            logger.info(&format!("Server running at http://{}", addr), json!({}));
            http.run(listener, shutdown.subscribe()).await
        }
    };

    shutdown.trigger();
    let _ = reaper.await;
    logger.info("Shutdown complete", json!({}));

    result.map_err(StartupError::Serve)
}
