//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use devstack_backend::cache::{CacheClient, MemoryBackend};
use devstack_backend::config::{self, AppConfig, Environment};
use devstack_backend::health::{HealthAggregator, HealthProbe};
use devstack_backend::http::{build_router_with, AppState, HttpServer};
use devstack_backend::Shutdown;
use devstack_sdk::ApiClient;
use tokio::net::TcpListener;

/// Probe whose answer can be flipped while the server runs.
#[derive(Clone)]
pub struct SwitchProbe {
    name: &'static str,
    up: Arc<AtomicBool>,
}

impl SwitchProbe {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            up: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }
}

#[async_trait]
impl HealthProbe for SwitchProbe {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn probe(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }
}

/// A running server plus handles to its fake dependencies.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: ApiClient,
    pub cache: CacheClient,
    pub backend: MemoryBackend,
    pub database: SwitchProbe,
    pub redis: SwitchProbe,
    pub shutdown: Shutdown,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Environment with every required variable set.
pub fn base_env() -> HashMap<String, String> {
    [
        ("POSTGRES_HOST", "127.0.0.1"),
        ("POSTGRES_PORT", "5432"),
        ("POSTGRES_DB", "devstack"),
        ("POSTGRES_USER", "dev"),
        ("POSTGRES_PASSWORD", "secret"),
        ("REDIS_HOST", "127.0.0.1"),
        ("REDIS_PORT", "6379"),
        ("REDIS_PASSWORD", "secret"),
        ("BACKEND_PORT", "0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

pub fn test_config(environment: Environment) -> AppConfig {
    let env = base_env();
    let mut config = config::load_with(|key| env.get(key).cloned()).unwrap();
    config.server.environment = environment;
    config
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config(Environment::Development), Router::new()).await
}

/// Serve the full pipeline on an ephemeral port with in-memory
/// dependencies. `extra` routes are merged in.
pub async fn spawn_app_with(config: AppConfig, extra: Router<AppState>) -> TestApp {
    let backend = MemoryBackend::new();
    let cache = CacheClient::new(Arc::new(backend.clone()), Duration::from_secs(60));
    let database = SwitchProbe::new("database");
    let redis = SwitchProbe::new("redis");
    let health = HealthAggregator::new(Arc::new(database.clone()), Arc::new(redis.clone()));
    let state = AppState::new(Arc::new(config), cache.clone(), health);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::with_router(build_router_with(state, extra));
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, rx).await;
    });

    TestApp {
        addr,
        client: ApiClient::new(&format!("http://{}", addr)),
        cache,
        backend,
        database,
        redis,
        shutdown,
    }
}
