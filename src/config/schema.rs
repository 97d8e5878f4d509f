//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the backend.
//! Values are read from environment variables by `loader.rs`; every optional
//! field has a default here.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use axum::http::HeaderValue;

/// Root configuration for the backend.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Relational store connection settings.
    pub store: StoreConfig,

    /// Key-value cache connection settings.
    pub cache: CacheConfig,

    /// HTTP server settings.
    pub server: ServerConfig,

    /// Log output settings.
    pub logging: LoggingConfig,
}

/// Deployment environment, selected by `APP_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            "test" => Some(Self::Test),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log severity threshold. Ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "error" => Some(Self::Error),
            "warn" | "warning" => Some(Self::Warn),
            "info" => Some(Self::Info),
            "debug" => Some(Self::Debug),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// PostgreSQL connection pool settings.
#[derive(Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,

    /// Maximum pooled connections.
    pub max_connections: usize,

    /// Connections unused for longer than this are evicted.
    pub idle_timeout: Duration,

    /// Upper bound for establishing a new connection.
    pub connect_timeout: Duration,
}

impl StoreConfig {
    pub fn new(host: &str, port: u16, database: &str, user: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            database: database.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            max_connections: 20,
            idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(2),
        }
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("idle_timeout", &self.idle_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

/// Redis connection settings.
#[derive(Clone)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    pub password: String,

    /// TTL applied when callers do not pass one.
    pub default_ttl: Duration,
}

impl CacheConfig {
    pub fn new(host: &str, port: u16, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            password: password.to_string(),
            default_ttl: Duration::from_secs(3600),
        }
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"<redacted>")
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen port; the server binds `0.0.0.0:<port>`.
    pub port: u16,

    pub environment: Environment,

    /// Path segment served at `/api/{version}`.
    pub api_version: String,

    /// The single origin allowed by CORS.
    pub cors_origin: HeaderValue,

    /// Optional TLS termination.
    pub tls: Option<TlsConfig>,

    /// Total time allowed per request.
    pub request_timeout: Duration,

    /// Maximum accepted request body.
    pub body_limit_bytes: usize,

    /// Port for the Prometheus exporter, disabled when unset.
    pub metrics_port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4000,
            environment: Environment::Development,
            api_version: "v1".to_string(),
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
            tls: None,
            request_timeout: Duration::from_secs(30),
            body_limit_bytes: 100 * 1024,
            metrics_port: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: PathBuf,

    /// Path to private key file (PEM).
    pub key_path: PathBuf,
}

/// Log output settings.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: LogLevel,

    /// Also write rotated JSON files.
    pub to_file: bool,

    /// Directory receiving `combined.log` and `error.log`.
    pub directory: PathBuf,

    /// A file rolls over once it grows past this many bytes.
    pub max_size_bytes: usize,

    /// Rolled, gzipped files kept per sink.
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            to_file: false,
            directory: PathBuf::from("logs"),
            max_size_bytes: 20 * 1024 * 1024,
            max_files: 14,
        }
    }
}
