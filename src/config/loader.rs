//! Configuration loading from the process environment.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;

use crate::config::schema::{
    AppConfig, CacheConfig, Environment, LogLevel, LoggingConfig, ServerConfig, StoreConfig,
    TlsConfig,
};
use crate::config::validation::{validate_required, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },

    #[error("configuration invalid: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

impl ConfigError {
    /// Validation problems, empty for other failures.
    pub fn validation_errors(&self) -> &[ValidationError] {
        match self {
            ConfigError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Populate the process environment from a dotenv file.
///
/// With no explicit path a missing `.env` is not an error.
pub fn load_env_file(path: Option<&Path>) -> Result<(), ConfigError> {
    match path {
        Some(path) => dotenvy::from_path(path)
            .map(|_| ())
            .map_err(|source| ConfigError::EnvFile {
                path: path.to_path_buf(),
                source,
            }),
        None => match dotenvy::dotenv() {
            Ok(_) => Ok(()),
            Err(e) if e.not_found() => Ok(()),
            Err(source) => Err(ConfigError::EnvFile {
                path: PathBuf::from(".env"),
                source,
            }),
        },
    }
}

/// Load and validate configuration from the process environment.
pub fn load_from_env() -> Result<AppConfig, ConfigError> {
    load_with(|key| std::env::var(key).ok())
}

/// Load and validate configuration through an arbitrary variable lookup.
pub fn load_with<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    validate_required(&lookup).map_err(ConfigError::Validation)?;

    let mut errors = Vec::new();
    let mut reader = Reader {
        lookup: &lookup,
        errors: &mut errors,
    };

    let mut store = StoreConfig::new(
        &reader.required("POSTGRES_HOST"),
        reader.parsed("POSTGRES_PORT", "expected a port number").unwrap_or(5432),
        &reader.required("POSTGRES_DB"),
        &reader.required("POSTGRES_USER"),
        &reader.required("POSTGRES_PASSWORD"),
    );
    if let Some(max) = reader.optional_parsed::<usize>("POSTGRES_POOL_MAX", "expected a pool size") {
        if max == 0 {
            reader.invalid("POSTGRES_POOL_MAX", "0", "pool size must be at least 1");
        } else {
            store.max_connections = max;
        }
    }

    let mut cache = CacheConfig::new(
        &reader.required("REDIS_HOST"),
        reader.parsed("REDIS_PORT", "expected a port number").unwrap_or(6379),
        &reader.required("REDIS_PASSWORD"),
    );
    if let Some(secs) = reader.optional_parsed::<u64>("CACHE_DEFAULT_TTL_SECS", "expected seconds") {
        if secs == 0 {
            reader.invalid("CACHE_DEFAULT_TTL_SECS", "0", "ttl must be at least 1 second");
        } else {
            cache.default_ttl = Duration::from_secs(secs);
        }
    }

    let mut server = ServerConfig {
        port: reader.parsed("BACKEND_PORT", "expected a port number").unwrap_or(4000),
        ..ServerConfig::default()
    };
    if let Some(raw) = reader.optional("APP_ENV") {
        match Environment::parse(&raw) {
            Some(env) => server.environment = env,
            None => reader.invalid("APP_ENV", &raw, "expected development, production or test"),
        }
    }
    if let Some(version) = reader.optional("API_VERSION") {
        if version.contains('/') {
            reader.invalid("API_VERSION", &version, "must be a single path segment");
        } else {
            server.api_version = version;
        }
    }
    if let Some(origin) = reader.optional("CORS_ORIGIN") {
        match HeaderValue::from_str(&origin) {
            Ok(value) => server.cors_origin = value,
            Err(_) => reader.invalid("CORS_ORIGIN", &origin, "not a valid header value"),
        }
    }
    if reader.flag("ENABLE_SSL") {
        server.tls = Some(TlsConfig {
            cert_path: reader
                .optional("SSL_CERT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./certs/localhost-cert.pem")),
            key_path: reader
                .optional("SSL_KEY_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./certs/localhost-key.pem")),
        });
    }
    if let Some(secs) = reader.optional_parsed::<u64>("REQUEST_TIMEOUT_SECS", "expected seconds") {
        server.request_timeout = Duration::from_secs(secs);
    }
    server.metrics_port = reader.optional_parsed("METRICS_PORT", "expected a port number");

    let mut logging = LoggingConfig::default();
    if let Some(raw) = reader.optional("LOG_LEVEL") {
        match LogLevel::parse(&raw) {
            Some(level) => logging.level = level,
            None => reader.invalid("LOG_LEVEL", &raw, "expected error, warn, info or debug"),
        }
    }
    logging.to_file = reader.flag("LOG_TO_FILE") || server.environment.is_production();
    if let Some(dir) = reader.optional("LOG_DIR") {
        logging.directory = PathBuf::from(dir);
    }
    if let Some(mb) = reader.optional_parsed::<usize>("LOG_MAX_SIZE_MB", "expected megabytes") {
        if mb == 0 {
            reader.invalid("LOG_MAX_SIZE_MB", "0", "size must be at least 1 MB");
        } else {
            logging.max_size_bytes = mb * 1024 * 1024;
        }
    }
    if let Some(files) = reader.optional_parsed::<usize>("LOG_MAX_FILES", "expected a file count") {
        logging.max_files = files;
    }

    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors));
    }

    Ok(AppConfig {
        store,
        cache,
        server,
        logging,
    })
}

struct Reader<'a, F> {
    lookup: &'a F,
    errors: &'a mut Vec<ValidationError>,
}

impl<F> Reader<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, var: &str) -> Option<String> {
        (self.lookup)(var)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, var: &str) -> String {
        self.optional(var).unwrap_or_default()
    }

    fn flag(&self, var: &str) -> bool {
        self.optional(var).is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    fn parsed<T: FromStr>(&mut self, var: &'static str, reason: &'static str) -> Option<T> {
        let raw = self.required(var);
        self.convert(var, raw, reason)
    }

    fn optional_parsed<T: FromStr>(&mut self, var: &'static str, reason: &'static str) -> Option<T> {
        let raw = self.optional(var)?;
        self.convert(var, raw, reason)
    }

    fn convert<T: FromStr>(&mut self, var: &'static str, raw: String, reason: &'static str) -> Option<T> {
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                self.errors.push(ValidationError::Invalid {
                    var,
                    value: raw,
                    reason,
                });
                None
            }
        }
    }

    fn invalid(&mut self, var: &'static str, value: &str, reason: &'static str) {
        self.errors.push(ValidationError::Invalid {
            var,
            value: value.to_string(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<String, String> {
        [
            ("POSTGRES_HOST", "localhost"),
            ("POSTGRES_PORT", "5432"),
            ("POSTGRES_DB", "devstack"),
            ("POSTGRES_USER", "dev"),
            ("POSTGRES_PASSWORD", "secret"),
            ("REDIS_HOST", "localhost"),
            ("REDIS_PORT", "6379"),
            ("REDIS_PASSWORD", "redis-secret"),
            ("BACKEND_PORT", "4000"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    fn load(env: &HashMap<String, String>) -> Result<AppConfig, ConfigError> {
        load_with(|key| env.get(key).cloned())
    }

    #[test]
    fn test_defaults_applied() {
        let config = load(&base_env()).unwrap();

        assert_eq!(config.store.port, 5432);
        assert_eq!(config.store.max_connections, 20);
        assert_eq!(config.cache.default_ttl, Duration::from_secs(3600));
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.environment, Environment::Development);
        assert_eq!(config.server.api_version, "v1");
        assert_eq!(config.server.cors_origin, "http://localhost:3000");
        assert!(config.server.tls.is_none());
        assert!(config.server.metrics_port.is_none());
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(!config.logging.to_file);
    }

    #[test]
    fn test_missing_required_reported() {
        let mut env = base_env();
        env.remove("REDIS_HOST");
        env.remove("BACKEND_PORT");

        let err = load(&env).unwrap_err();
        assert_eq!(
            err.validation_errors(),
            &[
                ValidationError::Missing("REDIS_HOST"),
                ValidationError::Missing("BACKEND_PORT"),
            ]
        );
    }

    #[test]
    fn test_invalid_values_collected() {
        let mut env = base_env();
        env.insert("POSTGRES_PORT".into(), "five".into());
        env.insert("LOG_LEVEL".into(), "verbose".into());
        env.insert("APP_ENV".into(), "staging".into());

        let err = load(&env).unwrap_err();
        let vars: Vec<_> = err
            .validation_errors()
            .iter()
            .filter_map(|e| match e {
                ValidationError::Invalid { var, .. } => Some(*var),
                _ => None,
            })
            .collect();
        assert_eq!(vars, vec!["POSTGRES_PORT", "APP_ENV", "LOG_LEVEL"]);
    }

    #[test]
    fn test_tls_paths() {
        let mut env = base_env();
        env.insert("ENABLE_SSL".into(), "true".into());
        env.insert("SSL_CERT_PATH".into(), "/tmp/cert.pem".into());

        let tls = load(&env).unwrap().server.tls.unwrap();
        assert_eq!(tls.cert_path, PathBuf::from("/tmp/cert.pem"));
        assert_eq!(tls.key_path, PathBuf::from("./certs/localhost-key.pem"));
    }

    #[test]
    fn test_production_enables_file_logging() {
        let mut env = base_env();
        env.insert("APP_ENV".into(), "production".into());

        let config = load(&env).unwrap();
        assert!(config.server.environment.is_production());
        assert!(config.logging.to_file);
    }

    #[test]
    fn test_log_file_limits() {
        let config = load(&base_env()).unwrap();
        assert_eq!(config.logging.max_size_bytes, 20 * 1024 * 1024);
        assert_eq!(config.logging.max_files, 14);

        let mut env = base_env();
        env.insert("LOG_MAX_SIZE_MB".into(), "5".into());
        env.insert("LOG_MAX_FILES".into(), "3".into());
        let config = load(&env).unwrap();
        assert_eq!(config.logging.max_size_bytes, 5 * 1024 * 1024);
        assert_eq!(config.logging.max_files, 3);

        env.insert("LOG_MAX_SIZE_MB".into(), "0".into());
        assert!(load(&env).is_err());
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let config = load(&base_env()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("redis-secret"));
        assert!(!rendered.contains("\"secret\""));
        assert!(rendered.contains("<redacted>"));
    }
}
