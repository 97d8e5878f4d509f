//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! .env file (optional, dotenvy)
//!     → process environment
//!     → validation.rs (required variables present)
//!     → loader.rs (parse, collect every invalid value)
//!     → AppConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - Required variables have no defaults; absence is fatal at startup
//! - Secrets never appear in `Debug` output

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_env_file, load_from_env, load_with, ConfigError};
pub use schema::{
    AppConfig, CacheConfig, Environment, LogLevel, LoggingConfig, ServerConfig, StoreConfig,
    TlsConfig,
};
pub use validation::{ValidationError, REQUIRED_VARS};
