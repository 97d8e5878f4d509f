//! Network layer.
//!
//! Plain HTTP binds a `TcpListener` directly in the server; HTTPS goes
//! through `axum-server` with the rustls acceptor configured here.

pub mod tls;

pub use tls::{load_tls_config, verify_tls_materials, TlsError};
