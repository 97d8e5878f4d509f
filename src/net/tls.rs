//! TLS certificate loading.

use std::path::PathBuf;

use axum_server::tls_rustls::RustlsConfig;

use crate::config::TlsConfig;

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("certificate file not found: {0}")]
    MissingCertificate(PathBuf),

    #[error("private key file not found: {0}")]
    MissingKey(PathBuf),

    #[error("failed to load TLS material: {0}")]
    Load(#[from] std::io::Error),
}

/// Both PEM files must exist before anything else starts.
pub fn verify_tls_materials(config: &TlsConfig) -> Result<(), TlsError> {
    if !config.cert_path.is_file() {
        return Err(TlsError::MissingCertificate(config.cert_path.clone()));
    }
    if !config.key_path.is_file() {
        return Err(TlsError::MissingKey(config.key_path.clone()));
    }
    Ok(())
}

/// Load the certificate chain and private key.
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, TlsError> {
    verify_tls_materials(config)?;
    let rustls = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path).await?;
    Ok(rustls)
}
