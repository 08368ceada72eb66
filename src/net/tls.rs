//! TLS configuration and certificate loading.

use axum_server::tls_rustls::RustlsConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::TlsConfig;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("certificate file not found: {0}")]
    CertificateMissing(PathBuf),

    #[error("private key file not found: {0}")]
    KeyMissing(PathBuf),

    #[error("invalid certificate or key: {0}")]
    Invalid(#[from] std::io::Error),
}

/// Load PEM certificate chain and private key into a rustls server config.
pub async fn load_tls_config(config: &TlsConfig) -> Result<RustlsConfig, TlsError> {
    let cert_path = Path::new(&config.cert_path);
    let key_path = Path::new(&config.key_path);

    if !cert_path.exists() {
        return Err(TlsError::CertificateMissing(cert_path.to_path_buf()));
    }
    if !key_path.exists() {
        return Err(TlsError::KeyMissing(key_path.to_path_buf()));
    }

    // Only the ring provider is compiled in; installing it is a no-op after the first call.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let rustls = RustlsConfig::from_pem_file(cert_path, key_path).await?;
    tracing::info!(cert = %cert_path.display(), "TLS certificate loaded");
    Ok(rustls)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_files_are_reported_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let config = TlsConfig {
            cert_path: cert.display().to_string(),
            key_path: dir.path().join("key.pem").display().to_string(),
        };
        match load_tls_config(&config).await {
            Err(TlsError::CertificateMissing(path)) => assert_eq!(path, cert),
            other => panic!("expected missing certificate, got {:?}", other.map(|_| ())),
        }

        std::fs::write(&cert, "not a certificate").unwrap();
        assert!(matches!(load_tls_config(&config).await, Err(TlsError::KeyMissing(_))));
    }

    #[tokio::test]
    async fn garbage_pem_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::write(&cert, "garbage").unwrap();
        std::fs::write(&key, "garbage").unwrap();
        let config = TlsConfig {
            cert_path: cert.display().to_string(),
            key_path: key.display().to_string(),
        };
        assert!(matches!(load_tls_config(&config).await, Err(TlsError::Invalid(_))));
    }
}
