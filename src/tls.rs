//! TLS client configuration for the appliance API.
//!
//! Appliances usually present a web certificate issued by a private CA. When
//! `ca_file` is configured, the HTTP client trusts exactly the certificates in
//! that PEM bundle instead of the public webpki roots.
//!
//! The `rustls-post-quantum` provider must be installed as the global default
//! before calling [`build_tls_config`].

use std::fs;
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use log::debug;
use rustls::crypto::CryptoProvider;
use rustls::{ClientConfig, RootCertStore};
use rustls_pemfile::certs;

use crate::error::{AdminError, Result};

/// Load every certificate of a PEM bundle into a root store.
pub fn load_root_store(ca_file: &Path) -> Result<RootCertStore> {
    let ca_pem = fs::read(ca_file)
        .map_err(|e| AdminError::Config(format!("cannot read {}: {e}", ca_file.display())))?;

    let mut root_store = RootCertStore::empty();
    for cert in certs(&mut Cursor::new(ca_pem)) {
        root_store.add(cert?)?;
    }
    if root_store.is_empty() {
        return Err(AdminError::Config(format!(
            "no certificates found in {}",
            ca_file.display()
        )));
    }

    debug!("loaded {} trusted root(s) from {}", root_store.len(), ca_file.display());
    Ok(root_store)
}

/// Build a `rustls::ClientConfig` that trusts only the CAs in `ca_file`.
pub fn build_tls_config(ca_file: &Path) -> Result<ClientConfig> {
    let provider: Arc<CryptoProvider> = CryptoProvider::get_default()
        .ok_or_else(|| AdminError::Config("no TLS crypto provider installed".into()))?
        .clone();

    let root_store = load_root_store(ca_file)?;

    let tls_config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(AdminError::Tls)?
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Ok(tls_config)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const TEST_CA: &str = include_str!("../testdata/ca.pem");

    #[test]
    fn root_store_loaded_from_bundle() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEST_CA.as_bytes()).unwrap();
        let store = load_root_store(file.path()).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn empty_bundle_rejected() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = load_root_store(file.path()).unwrap_err();
        assert!(err.to_string().contains("no certificates"), "{err}");
    }

    #[test]
    fn tls_config_built_with_post_quantum_provider() {
        let _ = rustls_post_quantum::provider().install_default();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEST_CA.as_bytes()).unwrap();
        assert!(build_tls_config(file.path()).is_ok());
    }
}
