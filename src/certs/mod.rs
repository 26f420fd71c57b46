//! Certificate files and the appliance certificate stores.
//!
//! Certificates are uploaded as base64 DER and addressed on the appliance by
//! their SHA-1 thumbprint (40 upper-case hex digits).

pub mod csr;
pub mod ssl;
pub mod trusted;

use std::io::Cursor;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::debug;
use sha1::{Digest, Sha1};

use crate::error::{AdminError, Result};

const THUMBPRINT_LEN: usize = 40;

/// A certificate read from disk.
#[derive(Debug, Clone)]
pub struct CertificateFile {
    pub der:        Vec<u8>,
    pub thumbprint: String,
}

impl CertificateFile {
    pub fn from_der(der: Vec<u8>) -> Self {
        let thumbprint = thumbprint(&der);
        Self { der, thumbprint }
    }

    /// `Base64CertificateData` upload payload.
    pub fn base64(&self) -> String {
        STANDARD.encode(&self.der)
    }
}

/// Upper-case hex SHA-1 of the DER encoding.
pub fn thumbprint(der: &[u8]) -> String {
    hex::encode_upper(Sha1::digest(der))
}

/// Load the first certificate of a PEM file, or a raw DER certificate.
pub async fn load_certificate(path: &Path) -> Result<CertificateFile> {
    let bytes = tokio::fs::read(path).await?;
    let cert = parse_certificate(&bytes)
        .map_err(|e| AdminError::Certificate(format!("{}: {e}", path.display())))?;
    debug!("loaded certificate {} ({})", path.display(), cert.thumbprint);
    Ok(cert)
}

fn parse_certificate(bytes: &[u8]) -> std::result::Result<CertificateFile, String> {
    if bytes.is_empty() {
        return Err("file is empty".into());
    }
    if bytes.windows(11).any(|w| w == b"-----BEGIN ") {
        let first = rustls_pemfile::certs(&mut Cursor::new(bytes))
            .next()
            .ok_or("no CERTIFICATE block in PEM data")?
            .map_err(|e| format!("invalid PEM: {e}"))?;
        return Ok(CertificateFile::from_der(first.to_vec()));
    }
    // DER certificates are an ASN.1 SEQUENCE.
    if bytes[0] != 0x30 {
        return Err("neither PEM nor DER certificate data".into());
    }
    Ok(CertificateFile::from_der(bytes.to_vec()))
}

/// Read a PKCS#12 bundle and encode it for upload.
pub async fn load_pfx(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() {
        return Err(AdminError::Certificate(format!("{} is empty", path.display())));
    }
    Ok(STANDARD.encode(bytes))
}

/// Accept `b2:67:a0 ...` style input; the appliance wants bare upper-case hex.
pub fn normalize_thumbprint(input: &str) -> Result<String> {
    let tp: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if tp.len() != THUMBPRINT_LEN || !tp.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(AdminError::Certificate(format!(
            "'{input}' is not a SHA-1 thumbprint"
        )));
    }
    Ok(tp)
}
