//! Trusted CA certificates.

use std::path::Path;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{load_certificate, normalize_thumbprint};
use crate::api::{execute, fetch, Api, ApiRequest, Service};
use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TrustedCertificate {
    pub thumbprint: String,
    pub subject:    String,
    pub issuer:     String,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after:  Option<DateTime<Utc>>,
}

pub async fn list_trusted(api: &impl Api) -> Result<Vec<TrustedCertificate>> {
    fetch(api, ApiRequest::get(Service::Core, "TrustedCertificates")).await
}

pub async fn get_trusted(api: &impl Api, thumbprint: &str) -> Result<TrustedCertificate> {
    let tp = normalize_thumbprint(thumbprint)?;
    fetch(api, ApiRequest::get(Service::Core, format!("TrustedCertificates/{tp}"))).await
}

/// Upload a PEM or DER CA certificate.
pub async fn install_trusted(api: &impl Api, path: &Path) -> Result<TrustedCertificate> {
    let cert = load_certificate(path).await?;
    info!("installing trusted certificate {} from {}", cert.thumbprint, path.display());
    let body = json!({ "Base64CertificateData": cert.base64() });
    fetch(api, ApiRequest::post(Service::Core, "TrustedCertificates", body)).await
}

pub async fn uninstall_trusted(api: &impl Api, thumbprint: &str) -> Result<()> {
    let tp = normalize_thumbprint(thumbprint)?;
    info!("removing trusted certificate {tp}");
    execute(api, ApiRequest::delete(Service::Core, format!("TrustedCertificates/{tp}"))).await
}
