//! Certificate signing requests generated on the appliance.

use clap::ValueEnum;
use log::info;
use serde::{Deserialize, Serialize};

use super::normalize_thumbprint;
use crate::api::{execute, fetch, Api, ApiRequest, Service};
use crate::error::Result;

const PEM_LINE: usize = 64;

/// What the signed certificate will be used for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[value(rename_all = "PascalCase")]
pub enum CertificateType {
    #[default]
    Ssl,
    Audit,
    Client,
    TimeStamping,
    #[serde(other)]
    #[value(skip)]
    Unknown,
}

/// Body of a new CSR.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CsrRequest {
    pub certificate_type: CertificateType,
    pub subject:          String,
    pub key_length:       u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_names:        Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses:     Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CertificateSigningRequest {
    pub thumbprint:          String,
    pub certificate_type:    CertificateType,
    pub subject:             String,
    pub key_length:          u32,
    pub dns_names:           Vec<String>,
    pub ip_addresses:        Vec<String>,
    /// Base64 DER of the request.
    pub base64_request_data: String,
}

pub async fn list_csrs(api: &impl Api) -> Result<Vec<CertificateSigningRequest>> {
    fetch(api, ApiRequest::get(Service::Core, "CertificateSigningRequests")).await
}

/// Have the appliance generate a key pair and a CSR for it.
pub async fn new_csr(api: &impl Api, req: &CsrRequest) -> Result<CertificateSigningRequest> {
    info!("requesting {:?} CSR for {}", req.certificate_type, req.subject);
    let body = serde_json::to_value(req)?;
    fetch(api, ApiRequest::post(Service::Core, "CertificateSigningRequests", body)).await
}

pub async fn remove_csr(api: &impl Api, thumbprint: &str) -> Result<()> {
    let tp = normalize_thumbprint(thumbprint)?;
    info!("removing CSR {tp}");
    execute(api, ApiRequest::delete(Service::Core, format!("CertificateSigningRequests/{tp}"))).await
}

/// Wrap base64 request data in a `CERTIFICATE REQUEST` PEM block.
pub fn csr_to_pem(base64_request_data: &str) -> String {
    let data: String = base64_request_data.chars().filter(|c| !c.is_whitespace()).collect();
    let mut pem = String::from("-----BEGIN CERTIFICATE REQUEST-----\n");
    for line in data.as_bytes().chunks(PEM_LINE) {
        // base64 is ASCII, so byte chunks are valid UTF-8.
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str("-----END CERTIFICATE REQUEST-----\n");
    pem
}
