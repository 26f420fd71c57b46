//! SSL (web server) certificates and their appliance assignments.

use std::path::Path;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{load_pfx, normalize_thumbprint};
use crate::api::status::appliance_status;
use crate::api::{execute, fetch, Api, ApiRequest, Service};
use crate::error::{AdminError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ApplianceRef {
    pub id:   String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SslCertificate {
    pub thumbprint: String,
    pub subject:    String,
    pub issuer:     String,
    pub not_before: Option<DateTime<Utc>>,
    pub not_after:  Option<DateTime<Utc>>,
    /// Appliances currently serving this certificate.
    pub appliances: Vec<ApplianceRef>,
}

fn ssl_path(thumbprint: &str) -> Result<String> {
    Ok(format!("SslCertificates/{}", normalize_thumbprint(thumbprint)?))
}

pub async fn list_ssl(api: &impl Api) -> Result<Vec<SslCertificate>> {
    fetch(api, ApiRequest::get(Service::Core, "SslCertificates")).await
}

pub async fn get_ssl(api: &impl Api, thumbprint: &str) -> Result<SslCertificate> {
    fetch(api, ApiRequest::get(Service::Core, ssl_path(thumbprint)?)).await
}

/// Upload a PKCS#12 bundle holding the certificate and its private key.
pub async fn install_ssl(
    api:        &impl Api,
    pfx:        &Path,
    passphrase: Option<&str>,
) -> Result<SslCertificate> {
    let data = load_pfx(pfx).await?;
    info!("installing SSL certificate from {}", pfx.display());
    let mut body = json!({ "Base64CertificateData": data });
    if let Some(passphrase) = passphrase {
        body["Passphrase"] = Value::String(passphrase.to_string());
    }
    fetch(api, ApiRequest::post(Service::Core, "SslCertificates", body)).await
}

pub async fn uninstall_ssl(api: &impl Api, thumbprint: &str) -> Result<()> {
    let path = ssl_path(thumbprint)?;
    info!("removing {path}");
    execute(api, ApiRequest::delete(Service::Core, path)).await
}

/// The appliance to assign to: `appliance_id` if given, else the one we are
/// talking to.
async fn target_appliance(api: &impl Api, appliance_id: Option<&str>) -> Result<String> {
    if let Some(id) = appliance_id {
        return Ok(id.to_string());
    }
    let status = appliance_status(api).await?;
    if status.identity.is_empty() {
        return Err(AdminError::Certificate(
            "appliance status did not report an identity".into(),
        ));
    }
    Ok(status.identity)
}

/// Make the appliance serve this certificate.
pub async fn assign_ssl(api: &impl Api, thumbprint: &str, appliance_id: Option<&str>) -> Result<()> {
    let path = format!("{}/Appliances", ssl_path(thumbprint)?);
    let id = target_appliance(api, appliance_id).await?;
    info!("assigning {path} to appliance {id}");
    execute(api, ApiRequest::put(Service::Core, path, json!([{ "Id": id }]))).await
}

/// Stop serving this certificate on every appliance.
pub async fn unassign_ssl(api: &impl Api, thumbprint: &str) -> Result<()> {
    let path = format!("{}/Appliances", ssl_path(thumbprint)?);
    info!("clearing {path}");
    execute(api, ApiRequest::put(Service::Core, path, json!([]))).await
}
