//! Throwaway PKI for lab appliances, produced with the `openssl` binary.
//!
//! `generate_test_pki` writes into one directory:
//!   - `ca.key`, `ca.pem`: self-signed root CA
//!   - `ssl.key`, `ssl.pem`: serverAuth leaf signed by the CA
//!   - `ssl.pfx`: leaf, key and CA chain, ready for `ssl install`

use std::env;
use std::ffi::{OsStr, OsString};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Serialize;
use tokio::process::Command;
use uuid::Uuid;

use crate::error::{AdminError, Result};

const KEY_SPEC: &str = "rsa:2048";
/// Environment variable the PKCS#12 password is passed through.
const PFX_PASS_ENV: &str = "APPLIANCE_ADMIN_PFX_PASS";

#[derive(Debug, Clone)]
pub struct TestPkiRequest {
    pub out_dir:        PathBuf,
    pub common_name:    String,
    pub dns_names:      Vec<String>,
    pub ip_addresses:   Vec<IpAddr>,
    pub days:           u32,
    pub pfx_passphrase: String,
}

/// Files written by [`generate_test_pki`].
#[derive(Debug, Clone, Serialize)]
pub struct TestPki {
    pub ca_key:   PathBuf,
    pub ca_cert:  PathBuf,
    pub ssl_key:  PathBuf,
    pub ssl_cert: PathBuf,
    pub pfx:      PathBuf,
}

impl TestPki {
    fn in_dir(dir: &Path) -> Self {
        Self {
            ca_key:   dir.join("ca.key"),
            ca_cert:  dir.join("ca.pem"),
            ssl_key:  dir.join("ssl.key"),
            ssl_cert: dir.join("ssl.pem"),
            pfx:      dir.join("ssl.pfx"),
        }
    }
}

// ── Locating openssl ──────────────────────────────────────────────────────────

/// `configured` itself if it is a path, else the first match on `PATH`.
pub fn find_openssl(configured: &Path) -> Result<PathBuf> {
    if configured.components().count() > 1 {
        if configured.is_file() {
            return Ok(configured.to_path_buf());
        }
    } else if let Some(found) = env::var_os("PATH").and_then(|p| find_in_path(configured.as_os_str(), &p)) {
        return Ok(found);
    }
    Err(AdminError::Tool {
        program: configured.display().to_string(),
        status:  "not found".into(),
        stderr:  String::new(),
    })
}

fn find_in_path(program: &OsStr, path_var: &OsStr) -> Option<PathBuf> {
    env::split_paths(path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

// ── Argument builders ─────────────────────────────────────────────────────────

fn os(s: impl AsRef<OsStr>) -> OsString {
    s.as_ref().to_os_string()
}

fn ca_args(pki: &TestPki, common_name: &str, days: u32) -> Vec<OsString> {
    vec![
        os("req"), os("-x509"), os("-sha256"),
        os("-newkey"), os(KEY_SPEC), os("-nodes"),
        os("-keyout"), os(&pki.ca_key),
        os("-out"), os(&pki.ca_cert),
        os("-days"), os(days.to_string()),
        os("-subj"), os(format!("/CN={common_name} Test CA")),
        os("-addext"), os("basicConstraints=critical,CA:TRUE"),
        os("-addext"), os("keyUsage=critical,keyCertSign,cRLSign"),
    ]
}

fn leaf_request_args(key: &Path, csr: &Path, common_name: &str) -> Vec<OsString> {
    vec![
        os("req"), os("-new"), os("-sha256"),
        os("-newkey"), os(KEY_SPEC), os("-nodes"),
        os("-keyout"), os(key),
        os("-out"), os(csr),
        os("-subj"), os(format!("/CN={common_name}")),
    ]
}

fn sign_args(ca_cert: &Path, ca_key: &Path, csr: &Path, extfile: &Path, out: &Path, days: u32) -> Vec<OsString> {
    vec![
        os("x509"), os("-req"), os("-sha256"),
        os("-in"), os(csr),
        os("-CA"), os(ca_cert),
        os("-CAkey"), os(ca_key),
        os("-set_serial"), os(format!("0x{}", Uuid::new_v4().simple())),
        os("-days"), os(days.to_string()),
        os("-extfile"), os(extfile),
        os("-out"), os(out),
    ]
}

fn pfx_args(pki: &TestPki) -> Vec<OsString> {
    vec![
        os("pkcs12"), os("-export"),
        os("-inkey"), os(&pki.ssl_key),
        os("-in"), os(&pki.ssl_cert),
        os("-certfile"), os(&pki.ca_cert),
        os("-out"), os(&pki.pfx),
        os("-passout"), os(format!("env:{PFX_PASS_ENV}")),
    ]
}

/// X.509v3 extensions for a TLS server certificate.
fn leaf_extensions(dns_names: &[String], ip_addresses: &[IpAddr]) -> String {
    let mut ext = String::from(
        "basicConstraints=CA:FALSE\n\
         keyUsage=critical,digitalSignature,keyEncipherment\n\
         extendedKeyUsage=serverAuth\n",
    );
    let sans: Vec<String> = dns_names
        .iter()
        .map(|d| format!("DNS:{d}"))
        .chain(ip_addresses.iter().map(|ip| format!("IP:{ip}")))
        .collect();
    if !sans.is_empty() {
        ext.push_str(&format!("subjectAltName={}\n", sans.join(",")));
    }
    ext
}

// ── Running openssl ───────────────────────────────────────────────────────────

async fn run(openssl: &Path, args: &[OsString], env: &[(&str, &str)]) -> Result<()> {
    debug!("running {} {}", openssl.display(), args[0].to_string_lossy());
    let output = Command::new(openssl)
        .args(args)
        .envs(env.iter().copied())
        .output()
        .await?;
    if !output.status.success() {
        return Err(AdminError::Tool {
            program: format!("{} {}", openssl.display(), args[0].to_string_lossy()),
            status:  output.status.to_string(),
            stderr:  String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

/// A fresh file name next to `near`, so intermediate files never clobber
/// anything already there.
fn scratch_path(near: &Path, suffix: &str) -> PathBuf {
    let stem = near.file_stem().map_or_else(|| "scratch".into(), |s| s.to_string_lossy());
    near.with_file_name(format!("{stem}.{}.{suffix}", Uuid::new_v4().simple()))
}

/// Remove intermediate files; failures only matter for tidiness.
async fn remove_scratch(paths: &[&Path]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            debug!("cannot remove {}: {e}", path.display());
        }
    }
}

/// Create a test CA, a serverAuth leaf signed by it and a PKCS#12 bundle.
pub async fn generate_test_pki(openssl: &Path, req: &TestPkiRequest) -> Result<TestPki> {
    if req.common_name.trim().is_empty() {
        return Err(AdminError::Certificate("common name must not be empty".into()));
    }
    tokio::fs::create_dir_all(&req.out_dir).await?;
    let pki = TestPki::in_dir(&req.out_dir);
    let csr = scratch_path(&pki.ssl_cert, "csr");
    let extfile = scratch_path(&pki.ssl_cert, "ext");

    // Without explicit SANs the leaf is valid for its common name.
    let dns_names = if req.dns_names.is_empty() && req.ip_addresses.is_empty() {
        vec![req.common_name.clone()]
    } else {
        req.dns_names.clone()
    };
    tokio::fs::write(&extfile, leaf_extensions(&dns_names, &req.ip_addresses)).await?;

    let signed = async {
        run(openssl, &ca_args(&pki, &req.common_name, req.days), &[]).await?;
        run(openssl, &leaf_request_args(&pki.ssl_key, &csr, &req.common_name), &[]).await?;
        run(
            openssl,
            &sign_args(&pki.ca_cert, &pki.ca_key, &csr, &extfile, &pki.ssl_cert, req.days),
            &[],
        )
        .await
    }
    .await;
    remove_scratch(&[csr.as_path(), extfile.as_path()]).await;
    signed?;
    run(openssl, &pfx_args(&pki), &[(PFX_PASS_ENV, &req.pfx_passphrase)]).await?;

    info!(
        "test PKI written to {} (CN={}, valid {} days)",
        req.out_dir.display(),
        req.common_name,
        req.days
    );
    Ok(pki)
}

/// Sign a CSR (e.g. one downloaded from the appliance) with the test CA in
/// `ca_dir`, as a serverAuth certificate valid for the given names.
pub async fn sign_csr(
    openssl:      &Path,
    ca_dir:       &Path,
    csr:          &Path,
    out:          &Path,
    dns_names:    &[String],
    ip_addresses: &[IpAddr],
    days:         u32,
) -> Result<PathBuf> {
    let ca = TestPki::in_dir(ca_dir);
    for required in [ca.ca_cert.as_path(), ca.ca_key.as_path(), csr] {
        if !required.is_file() {
            return Err(AdminError::Certificate(format!("{} not found", required.display())));
        }
    }

    let extfile = scratch_path(out, "ext");
    tokio::fs::write(&extfile, leaf_extensions(dns_names, ip_addresses)).await?;
    let signed = run(openssl, &sign_args(&ca.ca_cert, &ca.ca_key, csr, &extfile, out, days), &[]).await;
    remove_scratch(&[extfile.as_path()]).await;
    signed?;

    info!("signed {} -> {}", csr.display(), out.display());
    Ok(out.to_path_buf())
}
