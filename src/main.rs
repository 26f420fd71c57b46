//! Administration helpers for a privileged-access appliance's management API.
//!
//! Usage:
//!   appliance-admin --appliance sg.example.com status
//!   appliance-admin -c /etc/appliance-admin/admin.conf wait appliance Online --timeout 900
//!   appliance-admin resolve account administrator --system dc01
//!   appliance-admin testcert pki ./lab-pki --cn sg.lab --ip 10.0.0.5

mod api;
mod certgen;
mod certs;
mod config;
mod error;
mod resolve;
mod tls;
mod wait;

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{debug, warn};
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::status::{appliance_status, ApplianceState, ContainerState, ModuleState, StateFilter};
use crate::api::ApiClient;
use crate::certs::csr::CertificateType;
use crate::config::AdminConfig;
use crate::error::AdminError;
use crate::wait::{PollOutcome, PollSettings};

const DEFAULT_CONFIG: &str = "/etc/appliance-admin/admin.conf";

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(name = "appliance-admin", version, about = "Appliance management API admin helpers")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", env = "APPLIANCE_ADMIN_CONFIG")]
    config: Option<PathBuf>,

    /// Appliance host name or IP address.
    #[arg(long, env = "APPLIANCE_ADMIN_APPLIANCE")]
    appliance: Option<String>,

    /// Bearer access token.
    #[arg(long, env = "APPLIANCE_ADMIN_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// PEM bundle of CAs trusted for the appliance certificate.
    #[arg(long, env = "APPLIANCE_ADMIN_CA_FILE")]
    ca_file: Option<PathBuf>,

    /// Accept any appliance certificate.
    #[arg(long)]
    insecure: bool,

    /// Log to stderr even when syslog is configured.
    #[arg(long)]
    stderr: bool,

    /// Debug logging.
    #[arg(short = 'v', long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show the appliance status.
    Status,
    /// Block until the appliance reaches a state.
    Wait {
        #[command(subcommand)]
        target: WaitTarget,
        /// Give up after this many seconds.
        #[arg(long, global = true)]
        timeout: Option<u64>,
        /// Abort on authorization failures instead of retrying.
        #[arg(long, global = true)]
        strict: bool,
    },
    /// Turn a name or ID into a numeric ID.
    Resolve {
        #[command(subcommand)]
        target: ResolveTarget,
    },
    /// Trusted CA certificates.
    Trusted {
        #[command(subcommand)]
        action: TrustedAction,
    },
    /// SSL (web server) certificates.
    Ssl {
        #[command(subcommand)]
        action: SslAction,
    },
    /// Certificate signing requests generated on the appliance.
    Csr {
        #[command(subcommand)]
        action: CsrAction,
    },
    /// Generate test certificates with openssl.
    Testcert {
        #[command(subcommand)]
        action: TestcertAction,
    },
}

#[derive(Debug, Subcommand)]
enum WaitTarget {
    /// Appliance state as reported by the appliance service.
    Appliance {
        #[arg(value_enum)]
        state: ApplianceState,
    },
    /// Appliance online, via the anonymous notification service.
    Online,
    /// Session module container and module state (`Any` ignores a field).
    SessionModule {
        #[arg(long, default_value = "Running", value_parser = StateFilter::<ContainerState>::parse)]
        container: StateFilter<ContainerState>,
        #[arg(long, default_value = "Any", value_parser = StateFilter::<ModuleState>::parse)]
        module: StateFilter<ModuleState>,
    },
    /// No cluster operation in progress.
    ClusterOperation,
    /// Staged patch present on every cluster member.
    PatchDistribution,
}

#[derive(Debug, Subcommand)]
enum ResolveTarget {
    /// Asset or directory.
    System { system: String },
    /// Asset account or directory account.
    Account {
        account: String,
        /// Only accounts of this system (name or ID).
        #[arg(long)]
        system: Option<String>,
    },
    ReasonCode { reason_code: String },
}

#[derive(Debug, Subcommand)]
enum TrustedAction {
    List,
    Get { thumbprint: String },
    /// Upload a PEM or DER CA certificate.
    Install { file: PathBuf },
    Uninstall {
        #[arg(required_unless_present = "file")]
        thumbprint: Option<String>,
        /// Take the thumbprint from this certificate file.
        #[arg(long, conflicts_with = "thumbprint")]
        file: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum SslAction {
    List,
    Get { thumbprint: String },
    /// Upload a PKCS#12 bundle.
    Install {
        pfx: PathBuf,
        #[arg(long, env = "APPLIANCE_ADMIN_PFX_PASSPHRASE", hide_env_values = true)]
        passphrase: Option<String>,
        /// Serve the certificate on this appliance once installed.
        #[arg(long)]
        assign: bool,
    },
    Uninstall { thumbprint: String },
    Assign {
        thumbprint: String,
        /// Appliance ID; defaults to the connected appliance.
        #[arg(long)]
        appliance_id: Option<String>,
    },
    Unassign { thumbprint: String },
}

#[derive(Debug, Subcommand)]
enum CsrAction {
    List,
    New {
        /// Subject distinguished name, e.g. `CN=sg.example.com`.
        subject: String,
        #[arg(long = "type", value_enum, default_value = "Ssl")]
        certificate_type: CertificateType,
        #[arg(long, default_value_t = 2048)]
        key_length: u32,
        #[arg(long = "dns")]
        dns_names: Vec<String>,
        #[arg(long = "ip")]
        ip_addresses: Vec<IpAddr>,
        /// Write the request as PEM here instead of printing it.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    Remove { thumbprint: String },
}

#[derive(Debug, Subcommand)]
enum TestcertAction {
    /// Root CA, serverAuth leaf and PKCS#12 bundle.
    Pki {
        out_dir: PathBuf,
        #[arg(long)]
        cn: String,
        #[arg(long = "dns")]
        dns_names: Vec<String>,
        #[arg(long = "ip")]
        ip_addresses: Vec<IpAddr>,
        #[arg(long, default_value_t = 365)]
        days: u32,
        #[arg(long, env = "APPLIANCE_ADMIN_PFX_PASSPHRASE", hide_env_values = true, default_value = "")]
        passphrase: String,
    },
    /// Sign a CSR with a test CA made by `testcert pki`.
    SignCsr {
        csr: PathBuf,
        #[arg(long)]
        ca_dir: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long = "dns")]
        dns_names: Vec<String>,
        #[arg(long = "ip")]
        ip_addresses: Vec<IpAddr>,
        #[arg(long, default_value_t = 365)]
        days: u32,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let cfg = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("appliance-admin: config error: {e:#}");
            process::exit(1);
        }
    };

    let use_syslog = cfg.log_syslog && !cli.stderr;
    if let Err(e) = setup_logging(use_syslog, cli.verbose) {
        eprintln!("appliance-admin: {e:#}");
        process::exit(1);
    }

    // Must happen before any TLS configuration is built.
    if rustls_post_quantum::provider().install_default().is_err() {
        debug!("TLS crypto provider already installed");
    }

    match run(cli.command, cfg).await {
        Ok(Value::Null) => {}
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("appliance-admin: cannot print result: {e}");
                process::exit(1);
            }
        },
        Err(e) => {
            report(&e);
            process::exit(1);
        }
    }
}

fn report(e: &anyhow::Error) {
    eprintln!("appliance-admin: {e:#}");
    if let Some(AdminError::ResolutionFailed { attempts, .. }) = e.downcast_ref::<AdminError>() {
        for attempt in attempts {
            warn!("  {} lookup: {}", attempt.strategy, attempt.reason);
        }
    }
}

/// Config file (explicit, else the default if present), then CLI/env flags.
fn load_config(cli: &Cli) -> anyhow::Result<AdminConfig> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None if Path::new(DEFAULT_CONFIG).is_file() => config::load_config(Path::new(DEFAULT_CONFIG))?,
        None => AdminConfig::default(),
    };
    if let Some(appliance) = &cli.appliance {
        cfg.appliance = appliance.clone();
    }
    if let Some(token) = &cli.token {
        cfg.access_token = Some(token.clone());
    }
    if let Some(ca_file) = &cli.ca_file {
        cfg.ca_file = Some(ca_file.clone());
    }
    if cli.insecure {
        cfg.insecure = true;
    }
    Ok(cfg)
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

async fn run(command: Command, mut cfg: AdminConfig) -> anyhow::Result<Value> {
    // Local certificate generation needs no appliance.
    if let Command::Testcert { action } = command {
        let openssl = certgen::find_openssl(&cfg.openssl)?;
        return run_testcert(&openssl, action).await;
    }

    if let Command::Wait { strict: true, .. } = &command {
        cfg.strict_auth_errors = true;
    }
    config::validate_config(&cfg).context("invalid configuration")?;
    let api = ApiClient::new(&cfg).context("cannot create API client")?;

    let output = match command {
        Command::Status => to_json(appliance_status(&api).await?)?,
        Command::Wait { target, timeout, .. } => {
            let mut settings = PollSettings::from_config(&cfg);
            if let Some(secs) = timeout {
                settings = settings.with_timeout(Duration::from_secs(secs));
            }
            run_wait(&api, target, &settings).await?
        }
        Command::Resolve { target } => {
            let id = run_resolve(&api, target).await?;
            json!({ "id": id })
        }
        Command::Trusted { action } => run_trusted(&api, action).await?,
        Command::Ssl { action } => run_ssl(&api, action).await?,
        Command::Csr { action } => run_csr(&api, action).await?,
        // handled above
        Command::Testcert { .. } => Value::Null,
    };
    Ok(output)
}

fn to_json<T: Serialize>(value: T) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn outcome_json<S: Serialize>(outcome: PollOutcome<S>) -> anyhow::Result<Value> {
    Ok(json!({
        "state":   serde_json::to_value(outcome.state)?,
        "elapsed": outcome.elapsed.as_secs(),
        "polls":   outcome.polls,
    }))
}

async fn run_wait(api: &ApiClient, target: WaitTarget, settings: &PollSettings) -> anyhow::Result<Value> {
    use crate::wait::conditions::*;

    match target {
        WaitTarget::Appliance { state } => outcome_json(wait_for_appliance_state(api, state, settings).await?),
        WaitTarget::Online => outcome_json(wait_for_online(api, settings).await?),
        WaitTarget::SessionModule { container, module } => {
            outcome_json(wait_for_session_module(api, container, module, settings).await?)
        }
        WaitTarget::ClusterOperation => outcome_json(wait_for_cluster_operation(api, settings).await?),
        WaitTarget::PatchDistribution => outcome_json(wait_for_patch_distribution(api, settings).await?),
    }
}

async fn run_resolve(api: &ApiClient, target: ResolveTarget) -> anyhow::Result<u64> {
    use crate::resolve::entities::{resolve_account_id, resolve_account_id_in_system, resolve_system_id};
    use crate::resolve::reason::resolve_reason_code_id;

    let id = match target {
        ResolveTarget::System { system } => resolve_system_id(api, &system).await?,
        ResolveTarget::Account { account, system: None } => resolve_account_id(api, &account).await?,
        ResolveTarget::Account { account, system: Some(system) } => {
            let system_id = resolve_system_id(api, &system).await?;
            resolve_account_id_in_system(api, system_id, &account).await?
        }
        ResolveTarget::ReasonCode { reason_code } => resolve_reason_code_id(api, &reason_code).await?,
    };
    Ok(id)
}

async fn run_trusted(api: &ApiClient, action: TrustedAction) -> anyhow::Result<Value> {
    use crate::certs::trusted::*;

    match action {
        TrustedAction::List => to_json(list_trusted(api).await?),
        TrustedAction::Get { thumbprint } => to_json(get_trusted(api, &thumbprint).await?),
        TrustedAction::Install { file } => to_json(
            install_trusted(api, &file)
                .await
                .with_context(|| format!("cannot install {}", file.display()))?,
        ),
        TrustedAction::Uninstall { thumbprint, file } => {
            let thumbprint = match (thumbprint, file) {
                (Some(tp), _) => tp,
                (None, Some(file)) => certs::load_certificate(&file).await?.thumbprint,
                (None, None) => anyhow::bail!("a thumbprint or --file is required"),
            };
            uninstall_trusted(api, &thumbprint).await?;
            Ok(Value::Null)
        }
    }
}

async fn run_ssl(api: &ApiClient, action: SslAction) -> anyhow::Result<Value> {
    use crate::certs::ssl::*;

    match action {
        SslAction::List => to_json(list_ssl(api).await?),
        SslAction::Get { thumbprint } => to_json(get_ssl(api, &thumbprint).await?),
        SslAction::Install { pfx, passphrase, assign } => {
            let cert = install_ssl(api, &pfx, passphrase.as_deref())
                .await
                .with_context(|| format!("cannot install {}", pfx.display()))?;
            if assign {
                assign_ssl(api, &cert.thumbprint, None).await?;
                return to_json(get_ssl(api, &cert.thumbprint).await?);
            }
            to_json(cert)
        }
        SslAction::Uninstall { thumbprint } => {
            uninstall_ssl(api, &thumbprint).await?;
            Ok(Value::Null)
        }
        SslAction::Assign { thumbprint, appliance_id } => {
            assign_ssl(api, &thumbprint, appliance_id.as_deref()).await?;
            Ok(Value::Null)
        }
        SslAction::Unassign { thumbprint } => {
            unassign_ssl(api, &thumbprint).await?;
            Ok(Value::Null)
        }
    }
}

async fn run_csr(api: &ApiClient, action: CsrAction) -> anyhow::Result<Value> {
    use crate::certs::csr::*;

    match action {
        CsrAction::List => to_json(list_csrs(api).await?),
        CsrAction::New { subject, certificate_type, key_length, dns_names, ip_addresses, out } => {
            let req = CsrRequest {
                certificate_type,
                subject,
                key_length,
                dns_names,
                ip_addresses: ip_addresses.iter().map(ToString::to_string).collect(),
            };
            let csr = new_csr(api, &req).await?;
            match out {
                Some(path) => {
                    tokio::fs::write(&path, csr_to_pem(&csr.base64_request_data))
                        .await
                        .with_context(|| format!("cannot write {}", path.display()))?;
                    Ok(json!({ "thumbprint": csr.thumbprint, "file": path }))
                }
                None => to_json(csr),
            }
        }
        CsrAction::Remove { thumbprint } => {
            remove_csr(api, &thumbprint).await?;
            Ok(Value::Null)
        }
    }
}

async fn run_testcert(openssl: &Path, action: TestcertAction) -> anyhow::Result<Value> {
    match action {
        TestcertAction::Pki { out_dir, cn, dns_names, ip_addresses, days, passphrase } => {
            let req = certgen::TestPkiRequest {
                out_dir,
                common_name: cn,
                dns_names,
                ip_addresses,
                days,
                pfx_passphrase: passphrase,
            };
            to_json(certgen::generate_test_pki(openssl, &req).await?)
        }
        TestcertAction::SignCsr { csr, ca_dir, out, dns_names, ip_addresses, days } => {
            let cert = certgen::sign_csr(openssl, &ca_dir, &csr, &out, &dns_names, &ip_addresses, days).await?;
            Ok(json!({ "certificate": cert }))
        }
    }
}

// ── Logging setup ─────────────────────────────────────────────────────────────

fn setup_logging(use_syslog: bool, verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { log::LevelFilter::Debug } else { log::LevelFilter::Info };
    if use_syslog {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_USER,
            hostname: None,
            process:  "appliance-admin".into(),
            pid:      process::id(),
        };
        let logger = syslog::unix(formatter)
            .map_err(|e| anyhow::anyhow!("syslog connect failed: {e}"))?;
        log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
            .map(|()| log::set_max_level(level))
            .map_err(|e| anyhow::anyhow!("set_logger: {e}"))?;
    } else {
        env_logger::Builder::new()
            .filter_level(level)
            .parse_default_env()
            .init();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"appliance = from-file\naccess_token = file-token\n").unwrap();
        let path = file.path().display().to_string();
        let cli = Cli::parse_from(["appliance-admin", "-c", &path, "--appliance", "from-flag", "status"]);
        let cfg = load_config(&cli).unwrap();
        assert_eq!(cfg.appliance, "from-flag");
        assert_eq!(cfg.access_token.as_deref(), Some("file-token"));
    }

    #[test]
    fn session_module_filters_parse() {
        let cli = Cli::parse_from([
            "appliance-admin", "wait", "session-module", "--container", "running", "--module", "any", "--timeout", "60",
        ]);
        match cli.command {
            Command::Wait { target: WaitTarget::SessionModule { container, module }, timeout, .. } => {
                assert_eq!(container, StateFilter::Is(ContainerState::Running));
                assert_eq!(module, StateFilter::Any);
                assert_eq!(timeout, Some(60));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn appliance_state_accepts_pascal_case_names() {
        let cli = Cli::parse_from(["appliance-admin", "wait", "appliance", "OnlineReadOnly"]);
        assert!(matches!(
            cli.command,
            Command::Wait { target: WaitTarget::Appliance { state: ApplianceState::OnlineReadOnly }, .. }
        ));
    }
}
