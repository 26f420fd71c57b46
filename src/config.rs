//! Admin tool configuration file parser.
//!
//! Parses a flat `key = value` file; `#` starts a comment line and unknown
//! keys are ignored.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AdminError, ErrorPolicy, Result};

// Default constants (seconds unless noted)
const API_VERSION:     u32 = 4;
const REQUEST_TIMEOUT: u64 = 30;
const POLL_INTERVAL:   u64 = 2;
const WAIT_TIMEOUT:    u64 = 600;

/// Full admin tool configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    // ── Appliance connection ──────────────────────────────────────────────────
    /// Appliance hostname or IP address.
    pub appliance: String,
    /// REST API version segment (`/service/core/v4/...`).
    pub api_version: u32,
    /// Bearer token sent with authenticated requests.
    pub access_token: Option<String>,
    /// File holding the bearer token (read when `access_token` is unset).
    pub access_token_file: Option<PathBuf>,
    // ── TLS ───────────────────────────────────────────────────────────────────
    /// PEM bundle of CAs trusted for the appliance's web certificate.
    pub ca_file: Option<PathBuf>,
    /// Accept any appliance certificate.
    pub insecure: bool,
    // ── Timing ────────────────────────────────────────────────────────────────
    pub request_timeout: u64,
    pub poll_interval:   u64,
    pub wait_timeout:    u64,
    /// Abort waits on authorization failures instead of retrying them.
    pub strict_auth_errors: bool,
    // ── Local tools / process ─────────────────────────────────────────────────
    /// `openssl` binary used for test certificate generation.
    pub openssl: PathBuf,
    pub log_syslog: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            appliance:          String::new(),
            api_version:        API_VERSION,
            access_token:       None,
            access_token_file:  None,
            ca_file:            None,
            insecure:           false,
            request_timeout:    REQUEST_TIMEOUT,
            poll_interval:      POLL_INTERVAL,
            wait_timeout:       WAIT_TIMEOUT,
            strict_auth_errors: false,
            openssl:            PathBuf::from("openssl"),
            log_syslog:         false,
        }
    }
}

impl AdminConfig {
    /// The bearer token, read from `access_token_file` if no literal token is set.
    pub fn access_token(&self) -> Result<Option<String>> {
        if let Some(token) = &self.access_token {
            return Ok(Some(token.clone()));
        }
        match &self.access_token_file {
            Some(path) => {
                let token = fs::read_to_string(path)
                    .map_err(|e| AdminError::Config(format!("cannot read {}: {e}", path.display())))?;
                let token = token.trim();
                if token.is_empty() {
                    Err(AdminError::Config(format!("{} is empty", path.display())))
                } else {
                    Ok(Some(token.to_string()))
                }
            }
            None => Ok(None),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout)
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        if self.strict_auth_errors { ErrorPolicy::Strict } else { ErrorPolicy::Lenient }
    }
}

fn parse_bool(val: &str) -> bool {
    val == "true" || val == "1" || val == "yes"
}

/// Parse `path` as an admin tool `key = value` configuration file.
pub fn load_config(path: &Path) -> Result<AdminConfig> {
    let content = fs::read_to_string(path)
        .map_err(|e| AdminError::Config(format!("cannot read {}: {e}", path.display())))?;
    Ok(parse_config(&content))
}

fn parse_config(content: &str) -> AdminConfig {
    let mut cfg = AdminConfig::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut parts = line.splitn(2, '=');
        let key = match parts.next() {
            Some(k) => k.trim().to_ascii_lowercase(),
            None => continue,
        };
        let val = match parts.next() {
            Some(v) => v.trim().to_string(),
            None => continue,
        };
        if val.is_empty() {
            continue;
        }

        match key.as_str() {
            "appliance"          => cfg.appliance          = val,
            "api_version"        => cfg.api_version        = val.parse().unwrap_or(API_VERSION),
            "access_token"       => cfg.access_token       = Some(val),
            "access_token_file"  => cfg.access_token_file  = Some(PathBuf::from(&val)),
            "ca_file"            => cfg.ca_file            = Some(PathBuf::from(&val)),
            "insecure"           => cfg.insecure           = parse_bool(&val),
            "request_timeout"    => cfg.request_timeout    = val.parse().unwrap_or(REQUEST_TIMEOUT),
            "poll_interval"      => cfg.poll_interval      = val.parse().unwrap_or(POLL_INTERVAL),
            "wait_timeout"       => cfg.wait_timeout       = val.parse().unwrap_or(WAIT_TIMEOUT),
            "strict_auth_errors" => cfg.strict_auth_errors = parse_bool(&val),
            "openssl"            => cfg.openssl            = PathBuf::from(&val),
            "log_syslog"         => cfg.log_syslog         = parse_bool(&val),
            _ => {} // ignore unknown keys
        }
    }

    cfg
}

/// Validate the fields every remote command needs.
pub fn validate_config(cfg: &AdminConfig) -> Result<()> {
    if cfg.appliance.is_empty() {
        return Err(AdminError::Config("appliance is required".into()));
    }
    if cfg.appliance.contains('/') {
        return Err(AdminError::Config(format!(
            "appliance must be a host name or address, not a URL: {}",
            cfg.appliance
        )));
    }
    if cfg.request_timeout == 0 {
        return Err(AdminError::Config("request_timeout must be at least 1 second".into()));
    }
    if cfg.poll_interval == 0 {
        return Err(AdminError::Config("poll_interval must be at least 1 second".into()));
    }
    if cfg.insecure && cfg.ca_file.is_some() {
        return Err(AdminError::Config("ca_file and insecure are mutually exclusive".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn parse_full_file() {
        let cfg = parse_config(
            "# appliance admin\n\
             appliance = sg.example.com\n\
             api_version = 3\n\
             access_token = abc123\n\
             ca_file = /etc/appliance-admin/ca.pem\n\
             poll_interval = 5\n\
             wait_timeout = 120\n\
             strict_auth_errors = yes\n\
             something_else = ignored\n",
        );
        assert_eq!(cfg.appliance, "sg.example.com");
        assert_eq!(cfg.api_version, 3);
        assert_eq!(cfg.access_token.as_deref(), Some("abc123"));
        assert_eq!(cfg.ca_file, Some(PathBuf::from("/etc/appliance-admin/ca.pem")));
        assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
        assert_eq!(cfg.wait_timeout(), Duration::from_secs(120));
        assert_eq!(cfg.error_policy(), ErrorPolicy::Strict);
    }

    #[test]
    fn bad_numbers_fall_back_to_defaults() {
        let cfg = parse_config("poll_interval = soon\nwait_timeout = -1\n");
        assert_eq!(cfg.poll_interval, POLL_INTERVAL);
        assert_eq!(cfg.wait_timeout, WAIT_TIMEOUT);
        assert_eq!(cfg.error_policy(), ErrorPolicy::Lenient);
    }

    #[test]
    fn token_read_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  token-from-file  ").unwrap();
        let cfg = AdminConfig {
            access_token_file: Some(file.path().to_path_buf()),
            ..AdminConfig::default()
        };
        assert_eq!(cfg.access_token().unwrap().as_deref(), Some("token-from-file"));
    }

    #[test]
    fn literal_token_wins_over_file() {
        let cfg = AdminConfig {
            access_token:      Some("literal".into()),
            access_token_file: Some(PathBuf::from("/nonexistent")),
            ..AdminConfig::default()
        };
        assert_eq!(cfg.access_token().unwrap().as_deref(), Some("literal"));
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/admin.conf")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/admin.conf"), "{err}");
    }

    #[test]
    fn validate_rejects_missing_appliance_and_urls() {
        assert!(validate_config(&AdminConfig::default()).is_err());
        let cfg = AdminConfig { appliance: "https://sg.example.com".into(), ..AdminConfig::default() };
        assert!(validate_config(&cfg).is_err());
        let cfg = AdminConfig { appliance: "sg.example.com".into(), ..AdminConfig::default() };
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn validate_rejects_zero_durations() {
        let cfg = parse_config("appliance = sg\nrequest_timeout = 0\n");
        assert_eq!(cfg.request_timeout, 0);
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("request_timeout"), "{err}");

        let cfg = parse_config("appliance = sg\npoll_interval = 0\n");
        let err = validate_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("poll_interval"), "{err}");
    }
}
