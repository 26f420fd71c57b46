//! Error types for the appliance admin tool.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// How strictly remote failures are treated while a wait loop is polling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Every remote or transport failure counts as "not there yet".
    #[default]
    Lenient,
    /// Authorization failures and undecodable responses abort the wait.
    Strict,
}

/// The kind of entity a lookup or resolution was trying to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Asset,
    Directory,
    System,
    AssetAccount,
    DirectoryAccount,
    Account,
    ReasonCode,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Asset            => "asset",
            EntityKind::Directory        => "directory",
            EntityKind::System           => "system",
            EntityKind::AssetAccount     => "asset account",
            EntityKind::DirectoryAccount => "directory account",
            EntityKind::Account          => "account",
            EntityKind::ReasonCode       => "reason code",
        })
    }
}

/// One failed step of an ordered-fallback resolution.
#[derive(Debug, Clone)]
pub struct StrategyFailure {
    pub strategy: &'static str,
    pub reason:   String,
}

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS: {0}")]
    Tls(#[from] rustls::Error),

    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{service} {path} returned HTTP {status}: {message}")]
    Api {
        service: String,
        path:    String,
        status:  u16,
        message: String,
    },

    #[error("Config: {0}")]
    Config(String),

    #[error("Certificate: {0}")]
    Certificate(String),

    #[error("{program} failed ({status}): {stderr}")]
    Tool {
        program: String,
        status:  String,
        stderr:  String,
    },

    #[error("timed out after {}s waiting for {condition} (last state: {})",
        .timeout.as_secs(), .last_state.as_deref().unwrap_or("unreachable"))]
    Timeout {
        condition:  String,
        timeout:    Duration,
        last_state: Option<String>,
    },

    #[error("unable to resolve {kind} '{input}'")]
    ResolutionFailed {
        kind:     EntityKind,
        input:    String,
        attempts: Vec<StrategyFailure>,
    },

    #[error("found {count} {kind}s matching '{input}'")]
    AmbiguousResult {
        kind:  EntityKind,
        input: String,
        count: usize,
    },

    #[error("unable to find {kind} matching '{input}'")]
    NotFound {
        kind:  EntityKind,
        input: String,
    },

    #[error("cannot look up {kind} '{input}': {source}")]
    Lookup {
        kind:   EntityKind,
        input:  String,
        source: Box<AdminError>,
    },
}

impl AdminError {
    /// Whether a status fetch that failed with this error should be retried
    /// by a wait loop rather than abort it.
    ///
    /// Local failures (config, files, TLS setup, external tools) can never
    /// change between polls and are always fatal.
    pub fn is_transient(&self, policy: ErrorPolicy) -> bool {
        match self {
            AdminError::Http(_) => true,
            AdminError::Api { status, .. } => match policy {
                ErrorPolicy::Lenient => true,
                ErrorPolicy::Strict  => !matches!(status, 401 | 403),
            },
            AdminError::Json(_) => policy == ErrorPolicy::Lenient,
            _ => false,
        }
    }

    /// The API refused the query itself (as opposed to finding nothing).
    pub fn is_filter_rejected(&self) -> bool {
        matches!(self, AdminError::Api { status: 400, .. })
    }
}

pub type Result<T> = std::result::Result<T, AdminError>;
