//! Appliance, session-module and cluster state as reported by the API.
//!
//! All state fields are closed enums. A value this tool does not know maps to
//! `Unknown`, which never equals a wait target.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::{fetch, Api, ApiRequest, Service};
use crate::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[value(rename_all = "PascalCase")]
pub enum ApplianceState {
    Online,
    OnlineReadOnly,
    Offline,
    Quarantine,
    Restarting,
    ShuttingDown,
    Updating,
    Joining,
    Leaving,
    EnrollingReplica,
    Unreachable,
    #[default]
    #[serde(other)]
    #[value(skip)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[value(rename_all = "PascalCase")]
pub enum ContainerState {
    Running,
    Stopped,
    Starting,
    Stopping,
    Restarting,
    #[default]
    #[serde(other)]
    #[value(skip)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[value(rename_all = "PascalCase")]
pub enum ModuleState {
    Online,
    Offline,
    Starting,
    Stopping,
    Upgrading,
    Failed,
    #[default]
    #[serde(other)]
    #[value(skip)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterOperation {
    None,
    Enroll,
    Unjoin,
    FailOver,
    Restore,
    ClusterPatch,
    ClusterRestart,
    #[default]
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StagingStatus {
    Staged,
    Staging,
    NotStaged,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Either a specific state or a wildcard that matches every state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFilter<T> {
    Any,
    Is(T),
}

impl<T: PartialEq> StateFilter<T> {
    pub fn matches(&self, state: &T) -> bool {
        match self {
            StateFilter::Any => true,
            StateFilter::Is(target) => target == state,
        }
    }
}

impl<T: ValueEnum> StateFilter<T> {
    /// Parse `any` (any case) or one of `T`'s names (any case).
    pub fn parse(input: &str) -> std::result::Result<Self, String> {
        if input.eq_ignore_ascii_case("any") {
            Ok(StateFilter::Any)
        } else {
            T::from_str(input, true).map(StateFilter::Is)
        }
    }
}

// ── Response bodies ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ApplianceStatus {
    /// Appliance identifier used when assigning SSL certificates.
    pub identity: String,
    pub name:     String,
    #[serde(rename = "ApplianceCurrentState")]
    pub state:    ApplianceState,
    #[serde(rename = "ApplianceStateMessage")]
    pub message:  Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SessionModuleStatus {
    pub container_state: ContainerState,
    pub module_state:    ModuleState,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ClusterStatus {
    pub operation: ClusterOperation,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ClusterMember {
    pub id:             String,
    pub name:           String,
    pub is_leader:      bool,
    pub staging_status: StagingStatus,
}

// ── Fetchers ──────────────────────────────────────────────────────────────────

pub async fn appliance_status(api: &impl Api) -> Result<ApplianceStatus> {
    fetch(api, ApiRequest::get(Service::Appliance, "ApplianceStatus")).await
}

/// Appliance state from the notification service, which answers without a
/// token and stays reachable while the core service restarts.
pub async fn notification_status(api: &impl Api) -> Result<ApplianceStatus> {
    fetch(api, ApiRequest::get(Service::Notification, "Status").anonymous()).await
}

pub async fn session_module_status(api: &impl Api) -> Result<SessionModuleStatus> {
    fetch(api, ApiRequest::get(Service::Appliance, "SessionModuleStatus")).await
}

pub async fn cluster_status(api: &impl Api) -> Result<ClusterStatus> {
    fetch(api, ApiRequest::get(Service::Core, "Cluster/Status")).await
}

pub async fn cluster_members(api: &impl Api) -> Result<Vec<ClusterMember>> {
    fetch(api, ApiRequest::get(Service::Core, "Cluster/Members")).await
}
