//! The concrete waits: appliance state, online status, session module,
//! cluster operation and patch distribution.

use super::{poll_until, PollOutcome, PollSettings};
use crate::api::status::{
    self, ApplianceState, ApplianceStatus, ClusterMember, ClusterOperation, ClusterStatus,
    ContainerState, ModuleState, SessionModuleStatus, StagingStatus, StateFilter,
};
use crate::api::Api;
use crate::error::Result;

pub fn session_module_matches(
    status:    &SessionModuleStatus,
    container: StateFilter<ContainerState>,
    module:    StateFilter<ModuleState>,
) -> bool {
    container.matches(&status.container_state) && module.matches(&status.module_state)
}

pub fn cluster_idle(status: &ClusterStatus) -> bool {
    status.operation == ClusterOperation::None
}

/// Every member reports the same staging status and that status is `Staged`.
/// An empty member list never counts as distributed.
pub fn patch_distributed(members: &[ClusterMember]) -> bool {
    match members.first() {
        None => false,
        Some(first) => {
            first.staging_status == StagingStatus::Staged
                && members.iter().all(|m| m.staging_status == first.staging_status)
        }
    }
}

fn describe_filter<T: std::fmt::Debug>(filter: &StateFilter<T>) -> String {
    match filter {
        StateFilter::Any => "Any".to_string(),
        StateFilter::Is(state) => format!("{state:?}"),
    }
}

/// Wait until the appliance status reports `target`.
pub async fn wait_for_appliance_state(
    api:      &impl Api,
    target:   ApplianceState,
    settings: &PollSettings,
) -> Result<PollOutcome<ApplianceStatus>> {
    poll_until(
        &format!("appliance state {target:?}"),
        settings,
        || status::appliance_status(api),
        |s| s.state == target,
    )
    .await
}

/// Wait until the appliance is back online, e.g. after a restart or patch.
pub async fn wait_for_online(
    api:      &impl Api,
    settings: &PollSettings,
) -> Result<PollOutcome<ApplianceStatus>> {
    poll_until(
        "appliance online",
        settings,
        || status::notification_status(api),
        |s| s.state == ApplianceState::Online,
    )
    .await
}

/// Wait for the session module; an `Any` filter ignores that field.
pub async fn wait_for_session_module(
    api:       &impl Api,
    container: StateFilter<ContainerState>,
    module:    StateFilter<ModuleState>,
    settings:  &PollSettings,
) -> Result<PollOutcome<SessionModuleStatus>> {
    let condition = format!(
        "session module container {} and module {}",
        describe_filter(&container),
        describe_filter(&module)
    );
    poll_until(
        &condition,
        settings,
        || status::session_module_status(api),
        |s| session_module_matches(s, container, module),
    )
    .await
}

/// Wait until no cluster operation is in progress.
pub async fn wait_for_cluster_operation(
    api:      &impl Api,
    settings: &PollSettings,
) -> Result<PollOutcome<ClusterStatus>> {
    poll_until(
        "cluster operation None",
        settings,
        || status::cluster_status(api),
        cluster_idle,
    )
    .await
}

/// Wait until a staged patch has reached every cluster member.
pub async fn wait_for_patch_distribution(
    api:      &impl Api,
    settings: &PollSettings,
) -> Result<PollOutcome<Vec<ClusterMember>>> {
    poll_until(
        "patch staged on all cluster members",
        settings,
        || status::cluster_members(api),
        |members| patch_distributed(members),
    )
    .await
}
