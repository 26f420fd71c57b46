//! Systems (assets or directories) and their accounts.

use super::{exactly_one, odata_quote, parse_id, resolve_ordered, Identified, Strategy};
use crate::api::{fetch, Api, ApiRequest, Service};
use crate::error::{EntityKind, Result};

/// `Id eq N` for numeric input, otherwise a case-insensitive name match.
fn lookup_filter(input: &str) -> String {
    match parse_id(input) {
        Some(id) => format!("Id eq {id}"),
        None => format!("Name ieq {}", odata_quote(input.trim())),
    }
}

/// Find exactly one object of `kind` in the Core collection at `path`.
async fn lookup(api: &impl Api, path: &str, kind: EntityKind, input: &str) -> Result<u64> {
    let req = ApiRequest::get(Service::Core, path)
        .query("filter", lookup_filter(input))
        .query("fields", "Id");
    let found: Vec<Identified> = fetch(api, req).await?;
    exactly_one(kind, input, &found)
}

pub async fn lookup_asset(api: &impl Api, input: &str) -> Result<u64> {
    lookup(api, "Assets", EntityKind::Asset, input).await
}

pub async fn lookup_directory(api: &impl Api, input: &str) -> Result<u64> {
    lookup(api, "Directories", EntityKind::Directory, input).await
}

/// Asset accounts, optionally only those of asset `asset_id`.
pub async fn lookup_asset_account(api: &impl Api, asset_id: Option<u64>, input: &str) -> Result<u64> {
    let path = match asset_id {
        Some(id) => format!("Assets/{id}/Accounts"),
        None => "AssetAccounts".to_string(),
    };
    lookup(api, &path, EntityKind::AssetAccount, input).await
}

/// Directory accounts, optionally only those of directory `directory_id`.
pub async fn lookup_directory_account(
    api:          &impl Api,
    directory_id: Option<u64>,
    input:        &str,
) -> Result<u64> {
    let path = match directory_id {
        Some(id) => format!("Directories/{id}/Accounts"),
        None => "DirectoryAccounts".to_string(),
    };
    lookup(api, &path, EntityKind::DirectoryAccount, input).await
}

/// A system is an asset first, a directory second.
pub async fn resolve_system_id(api: &impl Api, system: &str) -> Result<u64> {
    resolve_ordered(
        system,
        EntityKind::System,
        vec![
            Strategy::new("asset", || lookup_asset(api, system)),
            Strategy::new("directory", || lookup_directory(api, system)),
        ],
    )
    .await
}

/// An account anywhere: asset accounts first, directory accounts second.
pub async fn resolve_account_id(api: &impl Api, account: &str) -> Result<u64> {
    resolve_ordered(
        account,
        EntityKind::Account,
        vec![
            Strategy::new("asset account", || lookup_asset_account(api, None, account)),
            Strategy::new("directory account", || lookup_directory_account(api, None, account)),
        ],
    )
    .await
}

/// An account of a known system: the asset's accounts first, then the
/// directory's accounts under the same ID.
pub async fn resolve_account_id_in_system(api: &impl Api, system_id: u64, account: &str) -> Result<u64> {
    resolve_ordered(
        account,
        EntityKind::Account,
        vec![
            Strategy::new("asset account", move || lookup_asset_account(api, Some(system_id), account)),
            Strategy::new("directory account", move || {
                lookup_directory_account(api, Some(system_id), account)
            }),
        ],
    )
    .await
}
