//! Reason codes, looked up by ID or by name.

use log::debug;

use super::{exactly_one, odata_quote, parse_id, Identified};
use crate::api::{fetch, Api, ApiRequest, Service};
use crate::error::{AdminError, EntityKind, Result};

/// Resolve a reason code name (or ID) to its ID.
///
/// Numeric input is returned as-is without a remote call. Names are matched
/// case-insensitively with an OData filter; appliances that reject the
/// filter are queried again with the free-text `q` parameter. Zero or
/// several matches are an error, and so is any failed query, which is
/// reported against `reason_code`.
pub async fn resolve_reason_code_id(api: &impl Api, reason_code: &str) -> Result<u64> {
    if let Some(id) = parse_id(reason_code) {
        return Ok(id);
    }

    let found = search(api, reason_code.trim())
        .await
        .map_err(|e| AdminError::Lookup {
            kind:   EntityKind::ReasonCode,
            input:  reason_code.to_string(),
            source: Box::new(e),
        })?;

    exactly_one(EntityKind::ReasonCode, reason_code, &found)
}

async fn search(api: &impl Api, name: &str) -> Result<Vec<Identified>> {
    let by_filter = ApiRequest::get(Service::Core, "ReasonCodes")
        .query("filter", format!("Name ieq {}", odata_quote(name)))
        .query("fields", "Id");
    match fetch(api, by_filter).await {
        Err(e) if e.is_filter_rejected() => {
            debug!("reason code filter rejected ({e}); retrying with free-text query");
            let by_text = ApiRequest::get(Service::Core, "ReasonCodes")
                .query("q", name)
                .query("fields", "Id");
            fetch(api, by_text).await
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Method;
    use serde_json::json;

    use super::*;
    use crate::api::testing::{FakeApi, Reply};

    #[tokio::test]
    async fn numeric_input_needs_no_remote_call() {
        let api = FakeApi::new();
        assert_eq!(resolve_reason_code_id(&api, "5").await.unwrap(), 5);
        assert_eq!(api.call_count(), 0);
    }

    #[tokio::test]
    async fn single_name_match_returns_id() {
        let api = FakeApi::new().on_get(Service::Core, "ReasonCodes", Reply::Json(json!([{ "Id": 3 }])));
        assert_eq!(resolve_reason_code_id(&api, "Emergency").await.unwrap(), 3);
        let calls = api.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].query.contains(&("filter".to_string(), "Name ieq 'Emergency'".to_string())));
    }

    #[tokio::test]
    async fn no_match_is_not_found() {
        let api = FakeApi::new().on_get(Service::Core, "ReasonCodes", Reply::Json(json!([])));
        let err = resolve_reason_code_id(&api, "Emergency").await.unwrap_err();
        assert!(matches!(err, AdminError::NotFound { kind: EntityKind::ReasonCode, ref input } if input == "Emergency"));
    }

    #[tokio::test]
    async fn two_matches_are_ambiguous() {
        let api = FakeApi::new().on_get(
            Service::Core,
            "ReasonCodes",
            Reply::Json(json!([{ "Id": 3 }, { "Id": 8 }])),
        );
        let err = resolve_reason_code_id(&api, "Emergency").await.unwrap_err();
        assert!(matches!(err, AdminError::AmbiguousResult { count: 2, .. }));
    }

    #[tokio::test]
    async fn rejected_filter_falls_back_to_free_text() {
        let api = FakeApi::new().on(
            Method::GET,
            Service::Core,
            "ReasonCodes",
            vec![Reply::Status(400), Reply::Json(json!([{ "Id": 11 }]))],
        );
        assert_eq!(resolve_reason_code_id(&api, "Emergency").await.unwrap(), 11);
        let calls = api.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].query.contains(&("q".to_string(), "Emergency".to_string())));
    }

    #[tokio::test]
    async fn other_failures_are_not_retried() {
        let api = FakeApi::new().on_get(Service::Core, "ReasonCodes", Reply::Status(401));
        let err = resolve_reason_code_id(&api, "Emergency").await.unwrap_err();
        match err {
            AdminError::Lookup { kind, input, source } => {
                assert_eq!(kind, EntityKind::ReasonCode);
                assert_eq!(input, "Emergency");
                assert!(matches!(*source, AdminError::Api { status: 401, .. }));
            }
            other => panic!("expected Lookup, got {other:?}"),
        }
        assert_eq!(api.call_count(), 1);
    }

    #[tokio::test]
    async fn server_error_message_names_the_reason_code() {
        let api = FakeApi::new().on_get(Service::Core, "ReasonCodes", Reply::Status(500));
        let msg = resolve_reason_code_id(&api, "Emergency").await.unwrap_err().to_string();
        assert!(msg.contains("Emergency"), "{msg}");
        assert!(msg.contains("HTTP 500"), "{msg}");
    }

    #[tokio::test]
    async fn failed_free_text_retry_names_the_reason_code() {
        let api = FakeApi::new().on(
            Method::GET,
            Service::Core,
            "ReasonCodes",
            vec![Reply::Status(400), Reply::Status(503)],
        );
        let msg = resolve_reason_code_id(&api, "Emergency").await.unwrap_err().to_string();
        assert!(msg.contains("Emergency"), "{msg}");
        assert_eq!(api.call_count(), 2);
    }

    #[tokio::test]
    async fn undecodable_reply_names_the_reason_code() {
        let api = FakeApi::new().on_get(
            Service::Core,
            "ReasonCodes",
            Reply::Json(json!({ "Unexpected": true })),
        );
        let err = resolve_reason_code_id(&api, "Emergency").await.unwrap_err();
        assert!(err.to_string().contains("Emergency"), "{err}");
        assert!(matches!(err, AdminError::Lookup { ref source, .. } if matches!(**source, AdminError::Json(_))));
    }
}
