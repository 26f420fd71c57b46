//! Resolve an ambiguous user-supplied identifier to a numeric ID.
//!
//! An identifier such as `dc01` or `17` may name one of several kinds of
//! object. [`resolve_ordered`] tries a fixed list of [`Strategy`]s in
//! priority order: the first success wins and later strategies are never run.
//! Individual failures are kept only for logging; if every strategy fails the
//! caller sees a single [`AdminError::ResolutionFailed`].

pub mod entities;
pub mod reason;

use std::future::Future;

use futures_util::future::{FutureExt, LocalBoxFuture};
use log::debug;
use serde::Deserialize;

use crate::error::{AdminError, EntityKind, Result, StrategyFailure};

/// One way of turning the identifier into an ID.
pub struct Strategy<'a> {
    name: &'static str,
    run:  Box<dyn FnOnce() -> LocalBoxFuture<'a, Result<u64>> + 'a>,
}

impl<'a> Strategy<'a> {
    /// The closure is only called if every earlier strategy failed.
    pub fn new<F, Fut>(name: &'static str, run: F) -> Self
    where
        F: FnOnce() -> Fut + 'a,
        Fut: Future<Output = Result<u64>> + 'a,
    {
        Self {
            name,
            run: Box::new(move || run().boxed_local()),
        }
    }
}

/// Run `strategies` in order and return the first ID any of them produces.
pub async fn resolve_ordered(
    input:      &str,
    kind:       EntityKind,
    strategies: Vec<Strategy<'_>>,
) -> Result<u64> {
    let mut attempts = Vec::with_capacity(strategies.len());

    for Strategy { name, run } in strategies {
        match run().await {
            Ok(id) => {
                debug!("resolved {kind} '{input}' to {id} via {name}");
                return Ok(id);
            }
            Err(e) => {
                debug!("{kind} '{input}': {name} lookup failed: {e}");
                attempts.push(StrategyFailure { strategy: name, reason: e.to_string() });
            }
        }
    }

    Err(AdminError::ResolutionFailed {
        kind,
        input: input.to_string(),
        attempts,
    })
}

/// A non-negative integer identifier, if `input` is one.
pub fn parse_id(input: &str) -> Option<u64> {
    input.trim().parse().ok()
}

/// Quote `value` as an OData string literal.
pub fn odata_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// The only field lookups ask the API for.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Identified {
    pub id: u64,
}

/// Exactly one match is an ID; zero or several are errors, never a guess.
pub fn exactly_one(kind: EntityKind, input: &str, found: &[Identified]) -> Result<u64> {
    match found {
        [only] => Ok(only.id),
        [] => Err(AdminError::NotFound { kind, input: input.to_string() }),
        many => Err(AdminError::AmbiguousResult {
            kind,
            input: input.to_string(),
            count: many.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn not_found(kind: EntityKind) -> AdminError {
        AdminError::NotFound { kind, input: "dc01".into() }
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let second_calls = Cell::new(0);
        let id = resolve_ordered(
            "dc01",
            EntityKind::System,
            vec![
                Strategy::new("asset", || async { Ok(7) }),
                Strategy::new("directory", || {
                    second_calls.set(second_calls.get() + 1);
                    async { Ok(9) }
                }),
            ],
        )
        .await
        .unwrap();

        assert_eq!(id, 7);
        assert_eq!(second_calls.get(), 0);
    }

    #[tokio::test]
    async fn falls_back_in_order() {
        let order = std::cell::RefCell::new(Vec::new());
        let id = resolve_ordered(
            "dc01",
            EntityKind::System,
            vec![
                Strategy::new("asset", || {
                    order.borrow_mut().push("asset");
                    async { Err(not_found(EntityKind::Asset)) }
                }),
                Strategy::new("directory", || {
                    order.borrow_mut().push("directory");
                    async { Ok(12) }
                }),
            ],
        )
        .await
        .unwrap();

        assert_eq!(id, 12);
        assert_eq!(*order.borrow(), ["asset", "directory"]);
    }

    #[tokio::test]
    async fn exhaustion_is_resolution_failed_not_last_error() {
        let err = resolve_ordered(
            "dc01",
            EntityKind::System,
            vec![
                Strategy::new("asset", || async { Err(not_found(EntityKind::Asset)) }),
                Strategy::new("directory", || async {
                    Err(AdminError::AmbiguousResult {
                        kind:  EntityKind::Directory,
                        input: "dc01".into(),
                        count: 2,
                    })
                }),
            ],
        )
        .await
        .unwrap_err();

        match err {
            AdminError::ResolutionFailed { kind, input, attempts } => {
                assert_eq!(kind, EntityKind::System);
                assert_eq!(input, "dc01");
                let names: Vec<_> = attempts.iter().map(|a| a.strategy).collect();
                assert_eq!(names, ["asset", "directory"]);
            }
            other => panic!("expected ResolutionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_strategy_list_fails() {
        let err = resolve_ordered("x", EntityKind::Account, Vec::new()).await.unwrap_err();
        assert!(matches!(err, AdminError::ResolutionFailed { .. }));
    }

    #[test]
    fn exactly_one_rejects_zero_and_many() {
        let none: [Identified; 0] = [];
        assert!(matches!(exactly_one(EntityKind::Asset, "a", &none), Err(AdminError::NotFound { .. })));
        let two = [Identified { id: 1 }, Identified { id: 2 }];
        assert!(matches!(
            exactly_one(EntityKind::Asset, "a", &two),
            Err(AdminError::AmbiguousResult { count: 2, .. })
        ));
        assert_eq!(exactly_one(EntityKind::Asset, "a", &two[..1]).unwrap(), 1);
    }

    #[test]
    fn ids_and_quotes() {
        assert_eq!(parse_id(" 42 "), Some(42));
        assert_eq!(parse_id("-3"), None);
        assert_eq!(parse_id("dc01"), None);
        assert_eq!(odata_quote("O'Brien"), "'O''Brien'");
    }
}
