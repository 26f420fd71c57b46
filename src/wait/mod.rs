//! Poll a remote status until a condition holds or a time budget runs out.
//!
//! Fetch failures are classified with [`AdminError::is_transient`]: transient
//! ones (the appliance is restarting, the service is not up yet) count as
//! "condition not met" and the loop keeps going; fatal ones end the wait.

pub mod conditions;

use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use log::{debug, info};
use tokio::time::Instant;

use crate::config::AdminConfig;
use crate::error::{AdminError, ErrorPolicy, Result};

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub timeout:  Duration,
    pub interval: Duration,
    pub policy:   ErrorPolicy,
}

impl PollSettings {
    pub fn from_config(cfg: &AdminConfig) -> Self {
        Self {
            timeout:  cfg.wait_timeout(),
            interval: cfg.poll_interval(),
            policy:   cfg.error_policy(),
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }
}

/// The state that satisfied a wait, and what it took to get there.
#[derive(Debug, Clone)]
pub struct PollOutcome<S> {
    pub state:   S,
    pub elapsed: Duration,
    pub polls:   u32,
}

/// Percent of `timeout` that `elapsed` represents, capped at 100.
pub fn percent_elapsed(elapsed: Duration, timeout: Duration) -> u32 {
    if timeout.is_zero() {
        return 100;
    }
    let pct = elapsed.as_secs_f64() / timeout.as_secs_f64() * 100.0;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        pct.min(100.0) as u32
    }
}

/// Repeatedly call `fetch` until `done` accepts its result.
///
/// `condition` describes the target for progress lines and the timeout error.
/// The check happens before the deadline test, so a state that arrives on the
/// last poll still wins; the loop never returns early and never sleeps past
/// the first poll at or after `settings.timeout`.
pub async fn poll_until<S, F, Fut, P>(
    condition: &str,
    settings:  &PollSettings,
    mut fetch: F,
    mut done:  P,
) -> Result<PollOutcome<S>>
where
    S: Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S>>,
    P: FnMut(&S) -> bool,
{
    let start = Instant::now();
    let mut polls = 0u32;

    loop {
        polls += 1;
        let last_state = match fetch().await {
            Ok(state) => {
                if done(&state) {
                    let elapsed = start.elapsed();
                    info!("{condition}: reached {state:?} after {}s", elapsed.as_secs());
                    return Ok(PollOutcome { state, elapsed, polls });
                }
                Some(format!("{state:?}"))
            }
            Err(e) if e.is_transient(settings.policy) => {
                debug!("{condition}: status unavailable: {e}");
                None
            }
            Err(e) => return Err(e),
        };

        let elapsed = start.elapsed();
        info!(
            "waiting for {condition}: current {} ({}% of {}s)",
            last_state.as_deref().unwrap_or("unreachable"),
            percent_elapsed(elapsed, settings.timeout),
            settings.timeout.as_secs()
        );

        if elapsed >= settings.timeout {
            return Err(AdminError::Timeout {
                condition: condition.to_string(),
                timeout: settings.timeout,
                last_state,
            });
        }
        tokio::time::sleep(settings.interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn settings(timeout: u64, interval: u64) -> PollSettings {
        PollSettings {
            timeout:  Duration::from_secs(timeout),
            interval: Duration::from_secs(interval),
            policy:   ErrorPolicy::Lenient,
        }
    }

    fn unreachable() -> AdminError {
        AdminError::Api {
            service: "appliance".into(),
            path:    "ApplianceStatus".into(),
            status:  503,
            message: "Service Unavailable".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn never_true_times_out_no_earlier_than_budget() {
        let polls = Cell::new(0u32);
        let start = Instant::now();
        let err = poll_until(
            "state Online",
            &settings(10, 2),
            || {
                polls.set(polls.get() + 1);
                async { Ok::<_, AdminError>("Offline") }
            },
            |s| *s == "Online",
        )
        .await
        .unwrap_err();

        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(matches!(err, AdminError::Timeout { ref last_state, .. } if last_state.as_deref() == Some("\"Offline\"")));
        assert_eq!(polls.get(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_fetch_still_ends_in_timeout() {
        let start = Instant::now();
        let err = poll_until(
            "cluster idle",
            &settings(7, 2),
            || async { Err::<&str, _>(unreachable()) },
            |_| true,
        )
        .await
        .unwrap_err();

        assert!(start.elapsed() >= Duration::from_secs(7));
        match err {
            AdminError::Timeout { condition, last_state, .. } => {
                assert_eq!(condition, "cluster idle");
                assert!(last_state.is_none());
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_after_exactly_k_polls() {
        let polls = Cell::new(0u32);
        let outcome = poll_until(
            "third time lucky",
            &settings(60, 2),
            || {
                polls.set(polls.get() + 1);
                let n = polls.get();
                async move {
                    match n {
                        1 => Err(unreachable()),
                        2 => Ok(false),
                        _ => Ok(true),
                    }
                }
            },
            |ready| *ready,
        )
        .await
        .unwrap();

        assert_eq!(outcome.polls, 3);
        assert_eq!(polls.get(), 3);
        assert!(outcome.state);
        assert!(outcome.elapsed >= Duration::from_secs(4));
        assert!(outcome.elapsed < Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn first_poll_success_does_not_sleep() {
        let outcome = poll_until("ready", &settings(60, 2), || async { Ok::<_, AdminError>(1) }, |n| *n == 1)
            .await
            .unwrap();
        assert_eq!(outcome.polls, 1);
        assert_eq!(outcome.elapsed, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn strict_policy_aborts_on_forbidden() {
        let polls = Cell::new(0u32);
        let strict = PollSettings { policy: ErrorPolicy::Strict, ..settings(60, 2) };
        let err = poll_until(
            "state Online",
            &strict,
            || {
                polls.set(polls.get() + 1);
                async {
                    Err::<(), _>(AdminError::Api {
                        service: "appliance".into(),
                        path:    "ApplianceStatus".into(),
                        status:  403,
                        message: "Forbidden".into(),
                    })
                }
            },
            |_| true,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AdminError::Api { status: 403, .. }));
        assert_eq!(polls.get(), 1);
    }

    #[test]
    fn percent_is_capped() {
        let t = Duration::from_secs(600);
        assert_eq!(percent_elapsed(Duration::from_secs(0), t), 0);
        assert_eq!(percent_elapsed(Duration::from_secs(300), t), 50);
        assert_eq!(percent_elapsed(Duration::from_secs(900), t), 100);
        assert_eq!(percent_elapsed(Duration::from_secs(1), Duration::ZERO), 100);
    }
}
