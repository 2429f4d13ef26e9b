//! Action accounting and retry discipline.
//!
//! `run_action_once` wraps one action attempt — typically a tool loop or
//! typed object creation — with a timing/error shim:
//! `AwaitableRequested` → `WAITING`, `ReplanRequested` → re-raised (not
//! accounted as a failure), anything else → re-raised after `FAILED`
//! accounting. Retry with backoff is layered on top, and HITL/replan signals
//! bypass it entirely — they never consume a retry attempt.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::runtime::blackboard::Blackboard;
use crate::runtime::config::RetryPolicyConfig;
use crate::runtime::driver::ToolLoopFailure;
use crate::runtime::error::RuntimeError;
use crate::runtime::hitl::ToolLoopSignal;

/// The outcome code plus how long the attempt ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStatusCode {
    Succeeded,
    Failed,
    Waiting,
}

#[derive(Debug, Clone, Copy)]
pub struct ActionStatusReport {
    pub code: ActionStatusCode,
    pub running_time: Duration,
}

/// The value produced by a successful or suspended action run.
pub enum ActionOutcome<T> {
    Succeeded(T),
    Waiting { awaitable_id: String },
}

/// Terminal failure modes of one action attempt. `Replan` is deliberately not
/// a `Failed` variant, so a caller matching on this enum cannot mistake a
/// replan for a failure and account it as one.
pub enum ActionRunError {
    Failed { status: ActionStatusReport, source: RuntimeError },
    Replan { reason: String },
}

/// Structured terminal-failure payload surfaced to users.
#[derive(Debug, Clone)]
pub struct TerminalFailure {
    pub code: String,
    pub message: String,
    pub offending_tool_name: Option<String>,
    pub retries_attempted: u32,
}

impl From<&RuntimeError> for TerminalFailure {
    fn from(err: &RuntimeError) -> Self {
        let (code, offending_tool_name) = match err {
            RuntimeError::ToolNotFound { name, .. } => ("ToolNotFound", Some(name.clone())),
            RuntimeError::MaxIterationsExceeded { .. } => ("MaxIterationsExceeded", None),
            RuntimeError::InvalidLlmReturnFormat { .. } => ("InvalidLlmReturnFormat", None),
            RuntimeError::InvalidLlmReturnType { .. } => ("InvalidLlmReturnType", None),
            RuntimeError::LlmCallFailed { .. } => ("LlmCallFailed", None),
            RuntimeError::InvalidToolName { name } => ("InvalidToolName", Some(name.clone())),
        };
        Self {
            code: code.to_string(),
            message: err.to_string(),
            offending_tool_name,
            retries_attempted: 0,
        }
    }
}

/// Run one action attempt, applying the timing/error accounting shim.
/// Binds an `AwaitableRequested` signal's `Awaitable` onto the blackboard
/// without the caller having to reach into `crate::runtime::hitl` directly.
pub async fn run_action_once<F, Fut, T>(blackboard: &mut Blackboard, action: F) -> Result<(ActionOutcome<T>, ActionStatusReport), ActionRunError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ToolLoopFailure>>,
{
    let started = Instant::now();
    match action().await {
        Ok(value) => Ok((
            ActionOutcome::Succeeded(value),
            ActionStatusReport {
                code: ActionStatusCode::Succeeded,
                running_time: started.elapsed(),
            },
        )),
        Err(ToolLoopFailure::Signal(ToolLoopSignal::AwaitableRequested(awaitable))) => {
            let awaitable_id = awaitable.id.clone();
            blackboard.add_object(awaitable);
            Ok((
                ActionOutcome::Waiting { awaitable_id },
                ActionStatusReport {
                    code: ActionStatusCode::Waiting,
                    running_time: started.elapsed(),
                },
            ))
        }
        Err(ToolLoopFailure::Signal(ToolLoopSignal::ReplanRequested(replan))) => {
            let reason = replan.reason.clone();
            replan.apply(blackboard);
            Err(ActionRunError::Replan { reason })
        }
        Err(ToolLoopFailure::Error(err)) => Err(ActionRunError::Failed {
            status: ActionStatusReport {
                code: ActionStatusCode::Failed,
                running_time: started.elapsed(),
            },
            source: err,
        }),
    }
}

fn is_retriable(err: &RuntimeError) -> bool {
    matches!(err, RuntimeError::LlmCallFailed { retriable: true, .. })
}

fn backoff_for_attempt(policy: &RetryPolicyConfig, attempt: u32) -> Duration {
    let millis = (policy.backoff_millis as f64) * policy.backoff_multiplier.powi(attempt as i32 - 1);
    let capped = millis.min(policy.backoff_max_interval_millis as f64).max(0.0);
    Duration::from_millis(capped as u64)
}

/// Run an action under a named retry policy. `action` is re-invoked fresh on
/// each attempt; only `RuntimeError`s the gateway marked retriable consume a
/// retry — `ToolNotFound`/`MaxIterationsExceeded`/validation failures surface
/// on the first attempt regardless of `max_attempts`. `AwaitableRequested`
/// and `ReplanRequested` bypass this function's retry loop entirely since
/// `run_action_once` returns them before a retry decision is ever made.
pub async fn run_action_with_retry<F, Fut, T>(
    blackboard: &mut Blackboard,
    policy: RetryPolicyConfig,
    mut action: F,
) -> Result<(ActionOutcome<T>, ActionStatusReport), ActionRunError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ToolLoopFailure>>,
{
    let mut attempt = 1;
    loop {
        match run_action_once(blackboard, || action()).await {
            Ok(outcome) => return Ok(outcome),
            Err(ActionRunError::Replan { reason }) => return Err(ActionRunError::Replan { reason }),
            Err(ActionRunError::Failed { status, source }) => {
                if attempt >= policy.max_attempts || !is_retriable(&source) {
                    return Err(ActionRunError::Failed { status, source });
                }
                tokio::time::sleep(backoff_for_attempt(&policy, attempt)).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::hitl::{Awaitable, ReplanRequested};

    #[tokio::test]
    async fn awaitable_binds_to_blackboard_and_yields_waiting() {
        let mut blackboard = Blackboard::new();
        let result: Result<(ActionOutcome<()>, ActionStatusReport), ActionRunError> =
            run_action_once(&mut blackboard, || async {
                Err(ToolLoopFailure::Signal(ToolLoopSignal::AwaitableRequested(Awaitable::new(
                    "aw-1",
                    "confirmation",
                    serde_json::json!({}),
                    "confirm?",
                ))))
            })
            .await;

        match result {
            Ok((ActionOutcome::Waiting { awaitable_id }, status)) => {
                assert_eq!(awaitable_id, "aw-1");
                assert_eq!(status.code, ActionStatusCode::Waiting);
            }
            _ => panic!("expected Waiting outcome"),
        }
        assert!(blackboard.contains::<Awaitable>());
    }

    #[tokio::test]
    async fn replan_updates_blackboard_and_is_not_failed() {
        let mut blackboard = Blackboard::new();
        let result: Result<(ActionOutcome<()>, ActionStatusReport), ActionRunError> =
            run_action_once(&mut blackboard, || async {
                Err(ToolLoopFailure::Signal(ToolLoopSignal::ReplanRequested(ReplanRequested::new(
                    "intent=refund",
                    Box::new(|bb: &mut Blackboard| bb.add_object("REFUND".to_string())),
                ))))
            })
            .await;

        match result {
            Err(ActionRunError::Replan { reason }) => assert_eq!(reason, "intent=refund"),
            _ => panic!("expected a Replan, not a Failed outcome"),
        }
        assert_eq!(*blackboard.last::<String>().unwrap(), "REFUND");
    }

    #[tokio::test]
    async fn retry_policy_retries_only_retriable_llm_failures() {
        let mut blackboard = Blackboard::new();
        let mut attempts = 0;
        let policy = RetryPolicyConfig {
            max_attempts: 3,
            backoff_millis: 1,
            backoff_multiplier: 1.0,
            backoff_max_interval_millis: 5,
            idempotent: false,
        };
        let result: Result<(ActionOutcome<i32>, ActionStatusReport), ActionRunError> =
            run_action_with_retry(&mut blackboard, policy, || {
                attempts += 1;
                let succeed_now = attempts >= 2;
                async move {
                    if succeed_now {
                        Ok(42)
                    } else {
                        Err(ToolLoopFailure::Error(RuntimeError::LlmCallFailed {
                            reason: "rate limited".to_string(),
                            retriable: true,
                        }))
                    }
                }
            })
            .await;

        assert_eq!(attempts, 2);
        match result {
            Ok((ActionOutcome::Succeeded(value), _)) => assert_eq!(value, 42),
            _ => panic!("expected eventual success"),
        }
    }

    #[tokio::test]
    async fn tool_not_found_surfaces_without_retry() {
        let mut blackboard = Blackboard::new();
        let mut attempts = 0;
        let policy = RetryPolicyConfig {
            max_attempts: 5,
            backoff_millis: 0,
            backoff_multiplier: 1.0,
            backoff_max_interval_millis: 0,
            idempotent: false,
        };
        let result: Result<(ActionOutcome<()>, ActionStatusReport), ActionRunError> =
            run_action_with_retry(&mut blackboard, policy, || {
                attempts += 1;
                async move {
                    Err(ToolLoopFailure::Error(RuntimeError::ToolNotFound {
                        name: "ghost".to_string(),
                        known: vec![],
                    }))
                }
            })
            .await;

        assert_eq!(attempts, 1);
        assert!(matches!(result, Err(ActionRunError::Failed { .. })));
    }
}
