use super::{
    errors::{guard_failed, StateMachineError, StateMachineResult},
    events::BatchEvent,
    states::BatchState,
};
use crate::error::DispatchError;
use crate::orchestration::error_classifier::classify_failure;
use crate::orchestration::retry_policy::RetryPolicy;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Stand-in for a backoff deadline too far out to represent as an `Instant`
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// One recorded state change
#[derive(Debug, Clone, Serialize)]
pub struct StateTransition {
    pub from: BatchState,
    pub to: BatchState,
    pub event: &'static str,
    pub attempt: u32,
    pub at: DateTime<Utc>,
}

/// Execution state of a single batch
///
/// Owns the transition table, the attempt counter and the backoff deadline.
/// The orchestrator feeds it events; it never performs I/O itself.
#[derive(Debug, Clone)]
pub struct BatchStateMachine {
    batch_index: usize,
    policy: Arc<RetryPolicy>,
    state: BatchState,
    attempts: u32,
    last_error: Option<DispatchError>,
    output: Option<Value>,
    retry_at: Option<Instant>,
    history: Vec<StateTransition>,
}

impl BatchStateMachine {
    pub fn new(batch_index: usize, policy: Arc<RetryPolicy>) -> Self {
        Self {
            batch_index,
            policy,
            state: BatchState::Pending,
            attempts: 0,
            last_error: None,
            output: None,
            retry_at: None,
            history: Vec::new(),
        }
    }

    /// Apply `event` at time `now` and return the new state
    pub fn transition(
        &mut self,
        event: BatchEvent,
        now: Instant,
    ) -> StateMachineResult<BatchState> {
        let from = self.state;
        let event_type = event.event_type();

        let to = match (from, event) {
            (BatchState::Pending, BatchEvent::Admit) => {
                self.attempts += 1;
                BatchState::Running
            }
            (BatchState::RetryWaiting, BatchEvent::Admit) => {
                if let Some(retry_at) = self.retry_at {
                    if now < retry_at {
                        return Err(guard_failed(format!(
                            "batch {} admitted {:?} before its backoff elapsed",
                            self.batch_index,
                            retry_at - now
                        )));
                    }
                }
                self.retry_at = None;
                self.attempts += 1;
                BatchState::Running
            }
            (BatchState::Running, BatchEvent::Complete(output)) => {
                self.output = Some(output);
                BatchState::Succeeded
            }
            (BatchState::Running, BatchEvent::Fail(error)) => {
                let classification = classify_failure(&self.policy, &error, self.attempts);
                self.last_error = Some(classification.error);
                match classification.retry_delay {
                    Some(delay) => {
                        self.retry_at = Some(retry_deadline(now, delay));
                        BatchState::RetryWaiting
                    }
                    None => BatchState::Failed,
                }
            }
            (from_state, event) => {
                return Err(StateMachineError::InvalidTransition {
                    from: from_state.to_string(),
                    event: event.event_type().to_string(),
                })
            }
        };

        self.state = to;
        self.history.push(StateTransition {
            from,
            to,
            event: event_type,
            attempt: self.attempts,
            at: Utc::now(),
        });

        Ok(to)
    }

    pub fn batch_index(&self) -> usize {
        self.batch_index
    }

    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Attempts started so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<&DispatchError> {
        self.last_error.as_ref()
    }

    pub fn output(&self) -> Option<&Value> {
        self.output.as_ref()
    }

    pub fn history(&self) -> &[StateTransition] {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Time left before a RetryWaiting batch may be admitted again
    pub fn backoff_remaining(&self, now: Instant) -> Duration {
        self.retry_at
            .map(|retry_at| retry_at.saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    pub fn has_entered(&self, state: BatchState) -> bool {
        self.history.iter().any(|t| t.to == state)
    }
}

fn retry_deadline(now: Instant, delay: Duration) -> Instant {
    now.checked_add(delay)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}
