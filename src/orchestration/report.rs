//! # Execution Report
//!
//! Per-batch outcomes plus the overall run status. The accumulator is updated
//! as batches change state, so a report can be snapshotted at any point,
//! including when the run deadline cuts dispatch short.

use crate::error::DispatchError;
use crate::state_machine::{BatchState, BatchStateMachine};
use crate::worker::ErrorKind;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of one batch at report time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Succeeded {
        output: Value,
        attempts_used: u32,
    },
    Failed {
        error: DispatchError,
        attempts_used: u32,
    },
    /// Not terminal when the report was taken
    InProgress {
        state: BatchState,
        attempts_used: u32,
        last_error: Option<DispatchError>,
    },
}

impl BatchOutcome {
    pub fn attempts_used(&self) -> u32 {
        match self {
            Self::Succeeded { attempts_used, .. }
            | Self::Failed { attempts_used, .. }
            | Self::InProgress { attempts_used, .. } => *attempts_used,
        }
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::InProgress { .. })
    }

    pub fn output(&self) -> Option<&Value> {
        match self {
            Self::Succeeded { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&DispatchError> {
        match self {
            Self::Failed { error, .. } => Some(error),
            Self::InProgress { last_error, .. } => last_error.as_ref(),
            Self::Succeeded { .. } => None,
        }
    }

    fn from_machine(machine: &BatchStateMachine) -> Self {
        match (machine.state(), machine.output(), machine.last_error()) {
            (BatchState::Succeeded, Some(output), _) => Self::Succeeded {
                output: output.clone(),
                attempts_used: machine.attempts(),
            },
            (BatchState::Failed, _, Some(error)) => Self::Failed {
                error: error.clone(),
                attempts_used: machine.attempts(),
            },
            (state, _, last_error) => Self::InProgress {
                state,
                attempts_used: machine.attempts(),
                last_error: last_error.cloned(),
            },
        }
    }
}

/// Status of the run as a whole
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    /// Every batch succeeded (trivially true for an empty run)
    Succeeded,
    /// At least one batch succeeded and at least one did not
    PartiallyFailed,
    /// No batch succeeded
    Failed,
}

impl OverallStatus {
    /// Derive the run status from `(succeeded, total)` batch counts
    pub fn from_counts(succeeded: usize, total: usize) -> Self {
        if succeeded == total {
            Self::Succeeded
        } else if succeeded > 0 {
            Self::PartiallyFailed
        } else {
            Self::Failed
        }
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::PartiallyFailed => write!(f, "partially_failed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Dispatch counters gathered during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub concurrency_cap: usize,
    /// Highest number of simultaneously Running batches observed
    pub peak_running: usize,
    /// Worker invocations across all batches, retries included
    pub total_attempts: u64,
}

/// Aggregated result of one run
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub run_name: String,
    pub status: OverallStatus,
    pub batches: BTreeMap<usize, BatchOutcome>,
    /// Set when the deadline elapsed before every batch was terminal
    pub timed_out: bool,
    pub stats: DispatchStats,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionReport {
    pub fn batch(&self, index: usize) -> Option<&BatchOutcome> {
        self.batches.get(&index)
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    pub fn succeeded_count(&self) -> usize {
        self.batches.values().filter(|o| o.is_succeeded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.batches.values().filter(|o| o.is_failed()).count()
    }

    pub fn in_progress_count(&self) -> usize {
        self.batches.values().filter(|o| o.is_in_progress()).count()
    }

    /// Indices of batches that did not succeed
    pub fn unsuccessful_batches(&self) -> Vec<usize> {
        self.batches
            .iter()
            .filter(|(_, outcome)| !outcome.is_succeeded())
            .map(|(index, _)| *index)
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.status == OverallStatus::Succeeded
    }
}

/// Shared, incrementally updated view of every batch in a run
#[derive(Debug)]
pub struct ReportAccumulator {
    run_name: String,
    started_at: DateTime<Utc>,
    outcomes: BTreeMap<usize, BatchOutcome>,
}

impl ReportAccumulator {
    pub fn new(
        run_name: impl Into<String>,
        batch_indices: impl IntoIterator<Item = usize>,
    ) -> Self {
        let outcomes = batch_indices
            .into_iter()
            .map(|index| {
                (
                    index,
                    BatchOutcome::InProgress {
                        state: BatchState::Pending,
                        attempts_used: 0,
                        last_error: None,
                    },
                )
            })
            .collect();

        Self {
            run_name: run_name.into(),
            started_at: Utc::now(),
            outcomes,
        }
    }

    /// Record the current state of a batch
    pub fn record(&mut self, machine: &BatchStateMachine) {
        self.outcomes
            .insert(machine.batch_index(), BatchOutcome::from_machine(machine));
    }

    /// Fail a batch whose task ended without reaching a terminal state
    pub fn record_abandoned(&mut self, batch_index: usize, message: impl Into<String>) {
        let Some(outcome) = self.outcomes.get_mut(&batch_index) else {
            return;
        };
        if !outcome.is_in_progress() {
            return;
        }

        let attempts_used = outcome.attempts_used();
        *outcome = BatchOutcome::Failed {
            error: DispatchError::NonRetryable {
                kind: ErrorKind::GenericTaskFailure,
                message: message.into(),
                attempt: attempts_used,
            },
            attempts_used,
        };
    }

    pub fn terminal_count(&self) -> usize {
        self.outcomes
            .values()
            .filter(|o| !o.is_in_progress())
            .count()
    }

    pub fn snapshot(&self, timed_out: bool, stats: DispatchStats) -> ExecutionReport {
        let total = self.outcomes.len();
        let succeeded = self.outcomes.values().filter(|o| o.is_succeeded()).count();

        ExecutionReport {
            run_name: self.run_name.clone(),
            status: OverallStatus::from_counts(succeeded, total),
            batches: self.outcomes.clone(),
            timed_out,
            stats,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestration::retry_policy::RetryPolicy;
    use crate::state_machine::BatchEvent;
    use crate::worker::{ErrorKind, WorkerError};
    use serde_json::json;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn finished(index: usize, succeed: bool) -> BatchStateMachine {
        let mut sm = BatchStateMachine::new(index, Arc::new(RetryPolicy::default()));
        let now = Instant::now();
        sm.transition(BatchEvent::Admit, now).unwrap();
        let event = if succeed {
            BatchEvent::Complete(json!({ "batch": index }))
        } else {
            BatchEvent::Fail(WorkerError::new(ErrorKind::InvalidPayload, "bad"))
        };
        sm.transition(event, now).unwrap();
        sm
    }

    #[test]
    fn test_overall_status_from_counts() {
        assert_eq!(OverallStatus::from_counts(0, 0), OverallStatus::Succeeded);
        assert_eq!(OverallStatus::from_counts(3, 3), OverallStatus::Succeeded);
        assert_eq!(OverallStatus::from_counts(1, 3), OverallStatus::PartiallyFailed);
        assert_eq!(OverallStatus::from_counts(0, 3), OverallStatus::Failed);
    }

    #[test]
    fn test_mixed_outcomes_are_partially_failed() {
        let mut accumulator = ReportAccumulator::new("run-1", 0..3);
        accumulator.record(&finished(0, true));
        accumulator.record(&finished(1, false));
        accumulator.record(&finished(2, true));

        let report = accumulator.snapshot(false, DispatchStats::default());

        assert_eq!(report.status, OverallStatus::PartiallyFailed);
        assert_eq!(report.succeeded_count(), 2);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.unsuccessful_batches(), vec![1]);
        assert_eq!(report.batch(0).unwrap().output(), Some(&json!({ "batch": 0 })));
        assert_eq!(
            report.batch(1).unwrap().error().map(DispatchError::kind),
            Some(ErrorKind::InvalidPayload)
        );
    }

    #[test]
    fn test_unrecorded_batches_stay_in_progress() {
        let mut accumulator = ReportAccumulator::new("run-2", 0..2);
        accumulator.record(&finished(0, true));

        let report = accumulator.snapshot(true, DispatchStats::default());

        assert!(report.timed_out);
        assert_eq!(report.in_progress_count(), 1);
        assert_eq!(report.status, OverallStatus::PartiallyFailed);
        assert_eq!(accumulator.terminal_count(), 1);
    }

    #[test]
    fn test_abandoned_batch_is_failed_not_left_running() {
        let mut accumulator = ReportAccumulator::new("run-4", 0..2);
        let mut running = BatchStateMachine::new(1, Arc::new(RetryPolicy::default()));
        running.transition(BatchEvent::Admit, Instant::now()).unwrap();
        accumulator.record(&finished(0, true));
        accumulator.record(&running);

        accumulator.record_abandoned(1, "batch task panicked: overflow");
        accumulator.record_abandoned(0, "ignored for settled batches");

        let report = accumulator.snapshot(false, DispatchStats::default());
        assert!(report.batch(0).unwrap().is_succeeded());
        match report.batch(1).unwrap() {
            BatchOutcome::Failed {
                error,
                attempts_used,
            } => {
                assert_eq!(*attempts_used, 1);
                assert_eq!(error.kind(), ErrorKind::GenericTaskFailure);
                assert!(!error.is_retryable());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(accumulator.terminal_count(), 2);
    }

    #[test]
    fn test_report_serializes_outcome_tags() {
        let mut accumulator = ReportAccumulator::new("run-3", 0..1);
        accumulator.record(&finished(0, false));

        let report = accumulator.snapshot(false, DispatchStats::default());
        let value = serde_json::to_value(report).unwrap();

        assert_eq!(value["status"], "failed");
        assert_eq!(value["batches"]["0"]["status"], "failed");
        assert_eq!(value["batches"]["0"]["error"]["type"], "non_retryable");
    }
}
