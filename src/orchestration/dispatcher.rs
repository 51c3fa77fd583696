//! # Orchestrator
//!
//! ## Architecture: Bounded-Concurrency Retry Dispatch
//!
//! Every batch gets its own tokio task driving a [`BatchStateMachine`]. A
//! single semaphore sized to the concurrency cap is the only admission
//! control: a task holds a permit exactly while its batch is Running and
//! releases it before sleeping out a backoff delay, so fresh batches and
//! retries compete for the same slots in FIFO order.
//!
//! ```text
//! Pending ──admit──▶ Running ──output──▶ Succeeded
//!                     │   ▲
//!          retryable  │   │ admit (backoff elapsed)
//!                     ▼   │
//!                  RetryWaiting
//!                     │
//!  non-retryable or   └──────────────▶ Failed
//!  attempts exhausted
//! ```
//!
//! A failed batch never cancels its siblings. Outcomes are folded into a
//! shared [`ReportAccumulator`] as they happen; if the optional deadline
//! elapses the semaphore is closed, outstanding tasks are detached and the
//! accumulated state is returned with `timed_out` set.

use crate::config::ConfigurationError;
use crate::constants::DEFAULT_CONCURRENCY_CAP;
use crate::logging::{log_batch_operation, log_error, log_run_operation};
use crate::orchestration::report::{DispatchStats, ExecutionReport, ReportAccumulator};
use crate::orchestration::retry_policy::RetryPolicy;
use crate::orchestration::types::Batch;
use crate::state_machine::{BatchEvent, BatchState, BatchStateMachine, StateMachineError};
use crate::worker::{BatchWorker, ErrorKind, WorkerError};
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Settings for one orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Maximum number of batches Running at once
    pub concurrency_cap: usize,
    pub retry_policy: RetryPolicy,
    /// Stop waiting after this long and return a partial report
    pub deadline: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            concurrency_cap: DEFAULT_CONCURRENCY_CAP,
            retry_policy: RetryPolicy::default(),
            deadline: None,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.concurrency_cap == 0 {
            return Err(ConfigurationError::invalid_value(
                "dispatch.concurrency_cap",
                "0".to_string(),
                "must be at least 1",
            ));
        }
        self.retry_policy.validate()
    }
}

/// Bounded-concurrency retry dispatcher
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Dispatch `batches` under a generated run name
    pub async fn execute(
        &self,
        batches: Vec<Batch>,
        worker: Arc<dyn BatchWorker>,
    ) -> ExecutionReport {
        let run_name = format!("run-{}", Uuid::new_v4());
        self.execute_named(&run_name, batches, worker).await
    }

    /// Dispatch `batches` and wait until each is terminal or the deadline elapses
    #[instrument(skip(self, batches, worker), fields(batch_count = batches.len()))]
    pub async fn execute_named(
        &self,
        run_name: &str,
        batches: Vec<Batch>,
        worker: Arc<dyn BatchWorker>,
    ) -> ExecutionReport {
        let total = batches.len();
        let context = Arc::new(DispatchContext {
            run_name: run_name.to_string(),
            worker,
            policy: Arc::new(self.config.retry_policy.clone()),
            slots: Semaphore::new(self.config.concurrency_cap),
            concurrency_cap: self.config.concurrency_cap,
            running: AtomicUsize::new(0),
            peak_running: AtomicUsize::new(0),
            total_attempts: AtomicU64::new(0),
            accumulator: Mutex::new(ReportAccumulator::new(
                run_name,
                batches.iter().map(Batch::index),
            )),
        });

        if batches.is_empty() {
            info!(run_name = %run_name, "No batches to dispatch");
            return context.snapshot(false);
        }

        info!(
            run_name = %run_name,
            batch_count = total,
            concurrency_cap = self.config.concurrency_cap,
            max_attempts = self.config.retry_policy.max_attempts(),
            worker = context.worker.worker_name(),
            "Starting dispatch"
        );

        let mut tasks = JoinSet::new();
        for batch in batches {
            tasks.spawn(run_batch(Arc::clone(&context), batch));
        }

        let drained = match self.config.deadline {
            Some(deadline) => tokio::time::timeout(deadline, drain(&mut tasks, run_name))
                .await
                .is_ok(),
            None => {
                drain(&mut tasks, run_name).await;
                true
            }
        };

        if !drained {
            context.slots.close();
            tasks.detach_all();
            warn!(
                run_name = %run_name,
                deadline_ms = self.config.deadline.map(|d| d.as_millis() as u64),
                "Deadline elapsed before all batches finished; returning partial report"
            );
        }

        let timed_out = !drained && context.accumulator.lock().terminal_count() < total;
        let report = context.snapshot(timed_out);

        log_run_operation(
            "dispatch_finished",
            run_name,
            &report.status.to_string(),
            Some(
                format!(
                    "succeeded={} failed={} in_progress={} peak_running={} attempts={}",
                    report.succeeded_count(),
                    report.failed_count(),
                    report.in_progress_count(),
                    report.stats.peak_running,
                    report.stats.total_attempts
                )
                .as_str(),
            ),
        );

        report
    }
}

/// State shared by every batch task of one run
struct DispatchContext {
    run_name: String,
    worker: Arc<dyn BatchWorker>,
    policy: Arc<RetryPolicy>,
    slots: Semaphore,
    concurrency_cap: usize,
    running: AtomicUsize,
    peak_running: AtomicUsize,
    total_attempts: AtomicU64,
    accumulator: Mutex<ReportAccumulator>,
}

impl DispatchContext {
    fn record(&self, machine: &BatchStateMachine) {
        self.accumulator.lock().record(machine);
    }

    fn stats(&self) -> DispatchStats {
        DispatchStats {
            concurrency_cap: self.concurrency_cap,
            peak_running: self.peak_running.load(Ordering::SeqCst),
            total_attempts: self.total_attempts.load(Ordering::SeqCst),
        }
    }

    fn snapshot(&self, timed_out: bool) -> ExecutionReport {
        let stats = self.stats();
        self.accumulator.lock().snapshot(timed_out, stats)
    }

    fn enter_running(&self) -> RunningSlot<'_> {
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_running.fetch_max(running, Ordering::SeqCst);
        self.total_attempts.fetch_add(1, Ordering::SeqCst);
        RunningSlot { context: self }
    }

    /// One worker call, bounded by the attempt timeout; panics become failures
    async fn invoke(&self, batch: &Batch) -> Result<Value, WorkerError> {
        let call = AssertUnwindSafe(self.worker.invoke(batch)).catch_unwind();

        let outcome = match self.policy.attempt_timeout() {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return Err(WorkerError::timeout(format!(
                        "attempt exceeded {}ms",
                        limit.as_millis()
                    )))
                }
            },
            None => call.await,
        };

        outcome.unwrap_or_else(|panic| {
            Err(WorkerError::new(
                ErrorKind::GenericTaskFailure,
                format!("worker panicked: {}", panic_message(panic.as_ref())),
            ))
        })
    }
}

/// Decrements the running gauge when an attempt ends, even by unwinding
struct RunningSlot<'a> {
    context: &'a DispatchContext,
}

impl Drop for RunningSlot<'_> {
    fn drop(&mut self) {
        self.context.running.fetch_sub(1, Ordering::SeqCst);
    }
}

async fn drain(tasks: &mut JoinSet<()>, run_name: &str) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(join_error) = joined {
            log_error(
                "orchestrator",
                "join_batch_task",
                &join_error.to_string(),
                Some(run_name),
            );
        }
    }
}

/// Batch task body; a panic escaping the driver fails the batch
async fn run_batch(context: Arc<DispatchContext>, batch: Batch) {
    let index = batch.index();
    let driven = AssertUnwindSafe(drive_batch(Arc::clone(&context), batch))
        .catch_unwind()
        .await;

    if let Err(panic) = driven {
        let message = format!("batch task panicked: {}", panic_message(panic.as_ref()));
        log_error(
            "orchestrator",
            "drive_batch",
            &message,
            Some(context.run_name.as_str()),
        );
        context.accumulator.lock().record_abandoned(index, message);
    }
}

/// Drive one batch from Pending to a terminal state
async fn drive_batch(context: Arc<DispatchContext>, batch: Batch) {
    let index = batch.index();
    let mut machine = BatchStateMachine::new(index, Arc::clone(&context.policy));

    loop {
        let Ok(permit) = context.slots.acquire().await else {
            debug!(
                run_name = %context.run_name,
                batch_index = index,
                state = %machine.state(),
                "Dispatch closed before batch was admitted"
            );
            return;
        };

        match machine.transition(BatchEvent::Admit, Instant::now()) {
            Ok(_) => {}
            Err(StateMachineError::GuardFailed { reason }) => {
                drop(permit);
                debug!(
                    run_name = %context.run_name,
                    batch_index = index,
                    %reason,
                    "Admission deferred"
                );
                tokio::time::sleep(machine.backoff_remaining(Instant::now())).await;
                continue;
            }
            Err(err) => {
                log_error(
                    "orchestrator",
                    "admit_batch",
                    &err.to_string(),
                    Some(context.run_name.as_str()),
                );
                return;
            }
        }

        let running = context.enter_running();
        context.record(&machine);
        debug!(
            run_name = %context.run_name,
            batch_index = index,
            attempt = machine.attempts(),
            items = batch.len(),
            "Invoking worker"
        );

        let event = match context.invoke(&batch).await {
            Ok(output) => BatchEvent::Complete(output),
            Err(worker_error) => BatchEvent::Fail(worker_error),
        };

        let transition = machine.transition(event, Instant::now());
        context.record(&machine);
        drop(running);
        drop(permit);

        let state = match transition {
            Ok(state) => state,
            Err(err) => {
                log_error(
                    "orchestrator",
                    "complete_attempt",
                    &err.to_string(),
                    Some(context.run_name.as_str()),
                );
                return;
            }
        };

        match state {
            BatchState::RetryWaiting => {
                let delay = machine.backoff_remaining(Instant::now());
                warn!(
                    run_name = %context.run_name,
                    batch_index = index,
                    attempt = machine.attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = ?machine.last_error(),
                    "Attempt failed; retrying after backoff"
                );
                tokio::time::sleep(delay).await;
            }
            BatchState::Succeeded | BatchState::Failed => {
                log_batch_operation(
                    "batch_finished",
                    &context.run_name,
                    index,
                    machine.attempts(),
                    &state.to_string(),
                    machine.last_error().map(|e| e.to_string()).as_deref(),
                );
                return;
            }
            BatchState::Pending | BatchState::Running => {
                error!(
                    run_name = %context.run_name,
                    batch_index = index,
                    state = %state,
                    "Attempt ended in a non-settled state"
                );
                return;
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
