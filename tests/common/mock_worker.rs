use async_trait::async_trait;
use fanout_core::orchestration::Batch;
use fanout_core::worker::{BatchWorker, ErrorKind, WorkerError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// What one scripted invocation does
#[derive(Debug, Clone)]
pub enum Step {
    Succeed(Value),
    Fail(ErrorKind),
}

/// One recorded worker call
#[derive(Debug, Clone)]
pub struct Invocation {
    pub batch_index: usize,
    pub started_at: Instant,
}

/// Worker whose per-batch results are scripted up front
///
/// Each batch consumes its own queue of steps; once the queue is empty the
/// default step repeats. Tracks concurrent invocations and call instants.
pub struct ScriptedWorker {
    scripts: Mutex<HashMap<usize, VecDeque<Step>>>,
    default_step: Step,
    latencies: Vec<Duration>,
    invocations: Mutex<Vec<Invocation>>,
    running: AtomicUsize,
    peak_running: AtomicUsize,
}

impl ScriptedWorker {
    /// Worker that succeeds every call, echoing the batch index
    pub fn succeeding() -> Self {
        Self::with_default(Step::Succeed(Value::Null))
    }

    /// Worker that fails every call with `kind`
    pub fn failing(kind: ErrorKind) -> Self {
        Self::with_default(Step::Fail(kind))
    }

    pub fn with_default(default_step: Step) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            default_step,
            latencies: Vec::new(),
            invocations: Mutex::new(Vec::new()),
            running: AtomicUsize::new(0),
            peak_running: AtomicUsize::new(0),
        }
    }

    /// Steps consumed by batch `index` before the default applies
    pub fn script(self, index: usize, steps: impl IntoIterator<Item = Step>) -> Self {
        self.scripts.lock().insert(index, steps.into_iter().collect());
        self
    }

    /// Same latency for every call
    pub fn latency(self, latency: Duration) -> Self {
        self.latencies(vec![latency])
    }

    /// Latency of batch `i` is `latencies[i % len]`
    pub fn latencies(mut self, latencies: Vec<Duration>) -> Self {
        self.latencies = latencies;
        self
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().len()
    }

    pub fn invocations_for(&self, batch_index: usize) -> Vec<Instant> {
        self.invocations
            .lock()
            .iter()
            .filter(|i| i.batch_index == batch_index)
            .map(|i| i.started_at)
            .collect()
    }

    /// Gaps between consecutive call starts for one batch
    pub fn gaps_for(&self, batch_index: usize) -> Vec<Duration> {
        self.invocations_for(batch_index)
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }

    pub fn peak_running(&self) -> usize {
        self.peak_running.load(Ordering::SeqCst)
    }

    fn latency_for(&self, index: usize) -> Duration {
        if self.latencies.is_empty() {
            Duration::ZERO
        } else {
            self.latencies[index % self.latencies.len()]
        }
    }

    fn next_step(&self, index: usize) -> Step {
        self.scripts
            .lock()
            .get_mut(&index)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default_step.clone())
    }
}

#[async_trait]
impl BatchWorker for ScriptedWorker {
    async fn invoke(&self, batch: &Batch) -> Result<Value, WorkerError> {
        let index = batch.index();
        self.invocations.lock().push(Invocation {
            batch_index: index,
            started_at: Instant::now(),
        });

        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_running.fetch_max(running, Ordering::SeqCst);

        let latency = self.latency_for(index);
        if latency.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(latency).await;
        }

        let step = self.next_step(index);
        self.running.fetch_sub(1, Ordering::SeqCst);

        match step {
            Step::Succeed(Value::Null) => Ok(json!({ "batch": index, "items": batch.len() })),
            Step::Succeed(output) => Ok(output),
            Step::Fail(kind) => Err(WorkerError::new(
                kind,
                format!("scripted {kind} for batch {index}"),
            )),
        }
    }

    fn worker_name(&self) -> &str {
        "scripted_worker"
    }
}
