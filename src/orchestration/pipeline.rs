//! # Dispatch Pipeline
//!
//! Top-level entry point tying the pieces together:
//!
//! ```text
//! setup(definition)          upsert once, idempotent
//! run(name, producer, n)     discovery ─▶ partition ─▶ start_sync_execution
//! start_sync_execution       definition lookup ─▶ Orchestrator::execute_named
//! run_report(name)           stored report of a finished run
//! ```
//!
//! Run names are unique among the runs the pipeline still holds. A finished
//! run keeps its name and report until [`DispatchPipeline::remove_run`]
//! evicts it; a run whose future is dropped mid-dispatch releases its name.
//! Discovery and partition errors are returned before anything is
//! dispatched; per-batch failures only ever show up in the report.
//!
//! Reserved concurrency belongs to the worker, not to a run: every run on a
//! pipeline shares one [`ReservedConcurrencyWorker`], so concurrent runs
//! together never exceed the reservation.

use crate::config::FanoutConfig;
use crate::discovery::{collect_work_items, DiscoveryProducer};
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::logging::log_run_operation;
use crate::orchestration::definition::{
    upsert_definition, DefinitionStore, ExecutionDefinition, InMemoryDefinitionStore, UpsertOutcome,
};
use crate::orchestration::dispatcher::Orchestrator;
use crate::orchestration::partitioner::partition;
use crate::orchestration::report::ExecutionReport;
use crate::orchestration::types::Batch;
use crate::worker::{BatchWorker, ReservedConcurrencyWorker};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, instrument};

/// Lifecycle of a named run
#[derive(Debug, Clone)]
pub enum RunRecord {
    Running,
    Finished(ExecutionReport),
}

pub struct DispatchPipeline {
    definition_name: String,
    store: Arc<dyn DefinitionStore>,
    worker: Arc<dyn BatchWorker>,
    reserved_worker: Mutex<Option<Arc<ReservedWorker>>>,
    runs: DashMap<String, RunRecord>,
}

type ReservedWorker = ReservedConcurrencyWorker<Arc<dyn BatchWorker>>;

impl std::fmt::Debug for DispatchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchPipeline")
            .field("definition_name", &self.definition_name)
            .field("worker", &self.worker.worker_name())
            .field("runs", &self.runs.len())
            .finish()
    }
}

impl DispatchPipeline {
    pub fn new(
        definition_name: impl Into<String>,
        store: Arc<dyn DefinitionStore>,
        worker: Arc<dyn BatchWorker>,
    ) -> Self {
        Self {
            definition_name: definition_name.into(),
            store,
            worker,
            reserved_worker: Mutex::new(None),
            runs: DashMap::new(),
        }
    }

    /// Pipeline backed by an in-memory definition store
    pub fn in_memory(definition_name: impl Into<String>, worker: Arc<dyn BatchWorker>) -> Self {
        Self::new(definition_name, Arc::new(InMemoryDefinitionStore::new()), worker)
    }

    /// Build a pipeline for `config` and upsert its definition
    pub async fn from_config(
        config: &FanoutConfig,
        worker: Arc<dyn BatchWorker>,
    ) -> OrchestrationResult<Self> {
        config.validate()?;
        let pipeline = Self::in_memory(&config.dispatch.definition_name, worker);
        pipeline.setup(config.execution_definition()?).await?;
        Ok(pipeline)
    }

    pub fn definition_name(&self) -> &str {
        &self.definition_name
    }

    /// Upsert the execution definition runs will use
    #[instrument(skip(self, definition), fields(definition = %definition.name))]
    pub async fn setup(
        &self,
        definition: ExecutionDefinition,
    ) -> OrchestrationResult<UpsertOutcome> {
        let outcome = upsert_definition(self.store.as_ref(), definition).await?;
        info!(outcome = ?outcome, "Execution definition ready");
        Ok(outcome)
    }

    /// Dispatch already partitioned batches as the run `run_name`
    #[instrument(skip(self, batches), fields(batch_count = batches.len()))]
    pub async fn start_sync_execution(
        &self,
        run_name: &str,
        batches: Vec<Batch>,
    ) -> OrchestrationResult<ExecutionReport> {
        let definition = self
            .store
            .get(&self.definition_name)
            .await?
            .map(|stored| stored.definition)
            .ok_or_else(|| OrchestrationError::DefinitionNotFound {
                name: self.definition_name.clone(),
            })?;

        let orchestrator = Orchestrator::new(definition.orchestrator_config())?;
        let reservation = self.reserve_run(run_name)?;
        let worker = self.dispatch_worker(definition.reserved_concurrency);

        log_run_operation(
            "run_started",
            run_name,
            "running",
            Some(
                format!(
                    "definition={} worker_function={}",
                    definition.name, definition.worker_function
                )
                .as_str(),
            ),
        );

        let report = orchestrator.execute_named(run_name, batches, worker).await;
        reservation.finish(report.clone());
        Ok(report)
    }

    /// Discover, partition and dispatch in one call
    #[instrument(skip(self, producer))]
    pub async fn run<P>(
        &self,
        run_name: &str,
        producer: &mut P,
        batch_count: usize,
    ) -> OrchestrationResult<ExecutionReport>
    where
        P: DiscoveryProducer + ?Sized,
    {
        if self.runs.contains_key(run_name) {
            return Err(OrchestrationError::DuplicateRunName {
                run_name: run_name.to_string(),
            });
        }

        let items = collect_work_items(producer).await?;
        let discovered = items.len();
        let batches = partition(items, batch_count)?;
        info!(
            run_name = %run_name,
            items = discovered,
            batches = batches.len(),
            "Workload discovered and partitioned"
        );

        self.start_sync_execution(run_name, batches).await
    }

    /// Report of a finished run
    pub fn run_report(&self, run_name: &str) -> Option<ExecutionReport> {
        match self.runs.get(run_name)?.value() {
            RunRecord::Finished(report) => Some(report.clone()),
            RunRecord::Running => None,
        }
    }

    /// Evict a finished run, freeing its name; running runs are left alone
    pub fn remove_run(&self, run_name: &str) -> Option<ExecutionReport> {
        self.runs
            .remove_if(run_name, |_, record| matches!(record, RunRecord::Finished(_)))
            .and_then(|(_, record)| match record {
                RunRecord::Finished(report) => Some(report),
                RunRecord::Running => None,
            })
    }

    pub fn run_record(&self, run_name: &str) -> Option<RunRecord> {
        self.runs.get(run_name).map(|record| record.value().clone())
    }

    pub fn run_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.runs.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Shared reserved-concurrency wrapper, rebuilt only when the limit changes
    fn dispatch_worker(&self, reserved_concurrency: Option<usize>) -> Arc<dyn BatchWorker> {
        let Some(reserved) = reserved_concurrency else {
            return Arc::clone(&self.worker);
        };

        let mut current = self.reserved_worker.lock();
        if let Some(existing) = current.as_ref() {
            if existing.reserved_concurrency() == reserved {
                return existing.clone();
            }
        }

        let wrapper = Arc::new(ReservedConcurrencyWorker::new(
            Arc::clone(&self.worker),
            reserved,
        ));
        *current = Some(Arc::clone(&wrapper));
        wrapper
    }

    fn reserve_run<'a>(
        &'a self,
        run_name: &'a str,
    ) -> OrchestrationResult<RunReservation<'a>> {
        match self.runs.entry(run_name.to_string()) {
            Entry::Occupied(_) => Err(OrchestrationError::DuplicateRunName {
                run_name: run_name.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(RunRecord::Running);
                Ok(RunReservation {
                    runs: &self.runs,
                    run_name,
                    finished: false,
                })
            }
        }
    }
}

/// Holds a run name while it dispatches; releases it if the run never finishes
struct RunReservation<'a> {
    runs: &'a DashMap<String, RunRecord>,
    run_name: &'a str,
    finished: bool,
}

impl RunReservation<'_> {
    fn finish(mut self, report: ExecutionReport) {
        self.runs
            .insert(self.run_name.to_string(), RunRecord::Finished(report));
        self.finished = true;
    }
}

impl Drop for RunReservation<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.runs
                .remove_if(self.run_name, |_, record| matches!(record, RunRecord::Running));
        }
    }
}
