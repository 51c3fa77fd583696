//! # Orchestration Engine
//!
//! Bounded-concurrency batch dispatch with per-batch retry and partial-failure
//! reporting.
//!
//! ## Core Components
//!
//! - **Partitioner**: splits the discovered workload into balanced batches
//! - **RetryPolicy / BackoffCalculator**: attempt limit and exponential backoff
//! - **ErrorClassifier**: retryable, non-retryable or exhausted after a failure
//! - **Orchestrator**: one task per batch, admitted through a shared slot semaphore
//! - **ExecutionReport**: per-batch outcomes and the overall run status
//! - **Definitions**: idempotently upserted, named dispatch settings
//! - **DispatchPipeline**: discovery, partitioning and dispatch behind named runs

pub mod backoff_calculator;
pub mod definition;
pub mod dispatcher;
pub mod error_classifier;
pub mod partitioner;
pub mod pipeline;
pub mod report;
pub mod retry_policy;
pub mod types;

pub use backoff_calculator::BackoffCalculator;
pub use definition::{
    upsert_definition, CreateOutcome, DefinitionStore, ExecutionDefinition, InMemoryDefinitionStore,
    StoredDefinition, UpsertOutcome,
};
pub use dispatcher::{Orchestrator, OrchestratorConfig};
pub use error_classifier::{classify_failure, ErrorCategory, ErrorClassification};
pub use partitioner::{batch_sizes, partition};
pub use pipeline::{DispatchPipeline, RunRecord};
pub use report::{BatchOutcome, DispatchStats, ExecutionReport, OverallStatus, ReportAccumulator};
pub use retry_policy::RetryPolicy;
pub use types::{Batch, BatchPayload, WorkItem};
