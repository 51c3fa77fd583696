#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Fanout Core Rust
//!
//! Batch fan-out orchestrator: discover a linear workload, split it into
//! balanced batches, dispatch every batch to a stateless worker under a
//! global concurrency cap with exponential-backoff retries, and aggregate
//! the per-batch outcomes into one execution report.
//!
//! ## Architecture
//!
//! ```text
//! DiscoveryProducer ─▶ partition ─▶ Orchestrator ─┬─▶ BatchWorker (batch 0)
//!                                     (cap = C)    ├─▶ BatchWorker (batch 1)
//!                                                  └─▶ ...
//!                                                        │
//!                                   ExecutionReport ◀────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`discovery`] - Work item producers (fixed sequences, link following)
//! - [`orchestration`] - Partitioning, retry policy, dispatcher, report, pipeline
//! - [`state_machine`] - Per-batch execution state machine
//! - [`worker`] - Worker capability trait and adapters
//! - [`config`] - Layered configuration
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup and helpers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fanout_core::discovery::SequenceDiscovery;
//! use fanout_core::orchestration::{Batch, DispatchPipeline, ExecutionDefinition};
//! use fanout_core::worker::FnWorker;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let worker = Arc::new(FnWorker::new("count", |batch: Batch| async move {
//!     Ok(json!({ "pages": batch.len() }))
//! }));
//!
//! let pipeline = DispatchPipeline::in_memory("books", worker);
//! pipeline.setup(ExecutionDefinition::new("books")).await?;
//!
//! let mut producer = SequenceDiscovery::new(["http://books.example.com/"]);
//! let report = pipeline.run("url_10", &mut producer, 10).await?;
//! println!("{} of {} batches succeeded", report.succeeded_count(), report.batch_count());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod orchestration;
pub mod state_machine;
pub mod worker;

pub use config::{ConfigManager, ConfigurationError, FanoutConfig};
pub use discovery::{DiscoveryProducer, LinkFollowingDiscovery, SequenceDiscovery};
pub use error::{
    DefinitionUpsertError, DiscoveryError, DispatchError, OrchestrationError, OrchestrationResult,
    PartitionError,
};
pub use orchestration::{
    partition, Batch, BatchOutcome, DispatchPipeline, ExecutionReport, Orchestrator,
    OrchestratorConfig, OverallStatus, RetryPolicy, WorkItem,
};
pub use worker::{BatchWorker, ErrorKind, FnWorker, WorkerError};
