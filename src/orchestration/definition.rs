//! # Execution Definitions
//!
//! A named, stored description of how runs are dispatched: concurrency cap,
//! retry policy and the worker function they call. Setup upserts the
//! definition once; every run looks it up by name.
//!
//! ## Usage
//!
//! ```rust
//! use fanout_core::orchestration::definition::{
//!     upsert_definition, ExecutionDefinition, InMemoryDefinitionStore, UpsertOutcome,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryDefinitionStore::new();
//! let definition = ExecutionDefinition::new("crawl");
//!
//! assert_eq!(upsert_definition(&store, definition.clone()).await?, UpsertOutcome::Created);
//! assert_eq!(upsert_definition(&store, definition).await?, UpsertOutcome::Updated);
//! # Ok(())
//! # }
//! ```

use crate::constants::{DEFAULT_CONCURRENCY_CAP, DEFAULT_WORKER_FUNCTION};
use crate::error::DefinitionUpsertError;
use crate::orchestration::dispatcher::OrchestratorConfig;
use crate::orchestration::retry_policy::RetryPolicy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Stored description of how runs are dispatched
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionDefinition {
    pub name: String,
    pub concurrency_cap: usize,
    pub retry_policy: RetryPolicy,
    /// Name of the worker function batches are sent to
    pub worker_function: String,
    /// Concurrency reserved on the worker side, if any
    pub reserved_concurrency: Option<usize>,
    /// Overall run deadline
    pub deadline: Option<Duration>,
}

impl ExecutionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            concurrency_cap: DEFAULT_CONCURRENCY_CAP,
            retry_policy: RetryPolicy::default(),
            worker_function: DEFAULT_WORKER_FUNCTION.to_string(),
            reserved_concurrency: None,
            deadline: None,
        }
    }

    pub fn with_concurrency_cap(mut self, concurrency_cap: usize) -> Self {
        self.concurrency_cap = concurrency_cap;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_worker_function(mut self, worker_function: impl Into<String>) -> Self {
        self.worker_function = worker_function.into();
        self
    }

    pub fn with_reserved_concurrency(mut self, reserved: Option<usize>) -> Self {
        self.reserved_concurrency = reserved;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn validate(&self) -> Result<(), DefinitionUpsertError> {
        let invalid = |reason: String| DefinitionUpsertError::InvalidDefinition {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".to_string()));
        }
        if self.worker_function.trim().is_empty() {
            return Err(invalid("worker_function must not be empty".to_string()));
        }
        if self.reserved_concurrency == Some(0) {
            return Err(invalid("reserved_concurrency must be at least 1".to_string()));
        }
        self.orchestrator_config()
            .validate()
            .map_err(|e| invalid(e.to_string()))
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            concurrency_cap: self.concurrency_cap,
            retry_policy: self.retry_policy.clone(),
            deadline: self.deadline,
        }
    }
}

/// Result of a create attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

/// Whether an upsert created the definition or replaced an existing one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Definition with bookkeeping timestamps
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDefinition {
    pub definition: ExecutionDefinition,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storage for execution definitions, keyed by name
#[async_trait]
pub trait DefinitionStore: Send + Sync {
    /// Store `definition` unless one with the same name exists
    async fn create(
        &self,
        definition: ExecutionDefinition,
    ) -> Result<CreateOutcome, DefinitionUpsertError>;

    /// Replace an existing definition
    async fn update(&self, definition: ExecutionDefinition) -> Result<(), DefinitionUpsertError>;

    async fn get(&self, name: &str) -> Result<Option<StoredDefinition>, DefinitionUpsertError>;
}

/// Process-local definition store
#[derive(Debug, Default)]
pub struct InMemoryDefinitionStore {
    definitions: DashMap<String, StoredDefinition>,
}

impl InMemoryDefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[async_trait]
impl DefinitionStore for InMemoryDefinitionStore {
    async fn create(
        &self,
        definition: ExecutionDefinition,
    ) -> Result<CreateOutcome, DefinitionUpsertError> {
        match self.definitions.entry(definition.name.clone()) {
            Entry::Occupied(_) => Ok(CreateOutcome::AlreadyExists),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                slot.insert(StoredDefinition {
                    definition,
                    created_at: now,
                    updated_at: now,
                });
                Ok(CreateOutcome::Created)
            }
        }
    }

    async fn update(&self, definition: ExecutionDefinition) -> Result<(), DefinitionUpsertError> {
        match self.definitions.get_mut(&definition.name) {
            Some(mut stored) => {
                stored.definition = definition;
                stored.updated_at = Utc::now();
                Ok(())
            }
            None => Err(DefinitionUpsertError::NotFound {
                name: definition.name,
            }),
        }
    }

    async fn get(&self, name: &str) -> Result<Option<StoredDefinition>, DefinitionUpsertError> {
        Ok(self.definitions.get(name).map(|stored| stored.clone()))
    }
}

/// Create `definition`, or update it in place if the name already exists
pub async fn upsert_definition(
    store: &dyn DefinitionStore,
    definition: ExecutionDefinition,
) -> Result<UpsertOutcome, DefinitionUpsertError> {
    definition.validate()?;
    let name = definition.name.clone();

    match store.create(definition.clone()).await? {
        CreateOutcome::Created => {
            info!(definition = %name, "Created execution definition");
            Ok(UpsertOutcome::Created)
        }
        CreateOutcome::AlreadyExists => {
            debug!(definition = %name, "Definition exists; updating in place");
            store.update(definition).await?;
            info!(definition = %name, "Updated execution definition");
            Ok(UpsertOutcome::Updated)
        }
    }
}
