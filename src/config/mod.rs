//! # Fanout Configuration
//!
//! Layered, validated configuration for discovery, dispatch, retry and the
//! worker definition.
//!
//! ## Layers (later wins)
//!
//! 1. Built-in defaults ([`FanoutConfig::default`])
//! 2. `config/fanout.toml`
//! 3. `config/fanout.<environment>.toml`
//! 4. `FANOUT__<SECTION>__<KEY>` environment variables
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fanout_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//! let cap = manager.config().dispatch.concurrency_cap;
//! let policy = manager.config().retry_policy()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::constants::{
    retry, DEFAULT_BATCH_COUNT, DEFAULT_CONCURRENCY_CAP, DEFAULT_DEFINITION_NAME, DEFAULT_MAX_PAGES,
    DEFAULT_SEED_LOCATION, DEFAULT_WORKER_FUNCTION,
};
use crate::orchestration::definition::ExecutionDefinition;
use crate::orchestration::dispatcher::OrchestratorConfig;
use crate::orchestration::retry_policy::RetryPolicy;
use crate::worker::ErrorKind;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Root configuration
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FanoutConfig {
    pub discovery: DiscoveryConfig,
    pub dispatch: DispatchConfig,
    pub retry: RetryConfig,
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Absolute URL discovery starts from
    pub seed_location: String,
    /// Pages followed before discovery gives up
    pub max_pages: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            seed_location: DEFAULT_SEED_LOCATION.to_string(),
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Stable name of the execution definition
    pub definition_name: String,
    pub concurrency_cap: usize,
    pub batch_count: usize,
    /// Overall run deadline; unset waits for every batch
    pub deadline_ms: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            definition_name: DEFAULT_DEFINITION_NAME.to_string(),
            concurrency_cap: DEFAULT_CONCURRENCY_CAP,
            batch_count: DEFAULT_BATCH_COUNT,
            deadline_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_interval_ms: u64,
    pub backoff_rate: f64,
    pub max_attempts: u32,
    pub retryable_errors: Vec<ErrorKind>,
    pub attempt_timeout_ms: Option<u64>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_interval_ms: retry::BASE_INTERVAL.as_millis() as u64,
            backoff_rate: retry::BACKOFF_RATE,
            max_attempts: retry::MAX_ATTEMPTS,
            retryable_errors: retry::RETRYABLE_ERRORS.to_vec(),
            attempt_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Worker function batches are sent to
    pub function_name: String,
    /// Worker-side concurrency limit; unset means unlimited
    pub reserved_concurrency: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            function_name: DEFAULT_WORKER_FUNCTION.to_string(),
            reserved_concurrency: None,
        }
    }
}

impl FanoutConfig {
    /// Reject values the orchestrator cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.discovery.seed_location.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "discovery.seed_location",
                "",
                "must not be empty",
            ));
        }
        Url::parse(&self.discovery.seed_location).map_err(|e| {
            ConfigurationError::invalid_value(
                "discovery.seed_location",
                self.discovery.seed_location.clone(),
                format!("must be an absolute URL ({e})"),
            )
        })?;
        if self.discovery.max_pages == 0 {
            return Err(ConfigurationError::invalid_value(
                "discovery.max_pages",
                "0",
                "must be at least 1",
            ));
        }

        if self.dispatch.definition_name.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "dispatch.definition_name",
                "",
                "must not be empty",
            ));
        }
        if self.dispatch.batch_count == 0 {
            return Err(ConfigurationError::invalid_value(
                "dispatch.batch_count",
                "0",
                "must be at least 1",
            ));
        }
        if self.dispatch.deadline_ms == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "dispatch.deadline_ms",
                "0",
                "must be positive when set",
            ));
        }

        if self.worker.function_name.trim().is_empty() {
            return Err(ConfigurationError::invalid_value(
                "worker.function_name",
                "",
                "must not be empty",
            ));
        }
        if self.worker.reserved_concurrency == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "worker.reserved_concurrency",
                "0",
                "must be at least 1 when set",
            ));
        }

        self.orchestrator_config()?.validate()
    }

    pub fn retry_policy(&self) -> ConfigResult<RetryPolicy> {
        let policy = RetryPolicy::new(
            Duration::from_millis(self.retry.base_interval_ms),
            self.retry.backoff_rate,
            self.retry.max_attempts,
        )?
        .with_retryable_errors(self.retry.retryable_errors.iter().copied())
        .with_attempt_timeout(self.retry.attempt_timeout_ms.map(Duration::from_millis));
        policy.validate()?;
        Ok(policy)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.dispatch.deadline_ms.map(Duration::from_millis)
    }

    pub fn orchestrator_config(&self) -> ConfigResult<OrchestratorConfig> {
        Ok(OrchestratorConfig {
            concurrency_cap: self.dispatch.concurrency_cap,
            retry_policy: self.retry_policy()?,
            deadline: self.deadline(),
        })
    }

    /// Definition upserted at setup
    pub fn execution_definition(&self) -> ConfigResult<ExecutionDefinition> {
        Ok(ExecutionDefinition::new(&self.dispatch.definition_name)
            .with_concurrency_cap(self.dispatch.concurrency_cap)
            .with_retry_policy(self.retry_policy()?)
            .with_worker_function(&self.worker.function_name)
            .with_reserved_concurrency(self.worker.reserved_concurrency)
            .with_deadline(self.deadline()))
    }
}
