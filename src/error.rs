//! # Errors
//!
//! Fatal errors stop a run before dispatch and are returned to the caller.
//! Per-batch failures are [`DispatchError`] values recorded in the
//! execution report instead of being propagated.

use crate::config::ConfigurationError;
use crate::worker::{ErrorKind, WorkerError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Discovery source unreachable or malformed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("Invalid seed location '{location}': {reason}")]
    InvalidSeed { location: String, reason: String },

    #[error("Discovery source unreachable at '{location}': {reason}")]
    Unreachable { location: String, reason: String },

    #[error("Malformed page at '{location}': {reason}")]
    Malformed { location: String, reason: String },

    #[error("Next link from '{from}' revisits '{location}'")]
    CycleDetected { from: String, location: String },

    #[error("Discovery exceeded the limit of {max_pages} pages")]
    PageLimitExceeded { max_pages: usize },
}

/// Invalid partitioning request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PartitionError {
    #[error("Batch count must be at least 1, got {batch_count}")]
    InvalidBatchCount { batch_count: usize },
}

/// Setup-time failure while storing the execution definition
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionUpsertError {
    #[error("Invalid execution definition '{name}': {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("Execution definition '{name}' disappeared between create and update")]
    NotFound { name: String },

    #[error("Definition store failure for '{name}': {reason}")]
    Store { name: String, reason: String },
}

/// Terminal or transient failure of one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DispatchError {
    /// Failure whose kind is in the retryable set
    #[error("Retryable {kind} on attempt {attempt}: {message}")]
    Retryable {
        kind: ErrorKind,
        message: String,
        attempt: u32,
    },

    /// Failure whose kind is outside the retryable set
    #[error("Non-retryable {kind} on attempt {attempt}: {message}")]
    NonRetryable {
        kind: ErrorKind,
        message: String,
        attempt: u32,
    },

    /// Attempts ran out while the failure was still retryable
    #[error("Retries exhausted after {attempts} attempts, last error {kind}: {message}")]
    RetryExhausted {
        kind: ErrorKind,
        message: String,
        attempts: u32,
    },
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Retryable { kind, .. }
            | Self::NonRetryable { kind, .. }
            | Self::RetryExhausted { kind, .. } => *kind,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Retryable { message, .. }
            | Self::NonRetryable { message, .. }
            | Self::RetryExhausted { message, .. } => message,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }

    pub fn retryable(error: &WorkerError, attempt: u32) -> Self {
        Self::Retryable {
            kind: error.kind,
            message: error.message.clone(),
            attempt,
        }
    }

    pub fn non_retryable(error: &WorkerError, attempt: u32) -> Self {
        Self::NonRetryable {
            kind: error.kind,
            message: error.message.clone(),
            attempt,
        }
    }

    pub fn exhausted(error: &WorkerError, attempts: u32) -> Self {
        Self::RetryExhausted {
            kind: error.kind,
            message: error.message.clone(),
            attempts,
        }
    }
}

/// Top-level error for setup and run entry points
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Partition(#[from] PartitionError),

    #[error(transparent)]
    DefinitionUpsert(#[from] DefinitionUpsertError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("Execution definition '{name}' not found; run setup first")]
    DefinitionNotFound { name: String },

    #[error("A run named '{run_name}' already exists")]
    DuplicateRunName { run_name: String },
}

pub type OrchestrationResult<T> = std::result::Result<T, OrchestrationError>;
