//! # Failure Classification
//!
//! Decides what happens to a batch after a failed attempt:
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────────────────┐
//! │ WorkerError  │────▶│ RetryPolicy  │────▶│ Retryable (backoff)      │
//! │ + attempt    │     │ membership   │     │ NonRetryable (terminal)  │
//! └──────────────┘     │ + attempts   │     │ Exhausted (terminal)     │
//!                      └──────────────┘     └──────────────────────────┘
//! ```
//!
//! Kinds outside the retryable set fail immediately regardless of how many
//! attempts remain.

use crate::error::DispatchError;
use crate::orchestration::retry_policy::RetryPolicy;
use crate::worker::WorkerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Outcome category of a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Retry after the backoff delay
    Retryable,
    /// Kind not in the retryable set
    NonRetryable,
    /// Retryable kind but no attempts left
    Exhausted,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Retryable => write!(f, "Retryable"),
            ErrorCategory::NonRetryable => write!(f, "Non-retryable"),
            ErrorCategory::Exhausted => write!(f, "Exhausted"),
        }
    }
}

/// Result of classifying one failed attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorClassification {
    pub category: ErrorCategory,

    /// Delay before the next attempt, set only for retryable failures
    pub retry_delay: Option<Duration>,

    /// Error recorded as the batch's last error
    pub error: DispatchError,
}

impl ErrorClassification {
    pub fn is_retryable(&self) -> bool {
        self.category == ErrorCategory::Retryable
    }

    pub fn is_final_attempt(&self) -> bool {
        !self.is_retryable()
    }
}

/// Classify a failure of attempt `attempt` (1-based) under `policy`
pub fn classify_failure(
    policy: &RetryPolicy,
    error: &WorkerError,
    attempt: u32,
) -> ErrorClassification {
    if !policy.is_retryable(error.kind) {
        return ErrorClassification {
            category: ErrorCategory::NonRetryable,
            retry_delay: None,
            error: DispatchError::non_retryable(error, attempt),
        };
    }

    if attempt >= policy.max_attempts() {
        return ErrorClassification {
            category: ErrorCategory::Exhausted,
            retry_delay: None,
            error: DispatchError::exhausted(error, attempt),
        };
    }

    ErrorClassification {
        category: ErrorCategory::Retryable,
        retry_delay: Some(policy.delay_before_attempt(attempt + 1)),
        error: DispatchError::retryable(error, attempt),
    }
}
