//! # Retry Policy
//!
//! Attempt limit, backoff parameters and the set of retryable error kinds
//! applied to every batch of a run.

use crate::config::ConfigurationError;
use crate::constants::retry;
use crate::orchestration::backoff_calculator::BackoffCalculator;
use crate::worker::ErrorKind;
use std::collections::BTreeSet;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    base_interval: Duration,
    backoff_rate: f64,
    max_attempts: u32,
    retryable_errors: BTreeSet<ErrorKind>,
    attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_interval: retry::BASE_INTERVAL,
            backoff_rate: retry::BACKOFF_RATE,
            max_attempts: retry::MAX_ATTEMPTS,
            retryable_errors: retry::RETRYABLE_ERRORS.into_iter().collect(),
            attempt_timeout: None,
        }
    }
}

impl RetryPolicy {
    /// Build a policy with the default retryable set
    pub fn new(
        base_interval: Duration,
        backoff_rate: f64,
        max_attempts: u32,
    ) -> Result<Self, ConfigurationError> {
        let policy = Self {
            base_interval,
            backoff_rate,
            max_attempts,
            ..Self::default()
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Replace the retryable set
    pub fn with_retryable_errors(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retryable_errors = kinds.into_iter().collect();
        self
    }

    /// Bound each worker invocation; elapsed attempts fail with `Timeout`
    pub fn with_attempt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_attempts < 1 {
            return Err(ConfigurationError::invalid_value(
                "retry.max_attempts",
                self.max_attempts.to_string(),
                "must be at least 1",
            ));
        }
        if !self.backoff_rate.is_finite() || self.backoff_rate < 1.0 {
            return Err(ConfigurationError::invalid_value(
                "retry.backoff_rate",
                self.backoff_rate.to_string(),
                "must be a finite number >= 1.0",
            ));
        }
        if self.attempt_timeout == Some(Duration::ZERO) {
            return Err(ConfigurationError::invalid_value(
                "retry.attempt_timeout_ms",
                "0".to_string(),
                "must be positive when set",
            ));
        }
        Ok(())
    }

    pub fn base_interval(&self) -> Duration {
        self.base_interval
    }

    pub fn backoff_rate(&self) -> f64 {
        self.backoff_rate
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn retryable_errors(&self) -> &BTreeSet<ErrorKind> {
        &self.retryable_errors
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        self.retryable_errors.contains(&kind)
    }

    /// Delay before `attempt` (1-based); zero for the first attempt
    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        self.backoff_calculator().delay_before_attempt(attempt)
    }

    pub fn backoff_calculator(&self) -> BackoffCalculator {
        BackoffCalculator::new(self.base_interval, self.backoff_rate)
    }
}
