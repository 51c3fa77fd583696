//! # Backoff Calculator
//!
//! Exponential backoff between attempts of the same batch:
//! `delay(k) = base_interval × backoff_rate^(k − 2)` for attempt `k >= 2`,
//! measured from the end of attempt `k − 1`. Results saturate at
//! `Duration::MAX` instead of overflowing.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffCalculator {
    base_interval: Duration,
    backoff_rate: f64,
}

impl BackoffCalculator {
    pub fn new(base_interval: Duration, backoff_rate: f64) -> Self {
        Self {
            base_interval,
            backoff_rate,
        }
    }

    /// Delay to wait before `attempt` (1-based)
    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        if attempt < 2 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 2).unwrap_or(i32::MAX);
        let factor = self.backoff_rate.powi(exponent);
        Duration::try_from_secs_f64(self.base_interval.as_secs_f64() * factor)
            .unwrap_or(Duration::MAX)
    }

    /// Delays before attempts `2..=max_attempts`
    pub fn schedule(&self, max_attempts: u32) -> Vec<Duration> {
        (2..=max_attempts)
            .map(|attempt| self.delay_before_attempt(attempt))
            .collect()
    }

    /// Sum of every backoff delay a batch can spend waiting
    pub fn total_backoff(&self, max_attempts: u32) -> Duration {
        self.schedule(max_attempts)
            .into_iter()
            .fold(Duration::ZERO, Duration::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let calculator = BackoffCalculator::new(Duration::from_secs(2), 2.0);

        let delays: Vec<u64> = calculator
            .schedule(6)
            .into_iter()
            .map(|d| d.as_secs())
            .collect();

        assert_eq!(delays, vec![2, 4, 8, 16, 32]);
        assert_eq!(calculator.total_backoff(6), Duration::from_secs(62));
    }

    #[test]
    fn test_first_attempt_has_no_delay() {
        let calculator = BackoffCalculator::new(Duration::from_secs(2), 2.0);
        assert_eq!(calculator.delay_before_attempt(1), Duration::ZERO);
        assert_eq!(calculator.delay_before_attempt(0), Duration::ZERO);
    }

    #[test]
    fn test_constant_rate_gives_fixed_delay() {
        let calculator = BackoffCalculator::new(Duration::from_millis(250), 1.0);
        assert!(calculator
            .schedule(5)
            .iter()
            .all(|d| *d == Duration::from_millis(250)));
    }

    #[test]
    fn test_huge_exponent_saturates() {
        let calculator = BackoffCalculator::new(Duration::from_secs(2), 10.0);
        assert_eq!(calculator.delay_before_attempt(500), Duration::MAX);
    }

    #[test]
    fn test_single_attempt_has_empty_schedule() {
        let calculator = BackoffCalculator::new(Duration::from_secs(2), 2.0);
        assert!(calculator.schedule(1).is_empty());
    }
}
