//! Retry policy with capped exponential backoff.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::{ErrorCategory, ResilienceError};

/// Categories retried when a policy does not name its own.
pub const DEFAULT_RETRYABLE_CATEGORIES: [ErrorCategory; 3] = [
    ErrorCategory::RateLimit,
    ErrorCategory::ServiceError,
    ErrorCategory::Network,
];

/// Configuration for retry behavior with exponential backoff.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt. The operation runs at most `max_retries + 1` times.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Cap applied to every grown delay.
    pub max_delay: Duration,
    /// Factor the delay grows by after each retry.
    pub backoff_multiplier: f64,
    /// Categories that are retried. Anything else fails on first occurrence.
    pub retryable_categories: HashSet<ErrorCategory>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
            backoff_multiplier: 2.0,
            retryable_categories: DEFAULT_RETRYABLE_CATEGORIES.into_iter().collect(),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the default retryable categories.
    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
            backoff_multiplier,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Replaces the set of retryable categories.
    pub fn with_retryable_categories<I>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = ErrorCategory>,
    {
        self.retryable_categories = categories.into_iter().collect();
        self
    }

    /// Checks the policy constraints.
    ///
    /// A policy whose initial delay exceeds the cap still runs; its delays
    /// are capped from the second retry on. `validate` reports it so that
    /// configuration loading can reject it.
    pub fn validate(&self) -> Result<(), ResilienceError> {
        if self.initial_delay.is_zero() {
            return Err(ResilienceError::InvalidPolicy(
                "initial delay must be greater than zero".to_string(),
            ));
        }
        if self.max_delay < self.initial_delay {
            return Err(ResilienceError::InvalidPolicy(format!(
                "max delay {}ms is below initial delay {}ms",
                self.max_delay.as_millis(),
                self.initial_delay.as_millis()
            )));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier <= 1.0 {
            return Err(ResilienceError::InvalidPolicy(format!(
                "backoff multiplier must be greater than 1, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }

    /// Returns true if failures of this category are retried.
    pub fn is_retryable(&self, category: ErrorCategory) -> bool {
        self.retryable_categories.contains(&category)
    }

    /// Grows a delay by the multiplier, capped at `max_delay`.
    pub fn next_delay(&self, current: Duration) -> Duration {
        let grown = current.as_secs_f64() * self.backoff_multiplier;
        if grown.is_nan() || grown >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else if grown <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(grown)
        }
    }

    /// The delays slept before each retry, in order. Unbounded; callers take what they need.
    pub fn delays(&self) -> Backoff<'_> {
        Backoff {
            policy: self,
            next: self.initial_delay,
        }
    }
}

/// Iterator over a policy's backoff delays.
#[derive(Debug, Clone)]
pub struct Backoff<'a> {
    policy: &'a RetryPolicy,
    next: Duration,
}

impl Iterator for Backoff<'_> {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let current = self.next;
        self.next = self.policy.next_delay(current);
        Some(current)
    }
}
