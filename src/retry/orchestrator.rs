//! Runs a remote operation, retrying classified-retryable failures.
//!
//! The loop has three exits: the operation succeeds, a failure falls outside
//! the policy's retryable categories, or the retry budget runs out. In the
//! last two cases the original failure is returned unchanged, so upstream
//! reporting sees the provider's own error rather than a wrapper.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use tracing::{debug, warn};

use super::RetryPolicy;
use crate::error::{ClassifiedError, ErrorClassifier, FailureSignal};

/// A terminal failure together with its classification.
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// The last error returned by the operation.
    pub error: E,
    /// Classification of `error`.
    pub classified: ClassifiedError,
    /// How many times the operation ran.
    pub attempts: u32,
}

impl<E> RetryFailure<E> {
    /// Returns true if the operation stopped because the budget ran out.
    pub fn is_exhausted(&self, policy: &RetryPolicy) -> bool {
        self.attempts > policy.max_retries
    }
}

impl<E: fmt::Display> fmt::Display for RetryFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {} attempt(s): {}",
            self.classified.category(),
            self.attempts,
            self.error
        )
    }
}

impl<E> std::error::Error for RetryFailure<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Executes operations under a [`RetryPolicy`].
#[derive(Clone, Debug)]
pub struct RetryOrchestrator {
    policy: RetryPolicy,
    classifier: Arc<ErrorClassifier>,
}

impl Default for RetryOrchestrator {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl RetryOrchestrator {
    /// Creates an orchestrator using the default classification rules.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            classifier: Arc::new(ErrorClassifier::new()),
        }
    }

    /// Creates an orchestrator with a custom classifier.
    pub fn with_classifier(policy: RetryPolicy, classifier: Arc<ErrorClassifier>) -> Self {
        Self { policy, classifier }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    /// Runs `operation`, returning its value or the original failure.
    pub async fn run<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: FailureSignal,
    {
        self.run_with_report(operation)
            .await
            .map_err(|failure| failure.error)
    }

    /// Runs `operation`, returning its value or the final failure with its classification.
    pub async fn run_with_report<F, Fut, T, E>(
        &self,
        mut operation: F,
    ) -> Result<T, RetryFailure<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: FailureSignal,
    {
        let mut delay = self.policy.initial_delay;
        let mut attempt: u32 = 0;

        loop {
            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(attempts = attempt + 1, "operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let classified = self.classifier.classify(&error);

            if !self.policy.is_retryable(classified.category()) {
                debug!(
                    category = %classified.category(),
                    attempt = attempt + 1,
                    "failure is not retryable"
                );
                return Err(RetryFailure {
                    error,
                    classified,
                    attempts: attempt + 1,
                });
            }

            if attempt >= self.policy.max_retries {
                warn!(
                    category = %classified.category(),
                    attempts = attempt + 1,
                    "retry budget exhausted: {}",
                    classified.message()
                );
                return Err(RetryFailure {
                    error,
                    classified,
                    attempts: attempt + 1,
                });
            }

            warn!(
                category = %classified.category(),
                delay_ms = delay.as_millis() as u64,
                "Attempt {} failed. Retrying in {}ms: {}",
                attempt + 1,
                delay.as_millis(),
                classified.message()
            );

            tokio::time::sleep(delay).await;
            delay = self.policy.next_delay(delay);
            attempt += 1;
        }
    }
}

/// Runs `operation` under `policy` with the default classification rules.
pub async fn with_retry<F, Fut, T, E>(policy: &RetryPolicy, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: FailureSignal,
{
    RetryOrchestrator::new(policy.clone()).run(operation).await
}
