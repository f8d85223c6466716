//! Composes the rate limiter and the retry orchestrator around a remote call.
//!
//! The call path is: acquire a limiter slot (when a limiter is attached),
//! then run the operation under the retry policy. The limiter is consulted
//! once per call, not once per attempt.

use std::future::Future;
use std::sync::Arc;

use crate::config::{ConfigError, ResilienceConfig};
use crate::error::FailureSignal;
use crate::ratelimit::RateLimiter;
use crate::retry::{RetryFailure, RetryOrchestrator, RetryPolicy};

/// Rate-limited, retrying wrapper for one logical channel.
#[derive(Clone, Debug)]
pub struct ResilientInvoker {
    limiter: Option<Arc<RateLimiter>>,
    orchestrator: RetryOrchestrator,
}

impl ResilientInvoker {
    /// Creates an invoker with retries only.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            limiter: None,
            orchestrator: RetryOrchestrator::new(policy),
        }
    }

    /// Creates an invoker from an existing orchestrator.
    pub fn with_orchestrator(orchestrator: RetryOrchestrator) -> Self {
        Self {
            limiter: None,
            orchestrator,
        }
    }

    /// Builds a rate-limited invoker from configuration.
    pub fn from_config(config: &ResilienceConfig) -> Result<Self, ConfigError> {
        let policy = config.retry.to_policy()?;
        let limiter = config.rate_limit.build()?;
        Ok(Self::new(policy).with_limiter(Arc::new(limiter)))
    }

    /// Attaches a limiter. Several invokers may share one limiter.
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    pub fn limiter(&self) -> Option<&Arc<RateLimiter>> {
        self.limiter.as_ref()
    }

    pub fn policy(&self) -> &RetryPolicy {
        self.orchestrator.policy()
    }

    /// Admits the call, then runs it with retries. Returns the original failure on error.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: FailureSignal,
    {
        self.admit().await;
        self.orchestrator.run(operation).await
    }

    /// Like [`call`](Self::call), but returns the failure with its classification.
    pub async fn call_with_report<F, Fut, T, E>(&self, operation: F) -> Result<T, RetryFailure<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: FailureSignal,
    {
        self.admit().await;
        self.orchestrator.run_with_report(operation).await
    }

    async fn admit(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }
    }
}
