//! EchoTune resilience core
//!
//! Wraps calls to remote model providers with three composable stages:
//! an [`error::ErrorClassifier`] that categorizes failures, a
//! [`retry::RetryOrchestrator`] that retries the retryable ones with capped
//! exponential backoff, and a [`ratelimit::RateLimiter`] that gates
//! admission to a sliding one-minute window.
//!
//! ```no_run
//! use echotune_resilience::error::RemoteFailure;
//! use echotune_resilience::retry::{with_retry, RetryPolicy};
//!
//! # async fn call_model() -> Result<String, RemoteFailure> { Ok(String::new()) }
//! # async fn example() -> Result<(), RemoteFailure> {
//! let reply = with_retry(&RetryPolicy::default(), || call_model()).await?;
//! # Ok(())
//! # }
//! ```

pub mod compat;
pub mod config;
pub mod error;
pub mod invoker;
pub mod logging;
pub mod ratelimit;
pub mod registry;
pub mod retry;
pub mod validation;

pub use error::{classify, ClassifiedError, ErrorCategory, ErrorClassifier, RemoteFailure};
pub use invoker::ResilientInvoker;
pub use ratelimit::{RateLimitStatus, RateLimiter};
pub use retry::{with_retry, RetryOrchestrator, RetryPolicy};
