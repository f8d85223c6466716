//! Retry module.
//!
//! [`RetryPolicy`] describes the backoff; [`RetryOrchestrator`] runs an async
//! operation under it, consulting the error classifier after each failure.

pub mod orchestrator;
pub mod policy;

pub use orchestrator::{with_retry, RetryFailure, RetryOrchestrator};
pub use policy::{Backoff, RetryPolicy, DEFAULT_RETRYABLE_CATEGORIES};
