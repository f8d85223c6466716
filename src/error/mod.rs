//! Error handling and classification module
//!
//! This module classifies failed remote calls into categories that drive the
//! retry decision, and defines the crate's own error type for invalid
//! policies and limiter settings.

pub mod classification;
pub mod classifier;

use thiserror::Error;

// Re-export main types for convenient access
pub use classification::{
    format_error, ClassifiedError, ErrorCategory, FailureSignal, ParseCategoryError,
    RemoteFailure,
};
pub use classifier::{classify, ClassificationRule, ErrorClassifier, StatusMatch};

/// Errors raised when building resilience components from invalid settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResilienceError {
    /// A retry policy violates its constraints.
    #[error("invalid retry policy: {0}")]
    InvalidPolicy(String),

    /// A rate limiter was configured to admit nothing.
    #[error("rate limiter ceiling must be greater than zero")]
    ZeroCeiling,

    /// A rate limiter window has no length.
    #[error("rate limiter window must be greater than zero")]
    ZeroWindow,
}
