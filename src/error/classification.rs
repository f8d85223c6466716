//! Error classification types for remote inference calls
//!
//! A failed remote call is reduced to a [`ClassifiedError`]: a category, a
//! retryability flag derived from that category, and a ranked list of
//! remediation hints for the operator. Classification never replaces the
//! original failure; it only annotates it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The category of a failed remote call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Credentials or IAM policy reject the call (HTTP 403).
    Permissions,
    /// The request itself is malformed (HTTP 400).
    Validation,
    /// The target model or resource does not exist or is not enabled (HTTP 404).
    ModelAvailability,
    /// The provider throttled the caller (HTTP 429).
    RateLimit,
    /// The provider failed on its side (HTTP 5xx).
    ServiceError,
    /// The call never reached the provider.
    Network,
    /// Local configuration prevents the call. No default rule assigns it.
    Configuration,
    /// Nothing matched.
    Unknown,
}

impl ErrorCategory {
    /// Every category, in classification order.
    pub const ALL: [ErrorCategory; 8] = [
        ErrorCategory::Permissions,
        ErrorCategory::Validation,
        ErrorCategory::ModelAvailability,
        ErrorCategory::RateLimit,
        ErrorCategory::ServiceError,
        ErrorCategory::Network,
        ErrorCategory::Configuration,
        ErrorCategory::Unknown,
    ];

    /// Returns the snake_case name used in logs and configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Permissions => "permissions",
            ErrorCategory::Validation => "validation",
            ErrorCategory::ModelAvailability => "model_availability",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::ServiceError => "service_error",
            ErrorCategory::Network => "network",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Returns true if failures of this category may succeed when retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::RateLimit | ErrorCategory::ServiceError | ErrorCategory::Network
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a category name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown error category: {0}")]
pub struct ParseCategoryError(pub String);

impl FromStr for ErrorCategory {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        ErrorCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

/// Anything a remote call can fail with that the classifier can inspect.
///
/// Only the message and the transport status take part in classification.
/// The kind is carried through for diagnostics.
pub trait FailureSignal {
    /// The failure's message, if it has one.
    fn message(&self) -> Option<&str>;

    /// The failure's discriminator, analogous to an exception class name.
    fn kind(&self) -> Option<&str> {
        None
    }

    /// An HTTP-like status code associated with the failure.
    fn transport_status(&self) -> Option<u16> {
        None
    }
}

impl FailureSignal for str {
    fn message(&self) -> Option<&str> {
        Some(self)
    }
}

impl FailureSignal for String {
    fn message(&self) -> Option<&str> {
        Some(self.as_str())
    }
}

impl<T: FailureSignal + ?Sized> FailureSignal for &T {
    fn message(&self) -> Option<&str> {
        (**self).message()
    }

    fn kind(&self) -> Option<&str> {
        (**self).kind()
    }

    fn transport_status(&self) -> Option<u16> {
        (**self).transport_status()
    }
}

/// A plain failure descriptor returned by remote clients.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFailure {
    message: Option<String>,
    kind: Option<String>,
    transport_status: Option<u16>,
}

impl RemoteFailure {
    /// Creates a failure with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            kind: None,
            transport_status: None,
        }
    }

    /// Creates a failure carrying only a transport status.
    pub fn from_status(status: u16) -> Self {
        Self {
            message: None,
            kind: None,
            transport_status: Some(status),
        }
    }

    /// Sets the transport status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.transport_status = Some(status);
        self
    }

    /// Sets the failure kind.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

impl FailureSignal for RemoteFailure {
    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    fn transport_status(&self) -> Option<u16> {
        self.transport_status
    }
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = self.message.as_deref().unwrap_or("Unknown error");
        match self.transport_status {
            Some(status) => write!(f, "{} (status {})", message, status),
            None => f.write_str(message),
        }
    }
}

impl std::error::Error for RemoteFailure {}

impl From<&reqwest::Error> for RemoteFailure {
    /// Maps an HTTP client failure onto the markers the default rules look for.
    fn from(err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("ETIMEDOUT: {}", err)
        } else if err.is_connect() {
            format!("NetworkingError: {}", err)
        } else {
            err.to_string()
        };

        Self {
            message: Some(message),
            kind: Some("reqwest::Error".to_string()),
            transport_status: err.status().map(|status| status.as_u16()),
        }
    }
}

impl From<reqwest::Error> for RemoteFailure {
    fn from(err: reqwest::Error) -> Self {
        RemoteFailure::from(&err)
    }
}

/// A classified failure. Immutable once built; `retryable` always follows `category`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassifiedError {
    message: String,
    kind: String,
    category: ErrorCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    transport_status: Option<u16>,
    retryable: bool,
    actionable: Vec<String>,
}

impl ClassifiedError {
    /// Creates a classified error with default kind, no status and no hints.
    pub fn new(category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: "Error".to_string(),
            category,
            transport_status: None,
            retryable: category.is_retryable(),
            actionable: Vec::new(),
        }
    }

    /// Sets the failure kind.
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Sets the transport status.
    pub fn with_transport_status(mut self, status: Option<u16>) -> Self {
        self.transport_status = status;
        self
    }

    /// Replaces the remediation hints.
    pub fn with_actionable<I, S>(mut self, actionable: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actionable = actionable.into_iter().map(Into::into).collect();
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn transport_status(&self) -> Option<u16> {
        self.transport_status
    }

    /// Returns true if the category allows retrying.
    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Ranked remediation hints, most useful first.
    pub fn actionable(&self) -> &[String] {
        &self.actionable
    }

    /// Renders the multi-line operator report.
    pub fn render(&self) -> String {
        let mut out = format!(
            "❌ {} ERROR\n",
            self.category.as_str().to_ascii_uppercase()
        );
        out.push_str(&format!("Message: {}\n", self.message));

        if let Some(status) = self.transport_status.filter(|status| *status != 0) {
            out.push_str(&format!("HTTP Status: {}\n", status));
        }

        if self.retryable {
            out.push_str("Retryable: Yes\n");
        }

        if !self.actionable.is_empty() {
            out.push_str("\n💡 Recommended Actions:\n");
            for (idx, action) in self.actionable.iter().enumerate() {
                out.push_str(&format!("  {}. {}\n", idx + 1, action));
            }
        }

        out
    }
}

/// Renders a classified error for operator-facing logs.
pub fn format_error(error: &ClassifiedError) -> String {
    error.render()
}

impl fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.message)
    }
}

impl std::error::Error for ClassifiedError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retryable_follows_category() {
        for category in ErrorCategory::ALL {
            let expected = matches!(
                category,
                ErrorCategory::RateLimit | ErrorCategory::ServiceError | ErrorCategory::Network
            );
            assert_eq!(category.is_retryable(), expected, "{:?}", category);
            assert_eq!(
                ClassifiedError::new(category, "x").is_retryable(),
                expected,
                "{:?}",
                category
            );
        }
    }

    #[test]
    fn test_category_round_trips_through_name() {
        for category in ErrorCategory::ALL {
            assert_eq!(category.as_str().parse::<ErrorCategory>(), Ok(category));
        }
        assert_eq!(
            "Rate-Limit".parse::<ErrorCategory>(),
            Ok(ErrorCategory::RateLimit)
        );
        assert!("throttled".parse::<ErrorCategory>().is_err());
    }

    #[test]
    fn test_category_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCategory::ModelAvailability).unwrap();
        assert_eq!(json, "\"model_availability\"");
    }

    #[test]
    fn test_remote_failure_display() {
        let failure = RemoteFailure::new("ThrottlingException").with_status(429);
        assert_eq!(failure.to_string(), "ThrottlingException (status 429)");
        assert_eq!(RemoteFailure::default().to_string(), "Unknown error");
    }

    #[test]
    fn test_remote_failure_signal() {
        let failure = RemoteFailure::new("boom")
            .with_kind("ServiceException")
            .with_status(503);
        assert_eq!(failure.message(), Some("boom"));
        assert_eq!(failure.kind(), Some("ServiceException"));
        assert_eq!(failure.transport_status(), Some(503));

        let status_only = RemoteFailure::from_status(404);
        assert_eq!(status_only.message(), None);
        assert_eq!(status_only.transport_status(), Some(404));
    }

    #[test]
    fn test_reqwest_builder_error_keeps_message() {
        let err = reqwest::Client::new()
            .get("not a url")
            .build()
            .expect_err("relative URL should not build");
        let failure = RemoteFailure::from(&err);
        assert_eq!(failure.kind(), Some("reqwest::Error"));
        assert_eq!(failure.transport_status(), None);
        assert!(!failure.message().unwrap().contains("ETIMEDOUT"));
    }

    fn direct_client(timeout: Duration) -> reqwest::Client {
        reqwest::Client::builder()
            .no_proxy()
            .timeout(timeout)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_reqwest_connect_error_is_network() {
        // nothing listens on port 1
        let err = direct_client(Duration::from_secs(5))
            .get("http://127.0.0.1:1/")
            .send()
            .await
            .expect_err("connection should be refused");
        assert!(err.is_connect());

        let failure = RemoteFailure::from(err);
        assert!(failure.message().unwrap().starts_with("NetworkingError: "));
        assert_eq!(crate::error::classify(&failure).category(), ErrorCategory::Network);
    }

    #[tokio::test]
    async fn test_reqwest_timeout_is_network() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            // accept and never reply
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let err = direct_client(Duration::from_millis(100))
            .get(format!("http://{}/", addr))
            .send()
            .await
            .expect_err("request should time out");
        assert!(err.is_timeout());

        let failure = RemoteFailure::from(&err);
        assert!(failure.message().unwrap().starts_with("ETIMEDOUT: "));
        assert_eq!(failure.transport_status(), None);
        assert_eq!(crate::error::classify(&failure).category(), ErrorCategory::Network);
    }

    #[test]
    fn test_render_full_report() {
        let error = ClassifiedError::new(ErrorCategory::RateLimit, "ThrottlingException")
            .with_transport_status(Some(429))
            .with_actionable(["Back off", "Slow down"]);

        let rendered = error.render();
        assert_eq!(
            rendered,
            "❌ RATE_LIMIT ERROR\n\
             Message: ThrottlingException\n\
             HTTP Status: 429\n\
             Retryable: Yes\n\
             \n💡 Recommended Actions:\n  1. Back off\n  2. Slow down\n"
        );
        assert_eq!(format_error(&error), rendered);
    }

    #[test]
    fn test_render_minimal_report() {
        let error = ClassifiedError::new(ErrorCategory::Unknown, "Some weird error");
        assert_eq!(
            error.render(),
            "❌ UNKNOWN ERROR\nMessage: Some weird error\n"
        );
    }

    #[test]
    fn test_render_skips_zero_status() {
        let error = ClassifiedError::new(ErrorCategory::Unknown, "no response")
            .with_transport_status(Some(0));
        assert_eq!(error.render(), "❌ UNKNOWN ERROR\nMessage: no response\n");
        assert_eq!(error.transport_status(), Some(0));
    }

    #[test]
    fn test_classified_error_display() {
        let error = ClassifiedError::new(ErrorCategory::Network, "ECONNREFUSED");
        assert_eq!(error.to_string(), "[network] ECONNREFUSED");
        assert_eq!(error.kind(), "Error");
    }

    #[test]
    fn test_classified_error_serializes_retryable() {
        let error = ClassifiedError::new(ErrorCategory::ServiceError, "down");
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["category"], "service_error");
        assert_eq!(json["retryable"], true);
        assert!(json.get("transport_status").is_none());
    }
}
