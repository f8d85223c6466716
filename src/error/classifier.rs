//! Ordered rule matching for remote call failures
//!
//! Each [`ClassificationRule`] pairs message substrings and a status predicate
//! with a category and its remediation hints. Rules are checked in order and
//! the first match wins, so a 500 whose message says "invalid" is a
//! validation error, not a service error.

use std::sync::OnceLock;

use tracing::debug;

use super::{ClassifiedError, ErrorCategory, FailureSignal};

const DEFAULT_MESSAGE: &str = "Unknown error";
const DEFAULT_KIND: &str = "Error";

/// How a rule inspects the transport status.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusMatch {
    /// The status is ignored.
    Any,
    /// The status equals this code.
    Exactly(u16),
    /// The status is at least this code.
    AtLeast(u16),
}

impl StatusMatch {
    fn matches(&self, status: Option<u16>) -> bool {
        match (self, status) {
            (StatusMatch::Any, _) | (_, None) => false,
            (StatusMatch::Exactly(code), Some(status)) => status == *code,
            (StatusMatch::AtLeast(code), Some(status)) => status >= *code,
        }
    }
}

/// One classification rule: substrings or a status select a category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassificationRule {
    category: ErrorCategory,
    needles: Vec<String>,
    status: StatusMatch,
    actionable: Vec<String>,
}

impl ClassificationRule {
    /// Creates a rule that matches nothing until needles or a status are added.
    pub fn new(category: ErrorCategory) -> Self {
        Self {
            category,
            needles: Vec::new(),
            status: StatusMatch::Any,
            actionable: Vec::new(),
        }
    }

    /// Message substrings that select this rule. Matching is case-sensitive.
    pub fn with_needles<I, S>(mut self, needles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.needles.extend(needles.into_iter().map(Into::into));
        self
    }

    /// Status predicate that selects this rule on its own.
    pub fn with_status(mut self, status: StatusMatch) -> Self {
        self.status = status;
        self
    }

    /// Remediation hints attached to errors matched by this rule.
    pub fn with_actionable<I, S>(mut self, actionable: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.actionable.extend(actionable.into_iter().map(Into::into));
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn needles(&self) -> &[String] {
        &self.needles
    }

    pub fn status(&self) -> StatusMatch {
        self.status
    }

    pub fn actionable(&self) -> &[String] {
        &self.actionable
    }

    /// Returns true if the message contains any needle or the status matches.
    pub fn matches(&self, message: &str, status: Option<u16>) -> bool {
        self.needles
            .iter()
            .any(|needle| message.contains(needle.as_str()))
            || self.status.matches(status)
    }
}

/// Classifies remote call failures against an ordered rule list.
#[derive(Clone, Debug)]
pub struct ErrorClassifier {
    rules: Vec<ClassificationRule>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorClassifier {
    /// Creates a classifier with the default Bedrock-oriented rules.
    pub fn new() -> Self {
        Self {
            rules: Self::default_rules(),
        }
    }

    /// Creates a classifier with custom rules, checked in the given order.
    pub fn with_rules(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    /// Returns the shared default classifier.
    pub fn shared() -> &'static ErrorClassifier {
        static DEFAULT: OnceLock<ErrorClassifier> = OnceLock::new();
        DEFAULT.get_or_init(ErrorClassifier::new)
    }

    fn default_rules() -> Vec<ClassificationRule> {
        vec![
            ClassificationRule::new(ErrorCategory::Permissions)
                .with_needles(["AccessDenied", "not authorized"])
                .with_status(StatusMatch::Exactly(403))
                .with_actionable([
                    "Verify AWS credentials are valid and not expired",
                    "Check IAM policy includes bedrock:InvokeModel permission",
                    "Remove any explicit DENY policies for Bedrock",
                    "Ensure Bedrock service is enabled in AWS Console",
                    "Verify the IAM user/role has the necessary permissions",
                ]),
            ClassificationRule::new(ErrorCategory::Validation)
                .with_needles(["ValidationException", "invalid"])
                .with_status(StatusMatch::Exactly(400))
                .with_actionable([
                    "Verify model ID is correct and properly formatted",
                    "Check request parameters match model requirements",
                    "Ensure max_tokens is within model limits",
                    "Validate temperature and other parameters are in valid ranges",
                    "Check that the request body structure matches API expectations",
                ]),
            ClassificationRule::new(ErrorCategory::ModelAvailability)
                .with_needles(["ResourceNotFound", "not found", "Model not available"])
                .with_status(StatusMatch::Exactly(404))
                .with_actionable([
                    "Verify model is available in the target AWS region",
                    "Enable model access in AWS Bedrock console",
                    "Check if model requires special access request",
                    "Try alternative regions where model is available",
                    "Verify model ID matches current AWS Bedrock naming",
                ]),
            ClassificationRule::new(ErrorCategory::RateLimit)
                .with_needles(["ThrottlingException", "TooManyRequests"])
                .with_status(StatusMatch::Exactly(429))
                .with_actionable([
                    "Implement exponential backoff retry logic",
                    "Reduce request rate to stay within quotas",
                    "Request quota increase from AWS support",
                    "Consider using multiple regions for load distribution",
                    "Implement request queuing and throttling",
                ]),
            ClassificationRule::new(ErrorCategory::ServiceError)
                .with_status(StatusMatch::AtLeast(500))
                .with_actionable([
                    "Retry the request after a delay",
                    "Check AWS Service Health Dashboard",
                    "Try alternative AWS region if available",
                    "Contact AWS support if issue persists",
                    "Implement circuit breaker pattern for resilience",
                ]),
            ClassificationRule::new(ErrorCategory::Network)
                .with_needles(["ECONNREFUSED", "ETIMEDOUT", "NetworkingError"])
                .with_actionable([
                    "Check network connectivity",
                    "Verify firewall rules allow AWS API access",
                    "Check DNS resolution for AWS endpoints",
                    "Verify proxy settings if applicable",
                    "Try with increased timeout settings",
                ]),
        ]
    }

    /// Appends a rule after the existing ones.
    pub fn add_rule(&mut self, rule: ClassificationRule) {
        self.rules.push(rule);
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classifies a failure. Never fails: unmatched failures are `Unknown`.
    pub fn classify<F: FailureSignal + ?Sized>(&self, failure: &F) -> ClassifiedError {
        let raw_message = failure.message().unwrap_or("");
        let status = failure.transport_status();

        let message = if raw_message.is_empty() {
            DEFAULT_MESSAGE
        } else {
            raw_message
        };
        let kind = failure
            .kind()
            .filter(|kind| !kind.is_empty())
            .unwrap_or(DEFAULT_KIND);

        let matched = self
            .rules
            .iter()
            .find(|rule| rule.matches(raw_message, status));

        let error = match matched {
            Some(rule) => ClassifiedError::new(rule.category, message)
                .with_actionable(rule.actionable.iter().cloned()),
            None => ClassifiedError::new(ErrorCategory::Unknown, message),
        }
        .with_kind(kind)
        .with_transport_status(status);

        debug!(
            category = %error.category(),
            status = ?status,
            retryable = error.is_retryable(),
            "classified remote failure"
        );

        error
    }
}

/// Classifies a failure with the shared default classifier.
pub fn classify<F: FailureSignal + ?Sized>(failure: &F) -> ClassifiedError {
    ErrorClassifier::shared().classify(failure)
}
