//! Input checks applied before a request is sent to a model provider.
//!
//! These run locally and cheaply so obviously malformed requests never spend
//! a rate limiter slot or a retry budget.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::compat::is_truthy;

/// Upper bound accepted for `max_tokens`.
pub const MAX_TOKENS_LIMIT: i64 = 100_000;

/// Prompts are truncated to this many characters.
pub const MAX_PROMPT_CHARS: usize = 50_000;

/// Errors from model identifier validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Model ID must be a non-empty string")]
    EmptyModelId,

    #[error("Model ID format invalid. Expected format: provider.model-name or ARN")]
    InvalidModelId(String),
}

fn model_id_formats() -> &'static [Regex] {
    static FORMATS: OnceLock<Vec<Regex>> = OnceLock::new();
    FORMATS.get_or_init(|| {
        vec![
            // provider.model-name, e.g. anthropic.claude-3-5
            Regex::new(r"(?i)^[a-z]+\.[a-z0-9-]+$").expect("Invalid regex pattern"),
            Regex::new(r"^arn:aws:bedrock:.+$").expect("Invalid regex pattern"),
        ]
    })
}

/// Checks a model identifier is either `provider.model-name` or a Bedrock ARN.
pub fn validate_model_id(model_id: &str) -> Result<(), ValidationError> {
    if model_id.is_empty() {
        return Err(ValidationError::EmptyModelId);
    }

    if model_id_formats().iter().any(|re| re.is_match(model_id)) {
        Ok(())
    } else {
        Err(ValidationError::InvalidModelId(model_id.to_string()))
    }
}

/// One chat message in an invocation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Some(role.into()),
            content: Some(Value::String(content.into())),
        }
    }

    fn is_complete(&self) -> bool {
        let has_role = self.role.as_deref().is_some_and(|role| !role.is_empty());
        let has_content = self.content.as_ref().is_some_and(is_truthy);
        has_role && has_content
    }
}

/// The subset of invocation parameters that is checked locally.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvokeParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
}

/// Outcome of parameter validation. Every problem is reported, not just the first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Checks token bounds, temperature range and message shape.
pub fn validate_request_params(params: &InvokeParams) -> ValidationReport {
    let mut errors = Vec::new();

    if let Some(max_tokens) = params.max_tokens {
        if max_tokens <= 0 {
            errors.push("max_tokens must be a positive number".to_string());
        }
        if max_tokens > MAX_TOKENS_LIMIT {
            errors.push(format!(
                "max_tokens exceeds maximum limit ({})",
                MAX_TOKENS_LIMIT
            ));
        }
    }

    if let Some(temperature) = params.temperature {
        if !(0.0..=2.0).contains(&temperature) {
            errors.push("temperature must be between 0 and 2".to_string());
        }
    }

    if let Some(messages) = &params.messages {
        if messages.is_empty() {
            errors.push("messages array cannot be empty".to_string());
        }
        for (idx, message) in messages.iter().enumerate() {
            if !message.is_complete() {
                errors.push(format!("message[{}] missing required role or content", idx));
            }
        }
    }

    ValidationReport { errors }
}

/// Trims a prompt, strips control characters and caps its length.
///
/// Tabs, newlines and carriage returns are kept.
pub fn sanitize_prompt(prompt: &str) -> String {
    prompt
        .trim()
        .chars()
        .filter(|c| !is_stripped_control(*c))
        .take(MAX_PROMPT_CHARS)
        .collect()
}

fn is_stripped_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{08}' | '\u{0B}' | '\u{0C}' | '\u{0E}'..='\u{1F}' | '\u{7F}')
}
