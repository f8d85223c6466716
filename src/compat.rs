//! Helpers for callers still using legacy model keys or response shapes.

use serde_json::{json, Value};

const LEGACY_MODEL_KEYS: &[(&str, &str)] = &[
    ("claude-v2", "claude-v2-1"),
    ("claude-instant", "claude-instant-v1"),
    ("claude-3-sonnet", "claude-3-sonnet"),
    ("claude-3-opus", "claude-3-opus"),
    ("claude-3-haiku", "claude-3-haiku"),
];

/// Maps a legacy model key to its current name. Unknown keys pass through.
pub fn convert_legacy_model_key(key: &str) -> &str {
    LEGACY_MODEL_KEYS
        .iter()
        .find(|(legacy, _)| *legacy == key)
        .map(|(_, current)| *current)
        .unwrap_or(key)
}

/// Rewrites a legacy text-completion response into the messages shape.
///
/// Responses with non-empty `content` are returned as-is, as is anything
/// without a non-empty `completion`. Empty strings, zero, `false` and
/// `null` count as absent.
pub fn normalize_response(response: Value) -> Value {
    if response.get("content").is_some_and(is_truthy) {
        return response;
    }

    let Some(completion) = response.get("completion").filter(|v| is_truthy(v)) else {
        return response;
    };

    let stop_reason = response
        .get("stop_reason")
        .filter(|v| is_truthy(v))
        .cloned()
        .unwrap_or_else(|| json!("end_turn"));
    let usage = response
        .get("usage")
        .filter(|v| is_truthy(v))
        .cloned()
        .unwrap_or_else(|| json!({}));

    json!({
        "content": [{ "type": "text", "text": completion }],
        "stop_reason": stop_reason,
        "usage": usage,
    })
}

/// Returns false for `null`, `false`, zero, NaN and the empty string.
///
/// Arrays and objects are always truthy, even when empty.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_keys() {
        assert_eq!(convert_legacy_model_key("claude-v2"), "claude-v2-1");
        assert_eq!(convert_legacy_model_key("claude-instant"), "claude-instant-v1");
        assert_eq!(convert_legacy_model_key("claude-3-opus"), "claude-3-opus");
        assert_eq!(convert_legacy_model_key("titan"), "titan");
    }

    #[test]
    fn test_current_response_passes_through() {
        let response = json!({"content": [{"type": "text", "text": "hi"}], "stop_reason": "max_tokens"});
        assert_eq!(normalize_response(response.clone()), response);
    }

    #[test]
    fn test_legacy_completion_is_converted() {
        let normalized = normalize_response(json!({"completion": "Try some lo-fi beats."}));
        assert_eq!(
            normalized,
            json!({
                "content": [{"type": "text", "text": "Try some lo-fi beats."}],
                "stop_reason": "end_turn",
                "usage": {},
            })
        );
    }

    #[test]
    fn test_legacy_completion_keeps_stop_reason_and_usage() {
        let normalized = normalize_response(json!({
            "completion": "ok",
            "stop_reason": "stop_sequence",
            "usage": {"input_tokens": 3},
        }));
        assert_eq!(normalized["stop_reason"], "stop_sequence");
        assert_eq!(normalized["usage"]["input_tokens"], 3);
    }

    #[test]
    fn test_unknown_shape_unchanged() {
        let response = json!({"error": "nope"});
        assert_eq!(normalize_response(response.clone()), response);
    }

    #[test]
    fn test_null_content_with_completion_is_converted() {
        let normalized = normalize_response(json!({"content": null, "completion": "hi"}));
        assert_eq!(normalized["content"][0]["text"], "hi");
        assert_eq!(normalized["stop_reason"], "end_turn");
    }

    #[test]
    fn test_empty_completion_passes_through() {
        let response = json!({"completion": ""});
        assert_eq!(normalize_response(response.clone()), response);
    }

    #[test]
    fn test_empty_stop_reason_defaults() {
        let normalized = normalize_response(json!({
            "completion": "ok",
            "stop_reason": "",
            "usage": null,
        }));
        assert_eq!(normalized["stop_reason"], "end_turn");
        assert_eq!(normalized["usage"], json!({}));
    }

    #[test]
    fn test_truthiness() {
        for value in [json!(null), json!(false), json!(0), json!(0.0), json!("")] {
            assert!(!is_truthy(&value), "{}", value);
        }
        for value in [json!(true), json!(1), json!(-2.5), json!("x"), json!([]), json!({})] {
            assert!(is_truthy(&value), "{}", value);
        }
    }
}
