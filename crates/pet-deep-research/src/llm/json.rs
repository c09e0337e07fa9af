//! Lenient JSON extraction from model output
//!
//! Models asked for JSON still wrap it in markdown fences or surround it
//! with prose now and then.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Remove markdown code fences (```json ... ```) around `text`.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // drop the info string ("json") on the opening fence line
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse `text` as `T`, tolerating fences and leading/trailing prose.
pub fn extract_json<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    let cleaned = strip_code_fences(text);
    match serde_json::from_str(cleaned) {
        Ok(value) => Ok(value),
        Err(err) => {
            let start = cleaned.find(['{', '[']);
            let end = cleaned.rfind(['}', ']']);
            match (start, end) {
                (Some(start), Some(end)) if start < end => {
                    serde_json::from_str(&cleaned[start..=end]).map_err(|_| err)
                }
                _ => Err(err),
            }
        }
    }
}

/// Text of a scalar item in a model-produced list; numbers and booleans
/// are stringified, blanks, nulls and nested values dropped.
pub fn scalar_text(value: Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}
