//! Lenient JSON-object extraction for oracle responses.
//!
//! Models are asked for strict JSON but routinely wrap it in prose or a
//! fenced code block. Three candidates are tried in order: the trimmed
//! response as-is, the body of the first fenced code block, and the widest
//! `{...}` brace span. The first candidate that parses as a JSON object wins.

use serde_json::{Map, Value};

const FENCE: &str = "```";

/// Extract a single JSON object from loosely formatted text. Returns `None`
/// when nothing parses as an object.
#[must_use]
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let candidates = [
        Some(trimmed),
        fenced_block(trimmed),
        brace_span(trimmed),
    ];

    for candidate in candidates.into_iter().flatten() {
        if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(candidate) {
            return Some(object);
        }
    }

    None
}

/// Body of the first ``` fenced block, with an optional `json` language tag.
fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find(FENCE)?;
    let body_start = open + FENCE.len();
    let body = text[body_start..].strip_prefix("json").unwrap_or(&text[body_start..]);
    let close = body.find(FENCE)?;
    Some(body[..close].trim())
}

/// Widest span from the first `{` to the last `}`.
fn brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| text[start..=end].trim())
}
