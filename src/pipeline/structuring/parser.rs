use serde_json::{Map, Value};

use super::StructuringError;

/// Recover a JSON object from a model completion.
///
/// Tries, in order: the whole completion with code fences stripped, then the
/// outermost balanced `{...}` span. Anything that is not an object is rejected.
pub fn extract_json_object(completion: &str) -> Result<Map<String, Value>, StructuringError> {
    let stripped = strip_code_fences(completion);

    let value = match serde_json::from_str::<Value>(stripped) {
        Ok(value) => value,
        Err(direct_err) => {
            let span = outermost_object_span(stripped).ok_or_else(|| {
                StructuringError::UpstreamContent(format!("No JSON object in completion: {direct_err}"))
            })?;
            serde_json::from_str::<Value>(span)
                .map_err(|e| StructuringError::UpstreamContent(format!("Invalid JSON object: {e}")))?
        }
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(StructuringError::UpstreamContent(format!(
            "Expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` line and a trailing fence.
fn strip_code_fences(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```") {
        body = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

/// Byte span of the first `{` and the brace that closes it, ignoring braces
/// inside string literals. Falls back to the last `}` when unbalanced.
fn outermost_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
