// src/parse.rs

use serde_json::{Map, Value};

use crate::error::{Result, ScanError};

/// Decode the raw model output into an untyped JSON mapping.
///
/// Model responses are not guaranteed to be pure JSON: some models wrap the
/// object in markdown fences, prepend reasoning text, or append commentary.
/// We strip fences, locate the first balanced JSON object in what remains,
/// and decode only that span. No field-level validation happens here —
/// normalization owns semantics.
pub fn parse(raw: &str) -> Result<Map<String, Value>> {
    let stripped = strip_fences(raw);

    let span = extract_json_object(stripped)
        .ok_or_else(|| ScanError::UnparsableResponse("no JSON object found".to_string()))?;

    let value: Value = serde_json::from_str(span)
        .map_err(|e| ScanError::UnparsableResponse(e.to_string()))?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(ScanError::UnparsableResponse(format!(
            "expected a JSON object, got {}",
            type_name(&other)
        ))),
    }
}

/// Strip markdown code fences if the model added them despite instructions.
fn strip_fences(s: &str) -> &str {
    s.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Locate the first balanced `{...}` span in a string.
///
/// A brace-balance scan rather than a regex or first-`{`/last-`}` search,
/// so that braces inside string literals (and escaped quotes inside those
/// strings) do not throw off the span.
fn extract_json_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
