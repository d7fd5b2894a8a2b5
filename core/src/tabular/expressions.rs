//! TMSL expression values: a single-line string or an array of lines.

use serde_json::Value;

/// Text of an expression property; arrays of lines are joined with `\n`.
pub fn expression_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Array(lines) => {
            let mut out = Vec::with_capacity(lines.len());
            for line in lines {
                out.push(line.as_str()?);
            }
            Some(out.join("\n"))
        }
        _ => None,
    }
}

/// Inverse of [`expression_text`]: multi-line text becomes an array of lines.
pub fn expression_value(text: &str) -> Value {
    if text.contains('\n') {
        Value::Array(
            text.split('\n')
                .map(|line| Value::String(line.to_string()))
                .collect(),
        )
    } else {
        Value::String(text.to_string())
    }
}
