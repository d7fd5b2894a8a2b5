//! Canonical JSON form for files written into a project folder.
//!
//! Canonicalization sorts object properties, turns floats within
//! [`NEAR_INTEGER_EPSILON`] of an integer into that integer and drops
//! volatile properties. Applying it twice gives the same result as once.

use serde_json::{Map, Number, Value};

pub const NEAR_INTEGER_EPSILON: f64 = 0.0001;

/// Largest magnitude at which every integer is exactly representable as f64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

pub fn canonicalize(value: &Value, volatile_properties: &[String]) -> Value {
    canonicalize_value(value, volatile_properties)
}

fn canonicalize_value(value: &Value, volatile_properties: &[String]) -> Value {
    match value {
        Value::Number(n) => Value::Number(normalize_number(n)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| canonicalize_value(v, volatile_properties))
                .collect(),
        ),
        Value::Object(map) => {
            let mut keys: Vec<&String> = map
                .keys()
                .filter(|k| !volatile_properties.iter().any(|v| v == *k))
                .collect();
            keys.sort();
            let mut out = Map::with_capacity(keys.len());
            for key in keys {
                let child = map.get(key).unwrap_or(&Value::Null);
                out.insert(key.clone(), canonicalize_value(child, volatile_properties));
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

pub fn normalize_number(n: &Number) -> Number {
    if n.is_i64() || n.is_u64() {
        return n.clone();
    }
    match n.as_f64() {
        Some(v) if v.is_finite() && v.abs() <= MAX_SAFE_INTEGER => {
            let rounded = v.round();
            if (v - rounded).abs() < NEAR_INTEGER_EPSILON {
                Number::from(rounded as i64)
            } else {
                n.clone()
            }
        }
        _ => n.clone(),
    }
}

/// Removes every property named in `names`, at any depth.
pub fn strip_properties(value: &mut Value, names: &[&str]) {
    match value {
        Value::Object(map) => {
            map.retain(|key, _| !names.contains(&key.as_str()));
            for child in map.values_mut() {
                strip_properties(child, names);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_properties(item, names);
            }
        }
        _ => {}
    }
}

/// Pretty printed with two-space indentation and a trailing newline.
pub fn to_canonical_string(value: &Value) -> Result<String, serde_json::Error> {
    let mut out = serde_json::to_string_pretty(value)?;
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}
