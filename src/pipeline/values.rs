//! Normalization of caller-supplied data into substitution text.

use serde_json::{Map, Number, Value};
use std::collections::HashMap;

use super::PipelineError;

/// Placeholder name to replacement text.
pub type Substitutions = HashMap<String, String>;

/// Convert a JSON data map into text values.
///
/// Strings are taken as-is and numbers are rendered in plain decimal. Any other
/// value type rejects the whole map, naming the offending key.
pub fn normalize_data(data: &Map<String, Value>) -> Result<Substitutions, PipelineError> {
    let mut values = Substitutions::with_capacity(data.len());
    for (key, value) in data {
        let text = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => format_number(n),
            _ => {
                return Err(PipelineError::InvalidDataType { key: key.clone() });
            }
        };
        values.insert(key.clone(), text);
    }
    Ok(values)
}

/// Render a number without exponent notation.
///
/// Integers keep every digit; other values use the shortest decimal that
/// round-trips, so `42.0` becomes `42` and `0.1` stays `0.1`.
pub fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    match n.as_f64() {
        // f64's Display is shortest round-trip and never uses an exponent.
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}
