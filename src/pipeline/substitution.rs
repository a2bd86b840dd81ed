//! Placeholder substitution.
//!
//! Templates carry tokens of the form `{{.key}}`. Substitution is literal and
//! single-pass: a value that itself looks like a token is inserted verbatim and
//! never re-scanned.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

pub const OPEN_DELIMITER: &str = "{{.";
pub const CLOSE_DELIMITER: &str = "}}";

lazy_static! {
    static ref PLACEHOLDER_RE: Regex =
        Regex::new(r"\{\{\.([A-Za-z0-9_\-]+)\}\}").expect("placeholder pattern is valid");
}

/// Build the token for a key, e.g. `total` -> `{{.total}}`.
pub fn token_for(key: &str) -> String {
    format!("{OPEN_DELIMITER}{key}{CLOSE_DELIMITER}")
}

/// Replace every token whose key is present in `values`.
///
/// Tokens without a matching key are left untouched. The text is scanned once,
/// so the order in which keys are applied cannot change the result.
pub fn substitute(text: &str, values: &HashMap<String, String>) -> String {
    if values.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find(OPEN_DELIMITER) {
        let after_open = &rest[start + OPEN_DELIMITER.len()..];
        let Some(end) = after_open.find(CLOSE_DELIMITER) else {
            break;
        };

        let key = &after_open[..end];
        match values.get(key) {
            Some(value) => {
                out.push_str(&rest[..start]);
                out.push_str(value);
                rest = &after_open[end + CLOSE_DELIMITER.len()..];
            }
            None => {
                // Keep the opening delimiter and resume right after it, so a
                // nested `{{.` inside an unknown token can still match.
                out.push_str(&rest[..start + OPEN_DELIMITER.len()]);
                rest = after_open;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Names of the tokens still present in `text`, in order of first appearance.
pub fn find_placeholders(text: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(text) {
        let name = caps[1].to_string();
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}
