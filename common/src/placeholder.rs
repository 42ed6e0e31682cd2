//! # Placeholder Engine
//!
//! Flat `{{key}}` substitution over template text. This is deliberately not a
//! template language: there are no conditionals, loops or expressions, only
//! variable lookup with dotted paths (`{{amounts.total}}`).
//!
//! A placeholder is `{{`, optional whitespace, a key made of
//! `[a-zA-Z0-9_.]`, optional whitespace and `}}`. Any other sequence between
//! braces is not a placeholder and is left in the output verbatim.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([a-zA-Z0-9_.]+)\s*\}\}").unwrap());

/// Returns the distinct placeholder keys of `template` in first-occurrence order.
///
/// # Examples
/// ```
/// let keys = common::placeholder::extract_placeholders("{{b}} {{ a }} {{b}}");
/// assert_eq!(keys, vec!["b".to_string(), "a".to_string()]);
/// ```
pub fn extract_placeholders(template: &str) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let key = &caps[1];
        if !keys.iter().any(|k| k == key) {
            keys.push(key.to_string());
        }
    }
    keys
}

/// Replaces every placeholder in `template` with the value found in `data`.
///
/// Missing keys and `null` values become the empty string. Substituted text is
/// not scanned again, so values that happen to contain `{{...}}` are emitted
/// as-is.
///
/// # Examples
/// ```
/// use serde_json::json;
/// let out = common::placeholder::render(
///     "Dear {{name}}, total: {{amounts.total}}",
///     &json!({ "name": "Alex", "amounts": { "total": 42 } }),
/// );
/// assert_eq!(out, "Dear Alex, total: 42");
/// ```
pub fn render(template: &str, data: &Value) -> String {
    if template.is_empty() {
        return String::new();
    }
    PLACEHOLDER_RE
        .replace_all(template, |caps: &Captures| {
            lookup(data, &caps[1]).map(value_to_string).unwrap_or_default()
        })
        .into_owned()
}

/// Walks `data` along a dotted `path`. Numeric segments index into arrays.
fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Natural string form of a JSON value as it should appear in a document.
fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}
