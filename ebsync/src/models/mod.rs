//! Source-side data models
//!
//! Elba payloads are loosely shaped: the same attribute may arrive under
//! several names, and ids may be strings or numbers. The helpers here probe a
//! fixed list of candidate names and take the first usable value.

mod counterparty;

pub use counterparty::{ContactPerson, Counterparty};

use serde_json::Value;

/// First non-empty string (or number, stringified) among `keys`
pub(crate) fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First non-empty array among `keys`
pub(crate) fn first_array<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Vec<Value>> {
    keys.iter()
        .find_map(|key| value.get(*key)?.as_array().filter(|items| !items.is_empty()))
}

/// Items of a listing response: the first array under `keys`, or a bare array
pub fn extract_items(body: &Value, keys: &[&str]) -> Vec<Value> {
    if let Some(items) = keys.iter().find_map(|key| body.get(*key)?.as_array()) {
        return items.clone();
    }
    match body {
        Value::Array(items) => items.clone(),
        _ => Vec::new(),
    }
}
