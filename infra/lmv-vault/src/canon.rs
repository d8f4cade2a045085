//! Deterministic JSON canonicalization and content hashing.
//!
//! The hash chain over the journal depends entirely on every implementation
//! producing byte-identical output for the same logical document. Object keys
//! are sorted by Unicode codepoint and re-emitted with `serde_json`'s compact
//! (no whitespace) writer; arrays retain their original order.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Serializes `value` into the canonical JSON form used for hashing and AAD
/// binding: sorted object keys, compact separators, order-preserving arrays.
#[must_use]
pub fn canonical_json(value: &Value) -> String {
    serde_json::to_string(&canonicalize(value))
        .expect("canonicalized JSON value must always serialize")
}

/// Canonicalizes a serializable value and returns its canonical JSON string.
///
/// # Errors
/// Returns a `serde_json::Error` if `value` cannot be represented as JSON.
pub fn canonical_json_of<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v = serde_json::to_value(value)?;
    Ok(canonical_json(&v))
}

/// Returns the lowercase hex-encoded SHA-256 digest of the UTF-8 bytes of `s`.
#[must_use]
pub fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sorts_object_keys() {
        let v = json!({"b": 1, "a": 2});
        assert_eq!(canonical_json(&v), r#"{"a":2,"b":1}"#);
    }

    #[test]
    fn nested_objects_are_sorted_recursively() {
        let v = json!({"z": {"y": 1, "x": 2}, "a": [3, {"d": 4, "c": 5}]});
        assert_eq!(canonical_json(&v), r#"{"a":[3,{"c":5,"d":4}],"z":{"x":2,"y":1}}"#);
    }

    #[test]
    fn hash_is_deterministic() {
        let a = sha256_hex("hello");
        let b = sha256_hex("hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn different_key_order_same_hash() {
        let v1 = canonical_json(&json!({"a": 1, "b": 2}));
        let v2 = canonical_json(&json!({"b": 2, "a": 1}));
        assert_eq!(sha256_hex(&v1), sha256_hex(&v2));
    }
}
