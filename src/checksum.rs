//! Schema fingerprints
//!
//! A fingerprint identifies the exact schema document a compiled type was
//! built from. Object keys are sorted first so that two documents that only
//! differ in key order share a fingerprint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA256 fingerprint of a canonicalized schema document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a JSON schema document
    pub fn of_json(value: &Value) -> Self {
        let canonical = canonicalize(value).to_string();
        let hash = Sha256::digest(canonical.as_bytes());
        Self(format!("{:x}", hash))
    }

    /// Full hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for log lines and generated headers
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }

    /// Check whether a document produces this fingerprint
    pub fn matches(&self, value: &Value) -> bool {
        Self::of_json(value) == *self
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key.as_str()]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fingerprint_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"type": "object", "title": "A"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"title": "A", "type": "object"}"#).unwrap();
        assert_eq!(Fingerprint::of_json(&a), Fingerprint::of_json(&b));
    }

    #[test]
    fn test_fingerprint_different_content() {
        let a = Fingerprint::of_json(&json!({"type": "string"}));
        let b = Fingerprint::of_json(&json!({"type": "integer"}));
        assert_ne!(a, b);
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn test_fingerprint_matches() {
        let schema = json!({"properties": {"x": {"type": "number"}}});
        let fp = Fingerprint::of_json(&schema);
        assert!(fp.matches(&schema));
        assert!(!fp.matches(&json!({})));
    }
}
