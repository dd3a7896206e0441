//! Scrubbing of PHI values out of event details.
//!
//! Details may carry references to protected data but never the data itself.
//! Values under configured keys are replaced by a SHA-256 digest so entries
//! can still be correlated without exposing the value.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Prefix marking a hashed value.
pub const HASH_PREFIX: &str = "sha256:";

/// Hash a value for correlation.
pub fn hash_value(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    format!("{}{:x}", HASH_PREFIX, Sha256::digest(raw.as_bytes()))
}

/// Replace values under `phi_keys` (case-insensitive) with their hash, walking
/// nested objects and arrays. Returns the number of values replaced.
pub fn scrub_details(details: &mut Map<String, Value>, phi_keys: &[String]) -> usize {
    let mut replaced = 0;
    for (key, value) in details.iter_mut() {
        if phi_keys.iter().any(|k| k.eq_ignore_ascii_case(key)) {
            if !is_hashed(value) && !value.is_null() {
                *value = Value::String(hash_value(value));
                replaced += 1;
            }
        } else {
            replaced += scrub_value(value, phi_keys);
        }
    }
    replaced
}

fn scrub_value(value: &mut Value, phi_keys: &[String]) -> usize {
    match value {
        Value::Object(map) => scrub_details(map, phi_keys),
        Value::Array(items) => items.iter_mut().map(|v| scrub_value(v, phi_keys)).sum(),
        _ => 0,
    }
}

fn is_hashed(value: &Value) -> bool {
    value.as_str().is_some_and(|s| s.starts_with(HASH_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys() -> Vec<String> {
        vec!["patient_name".to_string(), "ssn".to_string()]
    }

    #[test]
    fn hashes_top_level_and_nested_phi() {
        let mut details = json!({
            "patient_name": "Jane Roe",
            "endpoint": "/api/lab-reports",
            "upload": { "SSN": "123-45-6789", "size": 2048 },
            "items": [{ "patient_name": "John Roe" }]
        })
        .as_object()
        .cloned()
        .unwrap();

        let replaced = scrub_details(&mut details, &keys());
        assert_eq!(replaced, 3);
        assert!(details["patient_name"].as_str().unwrap().starts_with(HASH_PREFIX));
        assert_eq!(details["endpoint"], "/api/lab-reports");
        assert!(details["upload"]["SSN"].as_str().unwrap().starts_with(HASH_PREFIX));
        assert_eq!(details["upload"]["size"], 2048);
        assert!(!serde_json::to_string(&details).unwrap().contains("Jane Roe"));
    }

    #[test]
    fn hashing_is_stable_and_not_repeated() {
        let mut details = json!({ "ssn": "123-45-6789" }).as_object().cloned().unwrap();
        scrub_details(&mut details, &keys());
        let first = details["ssn"].clone();
        assert_eq!(scrub_details(&mut details, &keys()), 0);
        assert_eq!(details["ssn"], first);
        assert_eq!(first, Value::String(hash_value(&json!("123-45-6789"))));
    }
}
