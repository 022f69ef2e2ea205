//! Sensitive-field redaction applied to diagnostic metadata before it is
//! persisted. Matching is by key name, recursively through nested objects and
//! arrays.

use serde_json::Value;

const SENSITIVE_KEY_FRAGMENTS: &[&str] = &[
    "adminkey",
    "token",
    "password",
    "secret",
    "authorization",
    "bearer",
    "csrf",
];

const REDACTED: &str = "[REDACTED]";

/// Replace the value of every field whose lowercased key name contains a
/// sensitive fragment with `"[REDACTED]"`. Nested objects and arrays are
/// walked; scalar roots are returned untouched.
pub fn redact_meta(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, entry) in map.iter_mut() {
                if is_sensitive_key(key) {
                    *entry = Value::String(REDACTED.to_string());
                } else {
                    redact_meta(entry);
                }
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                redact_meta(item);
            }
        }
        _ => {}
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEY_FRAGMENTS
        .iter()
        .any(|fragment| lower.contains(fragment))
}
