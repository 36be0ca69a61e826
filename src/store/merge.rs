//! Merge-write semantics for JSON documents
//!
//! Objects merge key by key, recursively. Any other value (including arrays
//! and null) replaces what was there.

use serde_json::Value;

/// Merge `patch` into `target` in place
pub fn merge_into(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) => merge_into(slot, value),
                    None => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
