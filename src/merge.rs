//! State merging — how an upsert payload lands on the running document.

use serde_json::Value;

use crate::event::EntityState;

/// Merge an upsert payload into the current state, returning the new state.
///
/// An absent payload leaves the state unchanged. A payload carrying `$set`
/// and/or `$unset` is a patch; any other payload replaces the document
/// wholesale, discarding all prior keys.
///
/// # Examples
///
/// ```
/// use eventcompact::merge_state;
/// use serde_json::json;
///
/// let current = json!({"a": 1, "b": 2}).as_object().unwrap().clone();
/// let patch = json!({"$set": {"b": 5, "c": 9}, "$unset": ["a"]})
///     .as_object()
///     .unwrap()
///     .clone();
///
/// let merged = merge_state(&current, Some(&patch));
/// assert_eq!(merged, *json!({"b": 5, "c": 9}).as_object().unwrap());
/// ```
pub fn merge_state(current: &EntityState, payload: Option<&EntityState>) -> EntityState {
    let Some(payload) = payload else {
        return current.clone();
    };
    if payload.contains_key("$set") || payload.contains_key("$unset") {
        return apply_patch(current, payload);
    }
    payload.clone()
}

/// Apply `$set` entries (overwrite/add), then remove `$unset` keys.
///
/// `$unset` accepts a list of key names or a mapping of key → flag where
/// only truthy flags remove. Sibling keys next to `$set`/`$unset` are
/// ignored, as is a `$set` that is not itself a mapping.
fn apply_patch(state: &EntityState, patch: &EntityState) -> EntityState {
    let mut out = state.clone();

    if let Some(Value::Object(set)) = patch.get("$set") {
        for (key, value) in set {
            out.insert(key.clone(), value.clone());
        }
    }

    match patch.get("$unset") {
        Some(Value::Array(keys)) => {
            for key in keys.iter().filter_map(Value::as_str) {
                out.remove(key);
            }
        }
        Some(Value::Object(flags)) => {
            for (key, flag) in flags {
                if is_truthy(flag) {
                    out.remove(key);
                }
            }
        }
        _ => {}
    }

    out
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
