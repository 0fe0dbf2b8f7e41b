#![allow(dead_code)]

use eventcompact::EntityState;
use serde_json::{Value, json};

/// A minimal well-formed raw record with no version or payload.
pub fn raw_event(event_id: &str, entity_id: &str, op: &str, ts: &str) -> Value {
    json!({
        "event_id": event_id,
        "entity_id": entity_id,
        "op": op,
        "ts": ts,
    })
}

/// A well-formed raw record carrying a payload.
pub fn raw_with_payload(
    event_id: &str,
    entity_id: &str,
    op: &str,
    ts: &str,
    payload: Value,
) -> Value {
    let mut event = raw_event(event_id, entity_id, op, ts);
    event["payload"] = payload;
    event
}

/// A well-formed raw record carrying a version and a payload.
pub fn raw_versioned(
    event_id: &str,
    entity_id: &str,
    op: &str,
    ts: &str,
    version: i64,
    payload: Value,
) -> Value {
    let mut event = raw_with_payload(event_id, entity_id, op, ts, payload);
    event["version"] = json!(version);
    event
}

/// Build an [`EntityState`] from a `json!` object literal.
pub fn state_of(value: Value) -> EntityState {
    value
        .as_object()
        .expect("state fixture must be a JSON object")
        .clone()
}
