use std::collections::HashSet;

use eventcompact::{Op, compact_events};
use proptest::prelude::*;
use serde_json::{Value, json};

fn arb_entity() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("u1"), Just("u2"), Just("u3"), Just("orders")]
}

fn arb_op() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("create"),
        Just("update"),
        Just("upsert"),
        Just("delete"),
    ]
}

fn arb_payload() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!({"a": 1})),
        Just(json!({"k": "v", "n": 7})),
        Just(json!({"$set": {"b": 2}})),
        Just(json!({"$set": {"a": 9}, "$unset": ["n"]})),
        Just(json!({"$unset": {"a": true, "k": false}})),
    ]
}

fn arb_valid_event() -> impl Strategy<Value = Value> {
    (
        0..40u32,
        arb_entity(),
        arb_op(),
        0i64..2_000_000_000,
        proptest::option::of(0i64..5),
        proptest::option::of(arb_payload()),
    )
        .prop_map(|(id, entity, op, ts, version, payload)| {
            let mut event = json!({
                "event_id": format!("evt-{id}"),
                "entity_id": entity,
                "op": op,
                "ts": ts,
            });
            if let Some(version) = version {
                event["version"] = json!(version);
            }
            if let Some(payload) = payload {
                event["payload"] = payload;
            }
            event
        })
}

// Each of these fails normalization unconditionally, so the expected error
// count of a mixed batch is just the number of malformed records in it.
fn arb_malformed_event() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(json!({"event_id": "bad-1", "entity_id": "u1", "op": "merge", "ts": 0})),
        Just(json!({"event_id": "bad-2", "entity_id": "u1", "op": "upsert", "ts": "soon"})),
        Just(json!({"entity_id": "u1", "op": "upsert", "ts": 0})),
        Just(json!({"event_id": "bad-3", "entity_id": "u1", "op": "upsert", "ts": 0,
                    "payload": ["nope"]})),
        Just(json!({"event_id": "bad-4", "entity_id": "u1", "op": "upsert", "ts": 0,
                    "version": "x"})),
    ]
}

fn arb_batch() -> impl Strategy<Value = Vec<(bool, Value)>> {
    proptest::collection::vec(
        prop_oneof![
            3 => arb_valid_event().prop_map(|event| (true, event)),
            1 => arb_malformed_event().prop_map(|event| (false, event)),
        ],
        0..40,
    )
}

/// Entities that survive dedup: first occurrence per event_id wins.
fn expected_entities(batch: &[(bool, Value)]) -> HashSet<String> {
    let mut seen = HashSet::new();
    let mut entities = HashSet::new();
    for (ok, event) in batch {
        if !ok {
            continue;
        }
        let event_id = event["event_id"].as_str().unwrap();
        if seen.insert(event_id) {
            entities.insert(event["entity_id"].as_str().unwrap().to_string());
        }
    }
    entities
}

// Running the compactor twice over the same batch is bit-identical,
// derived event_ids included.
proptest! {
    #[test]
    fn prop_recompaction_is_bit_identical(batch in arb_batch()) {
        let events: Vec<Value> = batch.iter().map(|(_, event)| event.clone()).collect();

        let (out_a, err_a) = compact_events(events.clone(), None);
        let (out_b, err_b) = compact_events(events, None);

        prop_assert_eq!(out_a, out_b);
        prop_assert_eq!(err_a, err_b);
    }
}

// Exactly one compacted event per distinct entity among deduplicated
// valid records, and exactly one error per malformed record.
proptest! {
    #[test]
    fn prop_one_output_per_entity_one_error_per_malformed(batch in arb_batch()) {
        let malformed = batch.iter().filter(|(ok, _)| !ok).count();
        let entities = expected_entities(&batch);
        let events: Vec<Value> = batch.iter().map(|(_, event)| event.clone()).collect();

        let (compacted, errors) = compact_events(events, None);

        prop_assert_eq!(errors.len(), malformed);
        prop_assert_eq!(compacted.len(), entities.len());

        let output_entities: HashSet<String> = compacted
            .iter()
            .map(|event| event.entity_id.clone())
            .collect();
        prop_assert_eq!(output_entities, entities);
    }
}

// Output is sorted ascending by (ts, entity_id).
proptest! {
    #[test]
    fn prop_output_is_sorted(batch in arb_batch()) {
        let events: Vec<Value> = batch.iter().map(|(_, event)| event.clone()).collect();
        let (compacted, _) = compact_events(events, None);

        for pair in compacted.windows(2) {
            prop_assert!(
                (pair[0].ts.as_str(), pair[0].entity_id.as_str())
                    <= (pair[1].ts.as_str(), pair[1].entity_id.as_str())
            );
        }
    }
}

// Every derived identifier is 16 lowercase hex characters, and payload
// presence matches the final op.
proptest! {
    #[test]
    fn prop_output_shape(batch in arb_batch()) {
        let events: Vec<Value> = batch.iter().map(|(_, event)| event.clone()).collect();
        let (compacted, _) = compact_events(events, None);

        for event in &compacted {
            prop_assert_eq!(event.event_id.len(), 16);
            prop_assert!(event
                .event_id
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

            match event.op {
                Op::Upsert => prop_assert!(event.payload.is_some()),
                Op::Delete => prop_assert!(event.payload.is_none()),
            }
        }
    }
}
