//! The compaction pipeline: normalize, dedup, group, order, fold, emit.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::RejectedEvent;
use crate::event::{CompactedEvent, EntityState, NormalizedEvent, Op};
use crate::merge::merge_state;
use crate::normalize::normalize;

/// Compact a batch of raw change events into one final event per entity.
///
/// Events are consumed once, in iteration order. Malformed records are
/// collected into the returned error list — they never abort the batch.
/// Duplicate `event_id`s keep their first occurrence in encounter order
/// and drop the rest silently (redelivery is expected, not malformed).
///
/// `prior_state` seeds each entity's fold with an externally supplied
/// baseline document; entities that appear only in `prior_state` produce
/// no output.
///
/// The whole call is pure given its inputs: the same events and prior
/// state always produce bit-identical output, derived `event_id`s
/// included. Output is sorted ascending by `(ts, entity_id)`.
///
/// # Examples
///
/// ```
/// use eventcompact::compact_events;
/// use serde_json::json;
///
/// let events = vec![
///     json!({"event_id": "a1", "entity_id": "u1", "op": "upsert",
///            "ts": "2025-01-01T00:00:00Z", "payload": {"x": 1}}),
///     json!({"event_id": "a2", "entity_id": "u1", "op": "update",
///            "ts": "2025-01-01T00:00:01Z", "payload": {"$set": {"y": 2}}}),
/// ];
///
/// let (compacted, errors) = compact_events(events, None);
/// assert!(errors.is_empty());
/// assert_eq!(compacted.len(), 1);
///
/// let payload = compacted[0].payload.as_ref().unwrap();
/// assert_eq!(payload["x"], 1);
/// assert_eq!(payload["y"], 2);
/// ```
pub fn compact_events<I>(
    events: I,
    prior_state: Option<&HashMap<String, EntityState>>,
) -> (Vec<CompactedEvent>, Vec<RejectedEvent>)
where
    I: IntoIterator<Item = Value>,
{
    let mut errors = Vec::new();
    let mut seen_event_ids = HashSet::new();
    let mut groups: BTreeMap<String, Vec<NormalizedEvent>> = BTreeMap::new();

    for raw in events {
        let event = match normalize(&raw) {
            Ok(event) => event,
            Err(err) => {
                log::warn!("rejecting event: {err}");
                errors.push(RejectedEvent {
                    event: raw,
                    reason: format!("malformed: {err}"),
                });
                continue;
            }
        };

        if !seen_event_ids.insert(event.event_id.clone()) {
            log::debug!("dropping duplicate event_id {}", event.event_id);
            continue;
        }

        groups
            .entry(event.entity_id.clone())
            .or_default()
            .push(event);
    }

    let mut compacted: Vec<CompactedEvent> = Vec::with_capacity(groups.len());

    for (entity_id, mut group) in groups {
        order_group(&mut group);
        let prior = prior_state.and_then(|state| state.get(&entity_id));
        // Empty groups cannot occur post-dedup; skip rather than panic.
        let Some(outcome) = fold_group(&group, prior) else {
            continue;
        };
        compacted.push(emit(entity_id, outcome));
    }

    compacted.sort_by(|a, b| {
        (a.ts.as_str(), a.entity_id.as_str()).cmp(&(b.ts.as_str(), b.entity_id.as_str()))
    });

    (compacted, errors)
}

/// Version is a logical clock and dominates wall-clock time whenever any
/// event in the group carries one; version-less events in a mixed group
/// sort as -1. The sort is stable, so original sequence position breaks
/// any remaining ties.
fn order_group(group: &mut [NormalizedEvent]) {
    if group.iter().any(|event| event.version.is_some()) {
        group.sort_by_key(|event| (event.version.unwrap_or(-1), event.ts));
    } else {
        group.sort_by_key(|event| event.ts);
    }
}

struct FoldOutcome {
    state: EntityState,
    last_ts: DateTime<Utc>,
    last_version: Option<i64>,
    last_op: Op,
}

/// Fold an ordered entity group into its final state.
///
/// `last_ts` is the running max across the group, not the timestamp of the
/// last event in the chosen order. `last_version` follows the most
/// recently processed versioned event; duplicate versions fold through
/// sequentially with no special handling.
fn fold_group(group: &[NormalizedEvent], prior: Option<&EntityState>) -> Option<FoldOutcome> {
    let mut state = prior.cloned().unwrap_or_default();
    let mut last_ts: Option<DateTime<Utc>> = None;
    let mut last_version = None;
    let mut last_op = None;

    for event in group {
        if event.version.is_some() {
            last_version = event.version;
        }
        last_ts = Some(last_ts.map_or(event.ts, |ts| ts.max(event.ts)));

        match event.op {
            Op::Delete => {
                state = EntityState::new();
                last_op = Some(Op::Delete);
            }
            Op::Upsert => {
                state = merge_state(&state, event.payload.as_ref());
                last_op = Some(Op::Upsert);
            }
        }
    }

    Some(FoldOutcome {
        state,
        last_ts: last_ts?,
        last_version,
        last_op: last_op?,
    })
}

fn emit(entity_id: String, outcome: FoldOutcome) -> CompactedEvent {
    let event_id = derive_event_id(
        &entity_id,
        outcome.last_ts,
        outcome.last_version,
        outcome.last_op,
    );
    let ts = outcome.last_ts.to_rfc3339_opts(SecondsFormat::Micros, true);
    let payload = match outcome.last_op {
        Op::Upsert => Some(outcome.state),
        Op::Delete => None,
    };

    CompactedEvent {
        event_id,
        entity_id,
        op: outcome.last_op,
        ts,
        payload,
    }
}

/// Derive the compacted identifier: SHA-256 over the `|`-joined tag of
/// `(entity_id, floor(last_ts seconds), version-or-empty, op)`, truncated
/// to 16 lowercase hex characters. A pure function of its inputs, so
/// recompaction and redelivery reproduce the same identifier.
fn derive_event_id(
    entity_id: &str,
    last_ts: DateTime<Utc>,
    last_version: Option<i64>,
    last_op: Op,
) -> String {
    let version = last_version.map(|v| v.to_string()).unwrap_or_default();
    let tag = format!(
        "{}|{}|{}|{}",
        entity_id,
        last_ts.timestamp(),
        version,
        last_op.as_str()
    );

    let mut hasher = Sha256::new();
    hasher.update(tag.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
