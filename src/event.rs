use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The running materialized document for one entity.
///
/// Keys are field names, values are arbitrary JSON. The merge fold clones
/// state per step, so entity folds never alias each other. A `delete`
/// resets the state to an empty map.
pub type EntityState = serde_json::Map<String, Value>;

/// The change kind carried by an event.
///
/// Raw records may say `create`, `update`, or `upsert` — all three
/// normalize to [`Op::Upsert`]. Serialized lowercase.
///
/// # Examples
///
/// ```
/// use eventcompact::Op;
///
/// assert_eq!(Op::Upsert.as_str(), "upsert");
/// assert_eq!(Op::Delete.as_str(), "delete");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Upsert,
    Delete,
}

impl Op {
    /// The lowercase wire name of this op.
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Upsert => "upsert",
            Op::Delete => "delete",
        }
    }
}

/// A validated, typed change event.
///
/// Produced by [`normalize`](crate::normalize) from an untyped raw record;
/// immutable once constructed. Downstream stages (dedup, ordering, merge)
/// only ever see this form — untyped data never crosses the normalizer.
///
/// # Examples
///
/// ```
/// use eventcompact::{normalize, Op};
/// use serde_json::json;
///
/// let event = normalize(&json!({
///     "event_id": "  e1  ",
///     "entity_id": "user-1",
///     "op": "CREATE",
///     "ts": "2025-01-01T00:00:00Z",
/// }))
/// .unwrap();
///
/// assert_eq!(event.event_id, "e1");
/// assert_eq!(event.op, Op::Upsert);
/// assert_eq!(event.version, None);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[non_exhaustive]
pub struct NormalizedEvent {
    /// Producer-assigned event identifier, trimmed, never empty.
    /// Duplicates are dropped downstream; first occurrence wins.
    pub event_id: String,

    /// Identifier of the entity this event mutates, trimmed, never empty.
    pub entity_id: String,

    /// Normalized change kind.
    pub op: Op,

    /// Absolute UTC instant the producer stamped on the event.
    pub ts: DateTime<Utc>,

    /// Optional logical clock. When any event in an entity's group carries
    /// one, version dominates wall-clock time for ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,

    /// Optional document or patch. Only consulted for upserts, but
    /// validated (must be a mapping) on every op.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<EntityState>,
}

/// One compacted output event — the final state of a single entity.
///
/// `event_id` is derived, not producer-assigned: the first 16 lowercase
/// hex characters of a SHA-256 over the entity's final
/// `(entity_id, timestamp-second, version, op)`. Identical inputs always
/// recompact to an identical identifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[non_exhaustive]
pub struct CompactedEvent {
    /// Derived identifier, 16 lowercase hex characters.
    pub event_id: String,

    /// The entity this event describes.
    pub entity_id: String,

    /// Final op: `upsert` if the entity survived the fold, `delete` if a
    /// delete came last in the chosen order.
    pub op: Op,

    /// Maximum timestamp seen in the entity's group, as a fixed-width
    /// ISO-8601 UTC string with microseconds and a `Z` suffix. Fixed
    /// width keeps lexicographic order monotonic with real time.
    pub ts: String,

    /// Fully merged state. Present exactly when `op` is `upsert`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<EntityState>,
}
