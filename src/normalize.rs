//! Raw-record validation — the boundary where untyped input becomes typed.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::error::NormalizeError;
use crate::event::{NormalizedEvent, Op};

const REQUIRED_FIELDS: [&str; 4] = ["event_id", "entity_id", "op", "ts"];

/// Parse one raw record into a [`NormalizedEvent`].
///
/// Required fields are `event_id`, `entity_id`, `op`, and `ts`. Scalar
/// identifiers are coerced to their string form and trimmed; `op` synonyms
/// `create`/`update`/`upsert` collapse to [`Op::Upsert`]. Timestamps accept
/// epoch seconds (integer or fractional), ISO-8601 with a `Z` suffix or an
/// explicit UTC offset, and naive `YYYY-MM-DD HH:MM:SS` treated as UTC.
///
/// # Errors
///
/// Returns the matching [`NormalizeError`] kind: missing/blank required
/// fields, unrecognized op, unparsable timestamp, non-integer version, or
/// non-mapping payload. Errors are values — callers collect them and keep
/// going; nothing here panics on bad input.
///
/// # Examples
///
/// ```
/// use eventcompact::{normalize, NormalizeError};
/// use serde_json::json;
///
/// let err = normalize(&json!({
///     "event_id": "e1",
///     "entity_id": "u1",
///     "op": "weird",
///     "ts": 1735689600,
/// }))
/// .unwrap_err();
///
/// assert!(matches!(err, NormalizeError::InvalidOp(_)));
/// ```
pub fn normalize(raw: &Value) -> Result<NormalizedEvent, NormalizeError> {
    let Some(obj) = raw.as_object() else {
        // Not a mapping at all: report every required field as missing
        // rather than faulting the batch.
        return Err(NormalizeError::MissingFields(
            REQUIRED_FIELDS.iter().map(|f| (*f).to_string()).collect(),
        ));
    };

    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|f| !obj.contains_key(**f))
        .map(|f| (*f).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(NormalizeError::MissingFields(missing));
    }

    let event_id = coerce_str(&obj["event_id"]);
    let entity_id = coerce_str(&obj["entity_id"]);
    let blank: Vec<String> = [("event_id", &event_id), ("entity_id", &entity_id)]
        .iter()
        .filter(|(_, v)| v.is_empty())
        .map(|(k, _)| (*k).to_string())
        .collect();
    if !blank.is_empty() {
        return Err(NormalizeError::MissingFields(blank));
    }

    let op_raw = coerce_str(&obj["op"]);
    let op = match op_raw.to_lowercase().as_str() {
        "create" | "update" | "upsert" => Op::Upsert,
        "delete" => Op::Delete,
        _ => return Err(NormalizeError::InvalidOp(op_raw)),
    };

    let ts = parse_ts(&obj["ts"])
        .ok_or_else(|| NormalizeError::InvalidTimestamp(obj["ts"].to_string()))?;

    let version = match obj.get("version") {
        None | Some(Value::Null) => None,
        Some(v) => {
            Some(coerce_version(v).ok_or_else(|| NormalizeError::InvalidVersion(v.to_string()))?)
        }
    };

    let payload = match obj.get("payload") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(map.clone()),
        Some(other) => return Err(NormalizeError::InvalidPayload(other.to_string())),
    };

    Ok(NormalizedEvent {
        event_id,
        entity_id,
        op,
        ts,
        version,
        payload,
    })
}

/// String form of a scalar field: strings are trimmed, other scalars keep
/// their JSON text. Null coerces to empty (and is then reported missing).
fn coerce_str(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Integer form of a version field: integer numbers as-is, floats
/// truncated toward zero, numeric strings parsed after trimming.
fn coerce_version(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Timestamp parsing, first match wins: numeric epoch seconds, then the
/// `Z`-suffix ISO patterns (fractional before whole-second), then RFC 3339
/// with an explicit offset, then naive `YYYY-MM-DD HH:MM:SS` as UTC.
fn parse_ts(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                DateTime::from_timestamp(secs, 0)
            } else {
                let f = n.as_f64()?;
                let secs = f.floor();
                let nanos = ((f - secs) * 1e9) as u32;
                DateTime::from_timestamp(secs as i64, nanos.min(999_999_999))
            }
        }
        Value::String(s) => parse_ts_str(s.trim()),
        _ => None,
    }
}

fn parse_ts_str(s: &str) -> Option<DateTime<Utc>> {
    if let Some(stripped) = s.strip_suffix('Z') {
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(stripped, fmt) {
                return Some(dt.and_utc());
            }
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc())
}
