use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why a raw record failed normalization.
///
/// Every kind is per-record and non-fatal to the batch:
/// [`compact_events`](crate::compact_events) collects failures into
/// [`RejectedEvent`]s and keeps processing the rest of the input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// One or more of `event_id`, `entity_id`, `op`, `ts` is absent, or
    /// an identifier is blank after trimming.
    #[error("missing required fields: {0:?}")]
    MissingFields(Vec<String>),

    /// `op` is not one of `create`, `update`, `upsert`, `delete`
    /// (case-insensitive).
    #[error("invalid op: {0}")]
    InvalidOp(String),

    /// `ts` is neither epoch seconds nor an accepted ISO-8601 form.
    #[error("invalid ts format: {0}")]
    InvalidTimestamp(String),

    /// `version` is present and non-null but not integer-coercible.
    #[error("version must be an integer, got {0}")]
    InvalidVersion(String),

    /// `payload` is present and non-null but not a mapping.
    #[error("payload must be a mapping when present, got {0}")]
    InvalidPayload(String),
}

/// A raw record the pipeline rejected, handed back to the caller as-is.
///
/// Whether any rejections make the whole batch a failure is the caller's
/// decision; the compactor itself never aborts on them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RejectedEvent {
    /// The original raw record, untouched.
    pub event: Value,

    /// Human-readable reason, e.g. `malformed: invalid op: weird`.
    pub reason: String,
}
