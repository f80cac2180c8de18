//! Record stamping and merging.
//!
//! Every stored record carries `id`, `createdAt`, and `updatedAt`;
//! the timestamps are server-assigned and never client-writable.

use serde::Serialize;
use serde_json::{Map, Value};

/// Fields the server owns. Client-supplied values are overwritten on
/// insert and stripped from update partials.
pub const SERVER_FIELDS: &[&str] = &["createdAt", "updatedAt"];

/// A page of matching records plus the total match count.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub items: Vec<Value>,
    pub total: u64,
}

/// Offset/limit window applied after ordering.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub limit: u64,
    pub offset: u64,
}

/// Current time as an RFC 3339 / ISO-8601 string.
pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Stamp a new record body: assign `id` (uuid v4 unless the client
/// supplied one) and the server-owned timestamps.
pub fn stamp_new(body: Value) -> Value {
    let mut map = match body {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        }
    };
    let has_id = matches!(map.get("id"), Some(Value::String(s)) if !s.is_empty());
    if !has_id {
        map.insert(
            "id".to_string(),
            Value::String(uuid::Uuid::new_v4().to_string()),
        );
    }
    let now = now_rfc3339();
    map.insert("createdAt".to_string(), Value::String(now.clone()));
    map.insert("updatedAt".to_string(), Value::String(now));
    Value::Object(map)
}

/// Shallow merge: keys present in `partial` replace, all other keys are
/// preserved. `id` and `createdAt` are immutable; `updatedAt` is
/// re-stamped.
pub fn shallow_merge(existing: &Value, partial: &Value) -> Value {
    let mut merged = existing
        .as_object()
        .cloned()
        .unwrap_or_default();
    if let Value::Object(partial) = partial {
        for (key, value) in partial {
            if key == "id" || SERVER_FIELDS.contains(&key.as_str()) {
                continue;
            }
            merged.insert(key.clone(), value.clone());
        }
    }
    merged.insert("updatedAt".to_string(), Value::String(now_rfc3339()));
    Value::Object(merged)
}
