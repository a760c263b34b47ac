//! Query extraction. Walks an itinerary document and lists every place query.
//!
//! The walk is depth-first and pre-order: a node's own query is emitted before
//! any query nested beneath it, and object fields are visited in the order
//! they appear in the source document.

use serde_json::{Map, Value};

use crate::path::{PathKey, QueryPath};
use crate::types::{
    value_kind, ExtractionError, GeoPoint, QueryOccurrence, CATEGORY_FIELD, DATA_FIELD,
    HINT_FIELD, QUERY_FIELD, UNKNOWN_CATEGORY,
};

/// Maximum nesting depth accepted before the document is rejected.
pub const MAX_DEPTH: usize = 128;

/// Extract every query occurrence from `doc` in deterministic order.
pub fn extract_occurrences(doc: &Value) -> Result<Vec<QueryOccurrence>, ExtractionError> {
    if !matches!(doc, Value::Object(_) | Value::Array(_)) {
        return Err(ExtractionError::NotAContainer(value_kind(doc)));
    }

    let mut out = Vec::new();
    let mut path = QueryPath::root();
    walk(doc, &mut path, 0, &mut out)?;

    tracing::debug!("Extracted {} place query occurrences", out.len());
    Ok(out)
}

fn walk(
    node: &Value,
    path: &mut QueryPath,
    depth: usize,
    out: &mut Vec<QueryOccurrence>,
) -> Result<(), ExtractionError> {
    if depth > MAX_DEPTH {
        return Err(ExtractionError::TooDeep {
            path: path.clone(),
            limit: MAX_DEPTH,
        });
    }

    match node {
        Value::Object(map) => {
            if let Some(occurrence) = occurrence_at(map, path)? {
                out.push(occurrence);
            }
            for (key, child) in map {
                // Results from an earlier run are never query sources.
                if key == DATA_FIELD || !is_container(child) {
                    continue;
                }
                path.push(PathKey::Field(key.clone()));
                walk(child, path, depth + 1, out)?;
                path.pop();
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                if !is_container(child) {
                    continue;
                }
                path.push(PathKey::Index(i));
                walk(child, path, depth + 1, out)?;
                path.pop();
            }
        }
        _ => {}
    }

    Ok(())
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn occurrence_at(
    map: &Map<String, Value>,
    path: &QueryPath,
) -> Result<Option<QueryOccurrence>, ExtractionError> {
    let query = match map.get(QUERY_FIELD) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(q)) => q,
        Some(other) => {
            return Err(ExtractionError::NonStringQuery {
                path: path.clone(),
                found: value_kind(other),
            })
        }
    };

    if query.is_empty() {
        tracing::debug!("Skipping empty place query at {path}");
        return Ok(None);
    }

    let kind = match map.get(CATEGORY_FIELD) {
        Some(Value::String(c)) if !c.is_empty() => c.clone(),
        _ => path
            .last_field()
            .unwrap_or(UNKNOWN_CATEGORY)
            .to_string(),
    };

    let hint = match map.get(HINT_FIELD) {
        None | Some(Value::Null) => None,
        Some(raw) => Some(parse_hint(raw, path)?),
    };

    Ok(Some(QueryOccurrence {
        query: query.clone(),
        path: path.clone(),
        kind,
        hint,
    }))
}

fn parse_hint(raw: &Value, path: &QueryPath) -> Result<GeoPoint, ExtractionError> {
    let point: GeoPoint =
        serde_json::from_value(raw.clone()).map_err(|e| ExtractionError::MalformedHint {
            path: path.clone(),
            reason: e.to_string(),
        })?;

    if !(-90.0..=90.0).contains(&point.lat) || !(-180.0..=180.0).contains(&point.lng) {
        return Err(ExtractionError::MalformedHint {
            path: path.clone(),
            reason: format!("coordinates out of range ({}, {})", point.lat, point.lng),
        });
    }

    Ok(point)
}
