//! Result projection. Writes cached results back onto every occurrence path.
//!
//! Successful lookups are serialized once and the same value is written to
//! every path sharing the query, so duplicates carry byte-identical data.
//! Failed lookups leave their nodes without a `place_data` field at all; a
//! field left over from an earlier run is removed.

use serde_json::Value;

use crate::cache::EnrichmentCache;
use crate::dedup::UniqueQuerySet;
use crate::path::QueryPath;
use crate::types::{EnrichResult, ProjectionError, DATA_FIELD, QUERY_FIELD};

/// Project `cache` onto a copy of `doc`. The input document is never modified.
pub fn project(
    doc: &Value,
    set: &UniqueQuerySet,
    cache: &EnrichmentCache,
) -> EnrichResult<Value> {
    let mut out = doc.clone();

    for entry in set.iter() {
        let result = cache
            .get(&entry.query)
            .ok_or_else(|| ProjectionError::MissingResult(entry.query.clone()))?;

        let data = match &result.outcome {
            Ok(record) => Some(serde_json::to_value(record)?),
            Err(_) => None,
        };

        for path in &entry.paths {
            let node = node_for(&mut out, path, &entry.query)?;
            match &data {
                Some(value) => {
                    node.insert(DATA_FIELD.to_string(), value.clone());
                }
                None => {
                    node.shift_remove(DATA_FIELD);
                }
            }
        }
    }

    Ok(out)
}

fn node_for<'a>(
    doc: &'a mut Value,
    path: &QueryPath,
    query: &str,
) -> Result<&'a mut serde_json::Map<String, Value>, ProjectionError> {
    let node = path
        .resolve_mut(doc)
        .ok_or_else(|| ProjectionError::UnresolvedPath(path.clone()))?;

    let Value::Object(map) = node else {
        tracing::error!("Projection path {path} resolved to a non-object");
        return Err(ProjectionError::NotAnObject(path.clone()));
    };

    // The node must still carry the query it was extracted for.
    if map.get(QUERY_FIELD).and_then(Value::as_str) != Some(query) {
        tracing::error!("Projection path {path} no longer carries query {query:?}");
        return Err(ProjectionError::UnresolvedPath(path.clone()));
    }

    Ok(map)
}
