//! Message framing for newline-delimited JSON.

use serde::Serialize;

use crate::types::{EnrichRequest, ServerError, ServerResult};

/// Parse a single line of text as an enrichment request.
pub fn parse_request(line: &str) -> ServerResult<EnrichRequest> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ServerError::InvalidInput("Empty message".to_string()));
    }

    Ok(serde_json::from_str(trimmed)?)
}

/// Serialize a value to a JSON line (with trailing newline).
pub fn frame_message<T: Serialize>(value: &T) -> ServerResult<String> {
    let mut json = serde_json::to_string(value)?;
    json.push('\n');
    Ok(json)
}
