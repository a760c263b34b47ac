//! Core data types for place lookups, enrichment outcomes, and run statistics.

use serde::{Deserialize, Serialize};

use crate::path::QueryPath;

/// Document field carrying the free-text place query.
pub const QUERY_FIELD: &str = "place_query";

/// Sibling field written with the enrichment result.
pub const DATA_FIELD: &str = "place_data";

/// Optional sibling field carrying a geographic hint for the lookup.
pub const HINT_FIELD: &str = "place_hint";

/// Optional sibling field carrying the occurrence category.
pub const CATEGORY_FIELD: &str = "category";

/// Category used when neither the node nor its path names one.
pub const UNKNOWN_CATEGORY: &str = "unknown";

/// A latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// One usage site of a place query inside the document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryOccurrence {
    pub query: String,
    pub path: QueryPath,
    pub kind: String,
    pub hint: Option<GeoPoint>,
}

/// Structured place metadata returned by an enrichment client.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_ratings_total: Option<u32>,
    #[serde(default)]
    pub photo_refs: Vec<String>,
    #[serde(default)]
    pub opening_hours: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_level: Option<u8>,
}

/// Failure classes reported by an enrichment client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    QuotaExceeded,
    Transport,
    Timeout,
}

impl FailureKind {
    /// Whether a retry may plausibly succeed.
    pub fn is_transient(self) -> bool {
        matches!(self, FailureKind::Transport | FailureKind::Timeout)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::NotFound => "not_found",
            FailureKind::QuotaExceeded => "quota_exceeded",
            FailureKind::Transport => "transport",
            FailureKind::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, per-query lookup failure.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{kind}: {detail}")]
pub struct EnrichmentFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl EnrichmentFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::NotFound, detail)
    }

    pub fn quota_exceeded(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::QuotaExceeded, detail)
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Transport, detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(FailureKind::Timeout, detail)
    }
}

/// The single answer recorded for one unique query in one run.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResult {
    pub query: String,
    pub outcome: Result<PlaceRecord, EnrichmentFailure>,
    /// Client calls made for this query, retries included.
    pub attempts: u32,
}

impl EnrichmentResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Per-query status as exposed in run statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QueryStatus {
    Succeeded,
    Failed { kind: FailureKind, detail: String },
}

/// Observability record for one unique query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub query: String,
    pub occurrences: usize,
    pub categories: Vec<String>,
    pub attempts: u32,
    #[serde(flatten)]
    pub status: QueryStatus,
}

/// Summary of a single enrichment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub run_id: uuid::Uuid,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub elapsed_ms: u64,
    pub total_occurrences: usize,
    pub unique_queries: usize,
    /// Unique queries for which the client was called at least once.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub calls_saved: usize,
    /// Every client call, retries included.
    pub client_attempts: usize,
    pub outcomes: Vec<QueryOutcome>,
}

impl RunStats {
    /// Outcomes that did not succeed, in first-seen order.
    pub fn failures(&self) -> impl Iterator<Item = &QueryOutcome> {
        self.outcomes
            .iter()
            .filter(|o| !matches!(o.status, QueryStatus::Succeeded))
    }

    pub fn outcome(&self, query: &str) -> Option<&QueryOutcome> {
        self.outcomes.iter().find(|o| o.query == query)
    }
}

/// Errors raised while walking the input document.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("Document root must be an object or array, got {0}")]
    NotAContainer(&'static str),

    #[error("Field `place_query` at {path} must be a string, got {found}")]
    NonStringQuery { path: QueryPath, found: &'static str },

    #[error("Field `place_hint` at {path} is not a {{lat, lng}} object: {reason}")]
    MalformedHint { path: QueryPath, reason: String },

    #[error("Document nesting exceeds {limit} levels at {path}")]
    TooDeep { path: QueryPath, limit: usize },
}

/// Write-back failures. Any of these means the run's invariants were broken.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("Recorded path {0} does not resolve in the document")]
    UnresolvedPath(QueryPath),

    #[error("Recorded path {0} does not point at an object")]
    NotAnObject(QueryPath),

    #[error("No cached result for query {0:?}")]
    MissingResult(String),
}

/// Write-once cache violations.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("Cache entry for query {0:?} was already populated")]
    AlreadyPopulated(String),
}

/// Run-level errors. Per-query lookup failures never surface here.
#[derive(thiserror::Error, Debug)]
pub enum EnrichError {
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Projection invariant violated: {0}")]
    ProjectionInvariant(#[from] ProjectionError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Convenience result type.
pub type EnrichResult<T> = Result<T, EnrichError>;

/// Human-readable name of a JSON value's type.
pub(crate) fn value_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
