//! Request and response bodies shared by the stdio and HTTP transports.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use itinerary_enrich::{EnrichConfig, QueryPath};

/// One enrichment request: the raw itinerary plus optional run overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct EnrichRequest {
    pub document: Value,
    #[serde(default)]
    pub config: Option<EnrichConfig>,
}

/// Dry-run report of what a run would fetch.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub total_occurrences: usize,
    pub unique_queries: usize,
    pub calls_saved: usize,
    pub queries: Vec<PlannedQuery>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedQuery {
    pub query: String,
    pub categories: Vec<String>,
    pub paths: Vec<QueryPath>,
}
