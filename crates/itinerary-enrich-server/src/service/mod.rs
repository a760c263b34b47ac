//! Request handling shared by every transport.

use std::sync::Arc;

use serde_json::Value;

use itinerary_enrich::{enrich, plan, EnrichConfig, EnrichedDocument, PlaceLookup};

use crate::types::{EnrichRequest, PlanReport, PlannedQuery, ServerResult};

/// Runs enrichment requests against one shared client.
#[derive(Clone)]
pub struct EnrichService {
    client: Arc<dyn PlaceLookup>,
    defaults: EnrichConfig,
}

impl EnrichService {
    pub fn new(client: Arc<dyn PlaceLookup>, defaults: EnrichConfig) -> Self {
        Self { client, defaults }
    }

    pub fn client_name(&self) -> &str {
        self.client.name()
    }

    pub fn defaults(&self) -> &EnrichConfig {
        &self.defaults
    }

    /// Merge per-request overrides with the server defaults.
    ///
    /// A request may lower concurrency but never raise it above the server's
    /// limit, and the rate policy always comes from the server.
    pub fn effective_config(&self, overrides: Option<EnrichConfig>) -> EnrichConfig {
        let Some(mut config) = overrides else {
            return self.defaults.clone();
        };

        config.concurrency_limit = config
            .effective_concurrency()
            .min(self.defaults.effective_concurrency());
        config.rate = self.defaults.rate;
        config
    }

    pub async fn enrich(&self, request: EnrichRequest) -> ServerResult<EnrichedDocument> {
        let config = self.effective_config(request.config);
        tracing::debug!(
            "Enriching with {} (concurrency {})",
            self.client.name(),
            config.effective_concurrency()
        );
        Ok(enrich(&request.document, self.client.as_ref(), &config).await?)
    }
}

/// Extract and deduplicate only; no lookups.
pub fn plan_report(document: &Value) -> ServerResult<PlanReport> {
    let set = plan(document).map_err(itinerary_enrich::EnrichError::from)?;

    Ok(PlanReport {
        total_occurrences: set.total_occurrences(),
        unique_queries: set.len(),
        calls_saved: set.calls_saved(),
        queries: set
            .iter()
            .map(|entry| PlannedQuery {
                query: entry.query.clone(),
                categories: entry.categories.clone(),
                paths: entry.paths.clone(),
            })
            .collect(),
    })
}
