//! Run orchestration: extract, deduplicate, fetch, project.

use std::time::Instant;

use serde::Serialize;
use serde_json::Value;

use crate::batch::BatchEnricher;
use crate::cache::EnrichmentCache;
use crate::cancel::CancelSignal;
use crate::client::PlaceLookup;
use crate::config::EnrichConfig;
use crate::dedup::UniqueQuerySet;
use crate::extract::extract_occurrences;
use crate::project::project;
use crate::types::{
    EnrichResult, ExtractionError, ProjectionError, QueryOutcome, QueryStatus, RunStats,
};

/// The enriched document together with the run's statistics.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedDocument {
    pub document: Value,
    pub stats: RunStats,
}

/// Extract and deduplicate without contacting any service.
pub fn plan(document: &Value) -> Result<UniqueQuerySet, ExtractionError> {
    let occurrences = extract_occurrences(document)?;
    Ok(UniqueQuerySet::from_occurrences(&occurrences))
}

/// Enrich `document` using `client`.
///
/// Per-query lookup failures never fail the run; they are listed in
/// [`RunStats::outcomes`] and the affected nodes carry no `place_data`.
pub async fn enrich<C: PlaceLookup + ?Sized>(
    document: &Value,
    client: &C,
    config: &EnrichConfig,
) -> EnrichResult<EnrichedDocument> {
    run(document, client, config, None).await
}

/// Like [`enrich`], abandoning outstanding lookups when `cancel` fires.
pub async fn enrich_with_cancel<C: PlaceLookup + ?Sized>(
    document: &Value,
    client: &C,
    config: &EnrichConfig,
    cancel: CancelSignal,
) -> EnrichResult<EnrichedDocument> {
    run(document, client, config, Some(cancel)).await
}

async fn run<C: PlaceLookup + ?Sized>(
    document: &Value,
    client: &C,
    config: &EnrichConfig,
    cancel: Option<CancelSignal>,
) -> EnrichResult<EnrichedDocument> {
    let run_id = uuid::Uuid::new_v4();
    let started_at = chrono::Utc::now();
    let clock = Instant::now();

    let set = plan(document)?;
    tracing::info!(
        "Run {run_id}: {} occurrences, {} unique queries",
        set.total_occurrences(),
        set.len()
    );

    let mut enricher = BatchEnricher::new(client, config);
    if let Some(signal) = cancel {
        enricher = enricher.with_cancel(signal);
    }
    let batch = enricher.run(&set).await?;

    let document = project(document, &set, &batch.cache)?;
    let outcomes = outcomes(&set, &batch.cache)?;

    let stats = RunStats {
        run_id,
        started_at,
        elapsed_ms: clock.elapsed().as_millis() as u64,
        total_occurrences: set.total_occurrences(),
        unique_queries: set.len(),
        attempted: batch.summary.attempted,
        succeeded: batch.summary.succeeded,
        failed: batch.summary.failed,
        calls_saved: batch.summary.calls_saved,
        client_attempts: batch.summary.client_attempts,
        outcomes,
    };

    tracing::info!(
        "Run {run_id} finished in {}ms: {} succeeded, {} failed, {} calls saved",
        stats.elapsed_ms,
        stats.succeeded,
        stats.failed,
        stats.calls_saved
    );

    Ok(EnrichedDocument { document, stats })
}

fn outcomes(
    set: &UniqueQuerySet,
    cache: &EnrichmentCache,
) -> Result<Vec<QueryOutcome>, ProjectionError> {
    set.iter()
        .map(|entry| {
            let result = cache
                .get(&entry.query)
                .ok_or_else(|| ProjectionError::MissingResult(entry.query.clone()))?;
            let status = match &result.outcome {
                Ok(_) => QueryStatus::Succeeded,
                Err(f) => QueryStatus::Failed {
                    kind: f.kind,
                    detail: f.detail.clone(),
                },
            };
            Ok(QueryOutcome {
                query: entry.query.clone(),
                occurrences: entry.paths.len(),
                categories: entry.categories.clone(),
                attempts: result.attempts,
                status,
            })
        })
        .collect()
}
