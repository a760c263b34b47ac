//! Enrichment client abstraction.
//!
//! Defines the `PlaceLookup` trait the batch enricher calls once per unique
//! query, plus an in-memory implementation used for offline runs and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::types::{EnrichmentFailure, GeoPoint, PlaceRecord};

/// A service that resolves a free-text place query to a structured record.
///
/// Implementations need not be deterministic across calls. Within a run the
/// first answer returned for a query is the only one used.
#[async_trait]
pub trait PlaceLookup: Send + Sync {
    /// Look up a single query, optionally biased toward `hint`.
    async fn lookup(
        &self,
        query: &str,
        hint: Option<GeoPoint>,
    ) -> Result<PlaceRecord, EnrichmentFailure>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "place-lookup"
    }
}

#[async_trait]
impl<T: PlaceLookup + ?Sized> PlaceLookup for Arc<T> {
    async fn lookup(
        &self,
        query: &str,
        hint: Option<GeoPoint>,
    ) -> Result<PlaceRecord, EnrichmentFailure> {
        (**self).lookup(query, hint).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Lookup backed by a fixed query → record table.
///
/// Queries missing from the table fail with `NotFound`.
#[derive(Debug, Clone, Default)]
pub struct StaticLookup {
    records: HashMap<String, PlaceRecord>,
}

impl StaticLookup {
    pub fn new(records: HashMap<String, PlaceRecord>) -> Self {
        Self { records }
    }

    /// Add or replace a record, builder style.
    pub fn with(mut self, query: impl Into<String>, record: PlaceRecord) -> Self {
        self.records.insert(query.into(), record);
        self
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl PlaceLookup for StaticLookup {
    async fn lookup(
        &self,
        query: &str,
        _hint: Option<GeoPoint>,
    ) -> Result<PlaceRecord, EnrichmentFailure> {
        self.records
            .get(query)
            .cloned()
            .ok_or_else(|| EnrichmentFailure::not_found(format!("no record for {query:?}")))
    }

    fn name(&self) -> &str {
        "static"
    }
}
