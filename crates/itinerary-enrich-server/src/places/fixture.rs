//! Offline lookup from a JSON fixture file mapping query strings to records.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use itinerary_enrich::{EnrichmentFailure, GeoPoint, PlaceLookup, PlaceRecord, StaticLookup};

use crate::types::{ServerError, ServerResult};

/// Lookup answered entirely from a fixture table.
#[derive(Debug, Clone)]
pub struct FixtureClient {
    inner: StaticLookup,
}

impl FixtureClient {
    /// Load `{ "<query>": <PlaceRecord>, ... }` from `path`.
    pub fn load(path: &Path) -> ServerResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("Failed to read fixtures {}: {e}", path.display()))
        })?;
        let records: HashMap<String, PlaceRecord> = serde_json::from_str(&raw).map_err(|e| {
            ServerError::Config(format!("Invalid fixtures {}: {e}", path.display()))
        })?;

        tracing::info!("Loaded {} fixture records from {}", records.len(), path.display());
        Ok(Self {
            inner: StaticLookup::new(records),
        })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl PlaceLookup for FixtureClient {
    async fn lookup(
        &self,
        query: &str,
        hint: Option<GeoPoint>,
    ) -> Result<PlaceRecord, EnrichmentFailure> {
        self.inner.lookup(query, hint).await
    }

    fn name(&self) -> &str {
        "fixture"
    }
}
