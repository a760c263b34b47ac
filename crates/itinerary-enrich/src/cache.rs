//! Write-once result cache keyed by exact query string.

use std::collections::HashMap;

use crate::types::{CacheError, EnrichmentResult};

/// One [`EnrichmentResult`] per unique query, populated once per run.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentCache {
    entries: HashMap<String, EnrichmentResult>,
}

impl EnrichmentCache {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
        }
    }

    /// Record the result for its query. A second write for the same key is rejected.
    pub fn insert(&mut self, result: EnrichmentResult) -> Result<(), CacheError> {
        use std::collections::hash_map::Entry;

        match self.entries.entry(result.query.clone()) {
            Entry::Occupied(_) => Err(CacheError::AlreadyPopulated(result.query)),
            Entry::Vacant(slot) => {
                slot.insert(result);
                Ok(())
            }
        }
    }

    pub fn get(&self, query: &str) -> Option<&EnrichmentResult> {
        self.entries.get(query)
    }

    pub fn contains(&self, query: &str) -> bool {
        self.entries.contains_key(query)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.entries.values().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.len() - self.succeeded()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnrichmentResult)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
