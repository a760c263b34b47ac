//! Collapses query occurrences into a first-seen-ordered set of unique queries.

use std::collections::HashMap;

use crate::path::QueryPath;
use crate::types::{GeoPoint, QueryOccurrence};

/// Everything recorded about one distinct query string.
#[derive(Debug, Clone, PartialEq)]
pub struct UniqueQuery {
    pub query: String,
    /// Paths referencing this query, in extraction order.
    pub paths: Vec<QueryPath>,
    /// Distinct categories seen for this query, in first-seen order.
    pub categories: Vec<String>,
    /// Hint of the first occurrence that carried one.
    pub hint: Option<GeoPoint>,
}

/// Unique queries plus the paths that share each of them.
///
/// Equality is exact string equality: no trimming, case folding, or
/// normalization of any kind.
#[derive(Debug, Clone, Default)]
pub struct UniqueQuerySet {
    entries: Vec<UniqueQuery>,
    index: HashMap<String, usize>,
    total_occurrences: usize,
}

impl UniqueQuerySet {
    /// Build from an occurrence sequence, preserving first-seen order.
    pub fn from_occurrences(occurrences: &[QueryOccurrence]) -> Self {
        let mut set = Self::default();
        for occ in occurrences {
            set.record(occ);
        }

        tracing::debug!(
            "Deduplicated {} occurrences into {} unique queries",
            set.total_occurrences,
            set.entries.len()
        );
        set
    }

    fn record(&mut self, occ: &QueryOccurrence) {
        self.total_occurrences += 1;

        if let Some(&slot) = self.index.get(&occ.query) {
            let entry = &mut self.entries[slot];
            entry.paths.push(occ.path.clone());
            if !entry.categories.contains(&occ.kind) {
                entry.categories.push(occ.kind.clone());
            }
            if entry.hint.is_none() {
                entry.hint = occ.hint;
            }
            return;
        }

        self.index.insert(occ.query.clone(), self.entries.len());
        self.entries.push(UniqueQuery {
            query: occ.query.clone(),
            paths: vec![occ.path.clone()],
            categories: vec![occ.kind.clone()],
            hint: occ.hint,
        });
    }

    /// Unique queries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &UniqueQuery> {
        self.entries.iter()
    }

    /// Unique query strings in first-seen order.
    pub fn queries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.query.as_str())
    }

    pub fn get(&self, query: &str) -> Option<&UniqueQuery> {
        self.index.get(query).map(|&slot| &self.entries[slot])
    }

    /// Paths that reference `query`.
    pub fn paths(&self, query: &str) -> Option<&[QueryPath]> {
        self.get(query).map(|e| e.paths.as_slice())
    }

    pub fn contains(&self, query: &str) -> bool {
        self.index.contains_key(query)
    }

    /// Number of unique queries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_occurrences(&self) -> usize {
        self.total_occurrences
    }

    /// External calls avoided by collapsing duplicates.
    pub fn calls_saved(&self) -> usize {
        self.total_occurrences - self.entries.len()
    }
}
