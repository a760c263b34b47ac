//! itinerary-enrich: a deduplicating place-enrichment cache for itinerary documents.
//!
//! A run walks a nested JSON itinerary, collapses repeated `place_query`
//! strings into one lookup each, fetches them under bounded concurrency, and
//! writes the results back as `place_data` on every occurrence.

pub mod batch;
pub mod cache;
pub mod cancel;
pub mod client;
pub mod config;
pub mod dedup;
pub mod enrich;
pub mod extract;
pub mod path;
pub mod project;
pub mod types;

pub use batch::{BatchEnricher, BatchOutcome, BatchSummary};
pub use cache::EnrichmentCache;
pub use cancel::{CancelHandle, CancelSignal};
pub use client::{PlaceLookup, StaticLookup};
pub use config::{EnrichConfig, RatePolicy, RetryPolicy};
pub use dedup::{UniqueQuery, UniqueQuerySet};
pub use enrich::{enrich, enrich_with_cancel, plan, EnrichedDocument};
pub use extract::extract_occurrences;
pub use path::{PathKey, QueryPath};
pub use project::project;
pub use types::*;
