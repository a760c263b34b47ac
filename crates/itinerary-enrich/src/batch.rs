//! Batch enrichment: one client call per unique query under bounded concurrency.
//!
//! Queries are offered to the pool in first-seen order and at most
//! `concurrency_limit` lookups are in flight; the rest wait in FIFO order.
//! Completion order is unspecified. Every unique query ends with exactly one
//! cache entry, success or failure, even when the run is cancelled or its
//! deadline passes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::cache::EnrichmentCache;
use crate::cancel::CancelSignal;
use crate::client::PlaceLookup;
use crate::config::EnrichConfig;
use crate::dedup::{UniqueQuery, UniqueQuerySet};
use crate::types::{EnrichResult, EnrichmentFailure, EnrichmentResult, GeoPoint, PlaceRecord};

/// Counters for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Unique queries for which the client was called at least once.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Total occurrences minus unique queries.
    pub calls_saved: usize,
    /// Every client call, retries included.
    pub client_attempts: usize,
}

/// Completed cache plus its summary.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub cache: EnrichmentCache,
    pub summary: BatchSummary,
}

/// Drives the client for every unique query in a [`UniqueQuerySet`].
pub struct BatchEnricher<'a, C: PlaceLookup + ?Sized> {
    client: &'a C,
    config: &'a EnrichConfig,
    cancel: Option<CancelSignal>,
}

impl<'a, C: PlaceLookup + ?Sized> BatchEnricher<'a, C> {
    pub fn new(client: &'a C, config: &'a EnrichConfig) -> Self {
        Self {
            client,
            config,
            cancel: None,
        }
    }

    /// Abandon in-flight and pending lookups when `signal` fires.
    pub fn with_cancel(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }

    /// Fetch every unique query and assemble the cache.
    pub async fn run(&self, set: &UniqueQuerySet) -> EnrichResult<BatchOutcome> {
        let limit = self.config.effective_concurrency();
        let ctx = FetchContext {
            client: self.client,
            config: self.config,
            gate: RateGate::new(self.config.rate.min_interval),
            calls_made: AtomicUsize::new(0),
            deadline: self.config.run_timeout.map(|t| Instant::now() + t),
            cancel: self.cancel.clone(),
        };

        tracing::info!(
            "Enriching {} unique queries via {} (concurrency {limit})",
            set.len(),
            self.client.name()
        );

        let fetches: Vec<_> = set.iter().map(|entry| ctx.fetch(entry)).collect();
        let results: Vec<EnrichmentResult> = stream::iter(fetches)
            .buffer_unordered(limit)
            .collect()
            .await;

        let mut cache = EnrichmentCache::with_capacity(results.len());
        let mut summary = BatchSummary {
            calls_saved: set.calls_saved(),
            ..BatchSummary::default()
        };

        for result in results {
            if result.attempts > 0 {
                summary.attempted += 1;
            }
            summary.client_attempts += result.attempts as usize;
            if result.is_success() {
                summary.succeeded += 1;
            } else {
                summary.failed += 1;
            }
            cache.insert(result)?;
        }

        tracing::info!(
            "Batch complete: attempted={} succeeded={} failed={} calls_saved={}",
            summary.attempted,
            summary.succeeded,
            summary.failed,
            summary.calls_saved
        );

        Ok(BatchOutcome { cache, summary })
    }
}

struct FetchContext<'a, C: PlaceLookup + ?Sized> {
    client: &'a C,
    config: &'a EnrichConfig,
    gate: RateGate,
    calls_made: AtomicUsize,
    deadline: Option<Instant>,
    cancel: Option<CancelSignal>,
}

impl<C: PlaceLookup + ?Sized> FetchContext<'_, C> {
    async fn fetch(&self, entry: &UniqueQuery) -> EnrichmentResult {
        let query = entry.query.as_str();
        let hint = entry.hint.or(self.config.default_hint);
        let retry = &self.config.retry;
        let mut attempts = 0u32;

        let outcome = loop {
            if let Some(reason) = self.abort_reason() {
                break Err(EnrichmentFailure::timeout(reason));
            }

            if !self.reserve_call() {
                break Err(EnrichmentFailure::quota_exceeded(format!(
                    "per-run call budget of {} exhausted",
                    self.config.rate.max_calls.unwrap_or_default()
                )));
            }

            // Abandoned while waiting for a rate slot: no call was made.
            let gated = tokio::select! {
                _ = self.gate.wait() => None,
                reason = self.aborted() => Some(reason),
            };
            if let Some(reason) = gated {
                self.release_call();
                break Err(EnrichmentFailure::timeout(reason));
            }

            attempts += 1;
            tracing::debug!("Looking up {query:?} (attempt {attempts})");
            let result = tokio::select! {
                biased;
                r = self.call(query, hint) => r,
                reason = self.aborted() => Err(EnrichmentFailure::timeout(reason)),
            };

            match result {
                Ok(record) => break Ok(record),
                Err(failure) if self.abort_reason().is_some() => break Err(failure),
                Err(failure) if failure.kind.is_transient() && attempts <= retry.max_retries => {
                    let delay = retry.delay_for_retry(attempts);
                    tracing::warn!(
                        "Lookup for {query:?} failed ({failure}); retry {attempts}/{} in {}ms",
                        retry.max_retries,
                        delay.as_millis()
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        reason = self.aborted() => break Err(EnrichmentFailure::timeout(reason)),
                    }
                }
                Err(failure) => break Err(failure),
            }
        };

        match &outcome {
            Ok(_) => tracing::debug!("Enriched {query:?} after {attempts} attempt(s)"),
            Err(failure) => tracing::warn!("Lookup for {query:?} failed: {failure}"),
        }

        EnrichmentResult {
            query: entry.query.clone(),
            outcome,
            attempts,
        }
    }

    async fn call(
        &self,
        query: &str,
        hint: Option<GeoPoint>,
    ) -> Result<PlaceRecord, EnrichmentFailure> {
        let timeout = self.config.per_call_timeout;
        match tokio::time::timeout(timeout, self.client.lookup(query, hint)).await {
            Ok(result) => result,
            Err(_) => Err(EnrichmentFailure::timeout(format!(
                "lookup exceeded {}ms",
                timeout.as_millis()
            ))),
        }
    }

    fn reserve_call(&self) -> bool {
        match self.config.rate.max_calls {
            None => true,
            Some(max) => self
                .calls_made
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    (n < max).then_some(n + 1)
                })
                .is_ok(),
        }
    }

    /// Return a budget unit reserved for a call that never started.
    fn release_call(&self) {
        if self.config.rate.max_calls.is_some() {
            self.calls_made.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn abort_reason(&self) -> Option<&'static str> {
        if self.cancel.as_ref().is_some_and(|c| c.is_cancelled()) {
            return Some("run cancelled");
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Some("run deadline exceeded");
        }
        None
    }

    /// Resolves when the run is cancelled or its deadline passes.
    async fn aborted(&self) -> &'static str {
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        let cancelled = async {
            match &self.cancel {
                Some(c) => c.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = deadline => "run deadline exceeded",
            _ = cancelled => "run cancelled",
        }
    }
}

/// Spaces out call starts across all workers.
struct RateGate {
    min_interval: Option<Duration>,
    next_slot: Mutex<Option<Instant>>,
}

impl RateGate {
    fn new(min_interval: Option<Duration>) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    async fn wait(&self) {
        let Some(interval) = self.min_interval else {
            return;
        };
        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = next.map_or(now, |n| n.max(now));
            *next = Some(slot + interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }
}
