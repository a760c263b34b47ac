//! Enrichment clients backing the server.

pub mod fixture;
pub mod google;

use std::path::Path;
use std::sync::Arc;

use itinerary_enrich::PlaceLookup;

use crate::config::{resolve_api_key, Settings};
use crate::types::{ServerError, ServerResult};

pub use fixture::FixtureClient;
pub use google::PlacesClient;

/// Pick the client for this process: fixtures when given, otherwise the
/// Places API with a resolved key.
pub fn client_from_settings(
    settings: &Settings,
    fixtures: Option<&Path>,
    api_key: Option<&str>,
) -> ServerResult<Arc<dyn PlaceLookup>> {
    if let Some(path) = fixtures {
        return Ok(Arc::new(FixtureClient::load(path)?));
    }

    let key = resolve_api_key(api_key, settings).ok_or(ServerError::MissingApiKey)?;
    tracing::info!("Using Places API at {}", settings.places.endpoint);
    Ok(Arc::new(PlacesClient::new(
        &settings.places,
        key,
        settings.enrich.per_call_timeout,
    )?))
}
