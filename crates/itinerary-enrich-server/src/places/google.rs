//! Places Text Search client over reqwest.
//!
//! One POST per lookup. HTTP and payload errors are folded into the
//! `FailureKind` classes the batch enricher understands.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use itinerary_enrich::{EnrichmentFailure, GeoPoint, PlaceLookup, PlaceRecord};

use crate::config::PlacesSettings;
use crate::types::{ServerError, ServerResult};

/// Fields requested from the service.
const FIELD_MASK: &str = "places.id,places.displayName,places.formattedAddress,\
places.location,places.rating,places.userRatingCount,places.photos,\
places.regularOpeningHours,places.priceLevel";

/// Places Text Search lookup.
#[derive(Clone)]
pub struct PlacesClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    language: Option<String>,
    bias_radius_m: f64,
}

impl PlacesClient {
    /// Create a client. `timeout` bounds each HTTP request.
    pub fn new(
        settings: &PlacesSettings,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> ServerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("itinerary-enrich/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ServerError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: api_key.into(),
            language: settings.language.clone(),
            bias_radius_m: settings.bias_radius_m,
        })
    }

    fn request_body<'a>(&'a self, query: &'a str, hint: Option<GeoPoint>) -> SearchRequest<'a> {
        SearchRequest {
            text_query: query,
            language_code: self.language.as_deref(),
            max_result_count: 1,
            location_bias: hint.map(|p| LocationBias {
                circle: Circle {
                    center: LatLng {
                        latitude: p.lat,
                        longitude: p.lng,
                    },
                    radius: self.bias_radius_m,
                },
            }),
        }
    }
}

#[async_trait]
impl PlaceLookup for PlacesClient {
    async fn lookup(
        &self,
        query: &str,
        hint: Option<GeoPoint>,
    ) -> Result<PlaceRecord, EnrichmentFailure> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", FIELD_MASK)
            .json(&self.request_body(query, hint))
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = resp.status().as_u16();
        let body = resp
            .text()
            .await
            .map_err(|e| EnrichmentFailure::transport(format!("reading response: {e}")))?;

        if !(200..300).contains(&status) {
            return Err(classify_status(status, &body));
        }

        let parsed: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| EnrichmentFailure::transport(format!("malformed response: {e}")))?;

        parsed
            .places
            .into_iter()
            .next()
            .map(Place::into_record)
            .ok_or_else(|| EnrichmentFailure::not_found(format!("no results for {query:?}")))
    }

    fn name(&self) -> &str {
        "places"
    }
}

fn classify_send_error(e: reqwest::Error) -> EnrichmentFailure {
    if e.is_timeout() {
        EnrichmentFailure::timeout(format!("request timed out: {e}"))
    } else {
        EnrichmentFailure::transport(e.to_string())
    }
}

fn classify_status(status: u16, body: &str) -> EnrichmentFailure {
    let error = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error)
        .unwrap_or_default();
    let message = if error.message.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", error.message)
    };

    match status {
        404 => EnrichmentFailure::not_found(message),
        429 => EnrichmentFailure::quota_exceeded(message),
        _ if error.status == "RESOURCE_EXHAUSTED" => EnrichmentFailure::quota_exceeded(message),
        _ => EnrichmentFailure::transport(message),
    }
}

fn price_level(level: &str) -> Option<u8> {
    match level {
        "PRICE_LEVEL_FREE" => Some(0),
        "PRICE_LEVEL_INEXPENSIVE" => Some(1),
        "PRICE_LEVEL_MODERATE" => Some(2),
        "PRICE_LEVEL_EXPENSIVE" => Some(3),
        "PRICE_LEVEL_VERY_EXPENSIVE" => Some(4),
        _ => None,
    }
}

// ─── wire types ───

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    text_query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    language_code: Option<&'a str>,
    max_result_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    location_bias: Option<LocationBias>,
}

#[derive(Serialize)]
struct LocationBias {
    circle: Circle,
}

#[derive(Serialize)]
struct Circle {
    center: LatLng,
    radius: f64,
}

#[derive(Serialize, Deserialize)]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize, Default)]
struct SearchResponse {
    #[serde(default)]
    places: Vec<Place>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Place {
    id: Option<String>,
    display_name: Option<LocalizedText>,
    formatted_address: Option<String>,
    location: Option<LatLng>,
    rating: Option<f32>,
    user_rating_count: Option<u32>,
    #[serde(default)]
    photos: Vec<Photo>,
    regular_opening_hours: Option<OpeningHours>,
    price_level: Option<String>,
}

#[derive(Deserialize)]
struct LocalizedText {
    text: String,
}

#[derive(Deserialize)]
struct Photo {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpeningHours {
    #[serde(default)]
    weekday_descriptions: Vec<String>,
}

#[derive(Deserialize, Default)]
struct ErrorEnvelope {
    #[serde(default)]
    error: ErrorBody,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl Place {
    fn into_record(self) -> PlaceRecord {
        PlaceRecord {
            place_id: self.id,
            name: self.display_name.map(|t| t.text).unwrap_or_default(),
            address: self.formatted_address,
            location: self.location.map(|l| GeoPoint {
                lat: l.latitude,
                lng: l.longitude,
            }),
            rating: self.rating,
            user_ratings_total: self.user_rating_count,
            photo_refs: self.photos.into_iter().map(|p| p.name).collect(),
            opening_hours: self
                .regular_opening_hours
                .map(|h| h.weekday_descriptions)
                .unwrap_or_default(),
            price_level: self.price_level.as_deref().and_then(price_level),
        }
    }
}
