//! Integration tests for itinerary-enrich-server.
//!
//! Covers settings and fixture loading, Places API error mapping against a
//! mock server, the stdio loop, and the HTTP routes.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use itinerary_enrich::{
    enrich, EnrichConfig, FailureKind, PlaceLookup, QueryStatus, RetryPolicy,
};
use itinerary_enrich_server::config::{load_settings, PlacesSettings};
use itinerary_enrich_server::places::{client_from_settings, FixtureClient, PlacesClient};
use itinerary_enrich_server::service::EnrichService;
use itinerary_enrich_server::transport::StdioTransport;
use itinerary_enrich_server::types::ServerError;

// ─────────────────────── helpers ───────────────────────

fn write_temp(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

fn fixture_json() -> Value {
    json!({
        "Makuhari Messe": {
            "place_id": "ChIJmesse",
            "name": "Makuhari Messe",
            "address": "2-1 Nakase, Mihama Ward, Chiba",
            "rating": 4.1
        },
        "Narita International Airport": {
            "name": "Narita International Airport",
            "price_level": 2
        }
    })
}

fn fixture_service(dir: &tempfile::TempDir, defaults: EnrichConfig) -> EnrichService {
    let path = write_temp(dir, "fixtures.json", &fixture_json().to_string());
    let client = FixtureClient::load(&path).unwrap();
    EnrichService::new(Arc::new(client), defaults)
}

fn trip() -> Value {
    json!({
        "days": [
            { "items": [
                { "place_query": "Makuhari Messe", "category": "attraction" },
                { "place_query": "Narita International Airport" }
            ] },
            { "items": [
                { "place_query": "Makuhari Messe" },
                { "place_query": "Closed Place" }
            ] }
        ]
    })
}

async fn places_server() -> (MockServer, PlacesClient) {
    let server = MockServer::start().await;
    let settings = PlacesSettings {
        endpoint: format!("{}/v1/places:searchText", server.uri()),
        ..Default::default()
    };
    let client = PlacesClient::new(&settings, "test-key", Duration::from_millis(200)).unwrap();
    (server, client)
}

fn places_body(name: &str) -> Value {
    json!({
        "places": [{
            "id": format!("id:{name}"),
            "displayName": { "text": name },
            "formattedAddress": "Chiba, Japan",
            "location": { "latitude": 35.648, "longitude": 140.034 },
            "priceLevel": "PRICE_LEVEL_INEXPENSIVE"
        }]
    })
}

// ═══════════════════════════════════════════════════════
// SETTINGS AND FIXTURES
// ═══════════════════════════════════════════════════════

#[test]
fn test_settings_file_partial_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp(
        &dir,
        "config.json",
        r#"{ "enrich": { "concurrency_limit": 8, "retry": { "max_retries": 5 } },
             "places": { "language": "ja" } }"#,
    );

    let settings = load_settings(Some(&path)).unwrap();

    assert_eq!(settings.enrich.concurrency_limit, 8);
    assert_eq!(settings.enrich.retry.max_retries, 5);
    assert_eq!(
        settings.enrich.retry.base_delay,
        RetryPolicy::default().base_delay
    );
    assert_eq!(settings.places.language.as_deref(), Some("ja"));
    assert_eq!(settings.places.bias_radius_m, PlacesSettings::default().bias_radius_m);
}

#[test]
fn test_malformed_settings_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp(&dir, "config.json", "{ not json");
    assert!(matches!(load_settings(Some(&path)), Err(ServerError::Config(_))));
}

#[tokio::test]
async fn test_fixture_client_hit_and_miss() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp(&dir, "fixtures.json", &fixture_json().to_string());
    let client = FixtureClient::load(&path).unwrap();

    assert_eq!(client.len(), 2);
    assert_eq!(client.name(), "fixture");
    let hit = client.lookup("Makuhari Messe", None).await.unwrap();
    assert_eq!(hit.place_id.as_deref(), Some("ChIJmesse"));
    let miss = client.lookup("Closed Place", None).await.unwrap_err();
    assert_eq!(miss.kind, FailureKind::NotFound);
}

#[test]
fn test_fixtures_take_precedence_over_api() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp(&dir, "fixtures.json", "{}");
    let client = client_from_settings(&Default::default(), Some(&path), None).unwrap();
    assert_eq!(client.name(), "fixture");
}

#[test]
fn test_invalid_fixture_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_temp(&dir, "fixtures.json", r#"{ "X": { "rating": 4 } }"#);
    assert!(matches!(FixtureClient::load(&path), Err(ServerError::Config(_))));
}

// ═══════════════════════════════════════════════════════
// PLACES API MAPPING
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_places_success_mapping() {
    let (server, client) = places_server().await;
    Mock::given(method("POST"))
        .and(path("/v1/places:searchText"))
        .and(header("X-Goog-Api-Key", "test-key"))
        .and(body_partial_json(json!({ "textQuery": "Makuhari Messe" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(places_body("Makuhari Messe")))
        .expect(1)
        .mount(&server)
        .await;

    let record = client.lookup("Makuhari Messe", None).await.unwrap();

    assert_eq!(record.name, "Makuhari Messe");
    assert_eq!(record.address.as_deref(), Some("Chiba, Japan"));
    assert_eq!(record.price_level, Some(1));
}

#[tokio::test]
async fn test_places_empty_result_is_not_found() {
    let (server, client) = places_server().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let failure = client.lookup("Closed Place", None).await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::NotFound);
}

#[tokio::test]
async fn test_places_status_mapping() {
    let cases = [
        (404, json!({}), FailureKind::NotFound),
        (429, json!({}), FailureKind::QuotaExceeded),
        (
            403,
            json!({ "error": { "code": 403, "message": "daily limit", "status": "RESOURCE_EXHAUSTED" } }),
            FailureKind::QuotaExceeded,
        ),
        (500, json!({ "error": { "message": "backend" } }), FailureKind::Transport),
    ];

    for (status, body, expected) in cases {
        let (server, client) = places_server().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;

        let failure = client.lookup("Somewhere", None).await.unwrap_err();
        assert_eq!(failure.kind, expected, "HTTP {status}");
    }
}

#[tokio::test]
async fn test_places_malformed_body_is_transport() {
    let (server, client) = places_server().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let failure = client.lookup("Somewhere", None).await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Transport);
}

#[tokio::test]
async fn test_places_slow_response_is_timeout() {
    let (server, client) = places_server().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(places_body("Slow"))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let failure = client.lookup("Slow", None).await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn test_places_client_from_settings_uses_call_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(header("X-Goog-Api-Key", "explicit-key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(places_body("Slow"))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut settings = itinerary_enrich_server::Settings::default();
    settings.places.endpoint = format!("{}/v1/places:searchText", server.uri());
    settings.enrich.per_call_timeout = Duration::from_millis(100);

    let client = client_from_settings(&settings, None, Some("explicit-key")).unwrap();
    assert_eq!(client.name(), "places");
    let failure = client.lookup("Slow", None).await.unwrap_err();
    assert_eq!(failure.kind, FailureKind::Timeout);
}

#[tokio::test]
async fn test_places_hint_sent_as_location_bias() {
    let (server, client) = places_server().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({
            "locationBias": { "circle": { "center": { "latitude": 35.6, "longitude": 140.1 } } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(places_body("Biased")))
        .expect(1)
        .mount(&server)
        .await;

    let hint = itinerary_enrich::GeoPoint { lat: 35.6, lng: 140.1 };
    assert!(client.lookup("Biased", Some(hint)).await.is_ok());
}

#[tokio::test]
async fn test_duplicates_hit_places_once_each() {
    let (server, client) = places_server().await;
    for name in ["Makuhari Messe", "Narita International Airport", "Closed Place"] {
        let template = if name == "Closed Place" {
            ResponseTemplate::new(200).set_body_json(json!({ "places": [] }))
        } else {
            ResponseTemplate::new(200).set_body_json(places_body(name))
        };
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "textQuery": name })))
            .respond_with(template)
            .expect(1)
            .mount(&server)
            .await;
    }

    let out = enrich(&trip(), &client, &EnrichConfig::default()).await.unwrap();

    assert_eq!(out.stats.unique_queries, 3);
    assert_eq!(out.stats.calls_saved, 1);
    assert_eq!(out.stats.failed, 1);
    assert_eq!(
        out.document["days"][0]["items"][0]["place_data"],
        out.document["days"][1]["items"][0]["place_data"]
    );
    assert!(out.document["days"][1]["items"][1].get("place_data").is_none());
}

#[tokio::test]
async fn test_server_error_retried_then_succeeds() {
    let (server, client) = places_server().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(places_body("Flaky")))
        .mount(&server)
        .await;

    let config = EnrichConfig::default().with_retry(RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
    });
    let doc = json!({ "stop": { "place_query": "Flaky" } });
    let out = enrich(&doc, &client, &config).await.unwrap();

    let outcome = out.stats.outcome("Flaky").unwrap();
    assert_eq!(outcome.status, QueryStatus::Succeeded);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(out.stats.client_attempts, 2);
}

#[tokio::test]
async fn test_quota_not_retried() {
    let (server, client) = places_server().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let doc = json!({ "stop": { "place_query": "Busy" } });
    let out = enrich(&doc, &client, &EnrichConfig::default()).await.unwrap();

    assert!(matches!(
        out.stats.outcome("Busy").unwrap().status,
        QueryStatus::Failed { kind: FailureKind::QuotaExceeded, .. }
    ));
}

// ═══════════════════════════════════════════════════════
// STDIO
// ═══════════════════════════════════════════════════════

#[tokio::test]
async fn test_stdio_one_response_per_request() {
    let dir = tempfile::tempdir().unwrap();
    let transport = StdioTransport::new(fixture_service(&dir, EnrichConfig::default()));

    let input = format!(
        "{}\n\n{{broken\n{}\n",
        json!({ "document": trip() }),
        json!({ "document": 42 })
    );
    let mut output = Vec::new();
    transport.run_on(input.as_bytes(), &mut output).await.unwrap();

    let lines: Vec<Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(lines.len(), 3, "blank lines produce no response");
    assert_eq!(lines[0]["stats"]["unique_queries"], 3);
    assert_eq!(lines[0]["stats"]["failed"], 1);
    assert_eq!(lines[1]["error"]["kind"], "invalid_json");
    assert_eq!(lines[2]["error"]["kind"], "extraction");
    assert_eq!(lines[2]["error"]["status"], 422);
}

// ═══════════════════════════════════════════════════════
// HTTP
// ═══════════════════════════════════════════════════════

#[cfg(feature = "http")]
mod http {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use itinerary_enrich_server::transport::HttpTransport;

    fn app(dir: &tempfile::TempDir, token: Option<&str>) -> axum::Router {
        let service = fixture_service(dir, EnrichConfig::default().with_concurrency(2));
        HttpTransport::new(service, token.map(str::to_string)).router()
    }

    fn post(uri: &str, body: String, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body)).unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_bypasses_auth() {
        let dir = tempfile::tempdir().unwrap();
        let resp = app(&dir, Some("secret"))
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["client"], "fixture");
        assert_eq!(body["concurrency_limit"], 2);
    }

    #[tokio::test]
    async fn test_enrich_requires_token() {
        let dir = tempfile::tempdir().unwrap();
        let body = json!({ "document": trip() }).to_string();

        let denied = app(&dir, Some("secret"))
            .oneshot(post("/enrich", body.clone(), Some("wrong")))
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(denied).await["error"]["kind"], "unauthorized");

        let allowed = app(&dir, Some("secret"))
            .oneshot(post("/enrich", body, Some("secret")))
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_enrich_returns_document_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let body = json!({ "document": trip(), "config": { "concurrency_limit": 16 } }).to_string();

        let resp = app(&dir, None).oneshot(post("/enrich", body, None)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let out = json_body(resp).await;
        assert_eq!(out["stats"]["total_occurrences"], 4);
        assert_eq!(out["stats"]["calls_saved"], 1);
        assert_eq!(
            out["document"]["days"][0]["items"][0]["place_data"]["place_id"],
            "ChIJmesse"
        );
        assert!(out["document"]["days"][1]["items"][1].get("place_data").is_none());
    }

    #[tokio::test]
    async fn test_plan_route() {
        let dir = tempfile::tempdir().unwrap();
        let body = json!({ "document": trip() }).to_string();

        let resp = app(&dir, None).oneshot(post("/plan", body, None)).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let report = json_body(resp).await;
        assert_eq!(report["unique_queries"], 3);
        assert_eq!(report["queries"][0]["query"], "Makuhari Messe");
        assert_eq!(report["queries"][0]["paths"][1], json!(["days", 1, "items", 0]));
    }

    #[tokio::test]
    async fn test_bad_bodies() {
        let dir = tempfile::tempdir().unwrap();

        let malformed = app(&dir, None)
            .oneshot(post("/enrich", "{oops".to_string(), None))
            .await
            .unwrap();
        assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

        let scalar = app(&dir, None)
            .oneshot(post("/enrich", json!({ "document": "text" }).to_string(), None))
            .await
            .unwrap();
        assert_eq!(scalar.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(scalar).await["error"]["kind"], "extraction");
    }
}
