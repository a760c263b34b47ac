//! HTTP transport: axum server with bearer auth and /health.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Json as AxumJson, Response},
    routing::{get, post},
    Router,
};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use itinerary_enrich::EnrichedDocument;

use crate::service::{plan_report, EnrichService};
use crate::types::{EnrichRequest, PlanReport, ServerError, ServerResult};

/// Shared server state passed to all handlers via axum State.
pub struct ServerState {
    pub token: Option<String>,
    pub service: EnrichService,
}

/// HTTP transport for remote callers.
pub struct HttpTransport {
    state: Arc<ServerState>,
}

impl HttpTransport {
    pub fn new(service: EnrichService, token: Option<String>) -> Self {
        Self {
            state: Arc::new(ServerState { token, service }),
        }
    }

    /// The routed application, without a listener.
    pub fn router(&self) -> Router {
        let state = self.state.clone();

        Router::new()
            .route("/enrich", post(handle_enrich))
            .route("/plan", post(handle_plan))
            .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
            .route("/health", get(handle_health))
            .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
            .with_state(state)
    }

    /// Run the HTTP server on the given address.
    pub async fn run(&self, addr: &str) -> ServerResult<()> {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind(addr).await?;

        tracing::info!("HTTP transport listening on {addr}");

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Transport(e.to_string()))?;

        Ok(())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!("Request failed: {self}");
        } else {
            tracing::debug!("Request rejected: {self}");
        }
        (status, AxumJson(self.to_body())).into_response()
    }
}

/// Auth middleware. Checks the Bearer token if one is configured.
/// /health is handled by a separate route that bypasses this layer.
async fn auth_layer(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    request: axum::extract::Request,
    next: middleware::Next,
) -> Response {
    if let Some(expected) = &state.token {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected);

        if !authorized {
            return ServerError::Unauthorized.into_response();
        }
    }

    next.run(request).await
}

async fn handle_enrich(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> Result<AxumJson<EnrichedDocument>, ServerError> {
    let request: EnrichRequest = serde_json::from_slice(&body)?;
    let enriched = state.service.enrich(request).await?;
    Ok(AxumJson(enriched))
}

async fn handle_plan(body: Bytes) -> Result<AxumJson<PlanReport>, ServerError> {
    let request: EnrichRequest = serde_json::from_slice(&body)?;
    Ok(AxumJson(plan_report(&request.document)?))
}

/// Health check endpoint, no auth required.
async fn handle_health(State(state): State<Arc<ServerState>>) -> AxumJson<Value> {
    AxumJson(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "client": state.service.client_name(),
        "concurrency_limit": state.service.defaults().effective_concurrency(),
    }))
}
