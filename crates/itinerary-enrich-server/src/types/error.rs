//! Error types and HTTP status mapping for the enrichment server.

use itinerary_enrich::EnrichError;

/// HTTP status codes used by the server.
pub mod status_codes {
    pub const BAD_REQUEST: u16 = 400;
    pub const UNAUTHORIZED: u16 = 401;
    pub const UNPROCESSABLE: u16 = 422;
    pub const INTERNAL_ERROR: u16 = 500;
}

/// All errors that can occur in the server.
#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing Places API key (pass --api-key or set PLACES_API_KEY)")]
    MissingApiKey,

    #[error(transparent)]
    Enrich(#[from] EnrichError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Missing or invalid bearer token.
    #[error("Unauthorized")]
    Unauthorized,
}

impl ServerError {
    pub fn status_code(&self) -> u16 {
        use status_codes::*;
        match self {
            ServerError::InvalidInput(_) | ServerError::Json(_) => BAD_REQUEST,
            ServerError::Unauthorized => UNAUTHORIZED,
            ServerError::Enrich(EnrichError::Extraction(_)) => UNPROCESSABLE,
            ServerError::Enrich(_)
            | ServerError::Config(_)
            | ServerError::MissingApiKey
            | ServerError::Transport(_)
            | ServerError::Io(_) => INTERNAL_ERROR,
        }
    }

    /// Short machine-readable error class.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::InvalidInput(_) => "invalid_input",
            ServerError::Config(_) | ServerError::MissingApiKey => "config",
            ServerError::Enrich(EnrichError::Extraction(_)) => "extraction",
            ServerError::Enrich(EnrichError::ProjectionInvariant(_))
            | ServerError::Enrich(EnrichError::Cache(_)) => "invariant_violation",
            ServerError::Enrich(EnrichError::Serialize(_)) => "internal",
            ServerError::Transport(_) | ServerError::Io(_) => "internal",
            ServerError::Json(_) => "invalid_json",
            ServerError::Unauthorized => "unauthorized",
        }
    }

    pub fn to_body(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "kind": self.kind(),
                "status": self.status_code(),
                "message": self.to_string(),
            }
        })
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
