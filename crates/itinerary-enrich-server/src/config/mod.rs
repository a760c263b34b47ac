//! Configuration loading and resolution.
//!
//! Settings are layered: built-in defaults, then a JSON settings file, then
//! command-line flags (applied by the caller).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use itinerary_enrich::EnrichConfig;

use crate::types::{ServerError, ServerResult};

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "ITINERARY_ENRICH_CONFIG";

/// Environment variable holding the Places API key.
pub const API_KEY_ENV: &str = "PLACES_API_KEY";

/// Default Places Text Search endpoint.
pub const DEFAULT_PLACES_ENDPOINT: &str = "https://places.googleapis.com/v1/places:searchText";

/// Full server settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub enrich: EnrichConfig,
    pub places: PlacesSettings,
}

/// Places API client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacesSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub language: Option<String>,
    /// Radius of the location-bias circle around a hint, in meters.
    pub bias_radius_m: f64,
}

impl Default for PlacesSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_PLACES_ENDPOINT.to_string(),
            api_key: None,
            language: None,
            bias_radius_m: 20_000.0,
        }
    }
}

/// Resolve the settings file path, if any.
pub fn resolve_config_path(explicit: Option<&str>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(PathBuf::from(path));
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(env_path));
    }

    let cwd_config = PathBuf::from(".itinerary-enrich/config.json");
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    let home_config = resolve_default_config_path();
    home_config.exists().then_some(home_config)
}

fn resolve_default_config_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());

    PathBuf::from(format!("{home}/.itinerary-enrich/config.json"))
}

/// Load settings from `path`, or defaults when no file is configured.
pub fn load_settings(path: Option<&Path>) -> ServerResult<Settings> {
    let Some(path) = path else {
        tracing::debug!("No settings file, using defaults");
        return Ok(Settings::default());
    };

    let raw = std::fs::read_to_string(path).map_err(|e| {
        ServerError::Config(format!("Failed to read settings {}: {e}", path.display()))
    })?;
    let settings: Settings = serde_json::from_str(&raw).map_err(|e| {
        ServerError::Config(format!("Invalid settings {}: {e}", path.display()))
    })?;

    tracing::info!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Resolve the Places API key: explicit flag, then environment, then settings.
pub fn resolve_api_key(explicit: Option<&str>, settings: &Settings) -> Option<String> {
    if let Some(key) = explicit {
        return Some(key.to_string());
    }

    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.is_empty() {
            return Some(key);
        }
    }

    settings.places.api_key.clone()
}
