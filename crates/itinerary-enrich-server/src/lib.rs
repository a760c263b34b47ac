//! itinerary-enrich server: Places API client, settings, and the stdio/HTTP
//! transports around the enrichment library.

pub mod config;
pub mod places;
pub mod service;
pub mod transport;
pub mod types;

pub use config::{load_settings, resolve_config_path, Settings};
pub use places::{client_from_settings, FixtureClient, PlacesClient};
pub use service::{plan_report, EnrichService};
pub use transport::StdioTransport;
