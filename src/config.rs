//! Tracker and service endpoint configuration.

use serde::{Deserialize, Serialize};

use crate::{Result, TrackerError, TransportMode};

/// What the map screen was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "camelCase")]
pub enum MapMode {
    /// Show a saved place and optionally route to it
    #[default]
    ShowPlace,
    /// Let the user pick an address; the map starts on the user's position
    PickAddress,
}

/// Configuration for a tracking session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum movement before the map follows the user.
    /// Default: 50.0 meters (filters GPS jitter)
    pub recenter_threshold_meters: f64,

    /// Size of the region shown around the user.
    /// Default: 1000.0 meters
    pub region_span_meters: f64,

    /// Default: driving
    pub transport_mode: TransportMode,

    /// Ask the router for alternative routes.
    /// Default: true
    pub allow_alternates: bool,

    /// Default: show a saved place
    pub map_mode: MapMode,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            recenter_threshold_meters: 50.0,
            region_span_meters: 1000.0,
            transport_mode: TransportMode::Driving,
            allow_alternates: true,
            map_mode: MapMode::ShowPlace,
        }
    }
}

impl TrackerConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| TrackerError::Internal {
            message: format!("Invalid tracker config: {}", e),
        })?;
        if !(config.recenter_threshold_meters >= 0.0 && config.region_span_meters > 0.0) {
            return Err(TrackerError::Internal {
                message: "Tracker distances must be positive".to_string(),
            });
        }
        Ok(config)
    }

    /// Same configuration with a different map mode.
    pub fn with_map_mode(self, map_mode: MapMode) -> Self {
        Self { map_mode, ..self }
    }
}

/// Where the HTTP adapters send their requests.
#[cfg(feature = "http")]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceEndpoints {
    /// Nominatim base URL
    pub geocoder_url: String,
    /// OSRM base URL
    pub router_url: String,
    /// Nominatim's usage policy requires an identifying user agent
    pub user_agent: String,
    pub timeout_secs: u64,
}

#[cfg(feature = "http")]
impl Default for ServiceEndpoints {
    fn default() -> Self {
        Self {
            geocoder_url: "https://nominatim.openstreetmap.org".to_string(),
            router_url: "https://router.project-osrm.org".to_string(),
            user_agent: concat!("place-tracker/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
        }
    }
}

#[cfg(feature = "http")]
impl ServiceEndpoints {
    /// Parse endpoints from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TrackerError::Internal {
            message: format!("Invalid service endpoints: {}", e),
        })
    }
}
