//! # Place Tracker
//!
//! Shared core of the MyPlaces app: geocodes a place, follows the user's live
//! position and keeps a driving route to the place up to date.
//!
//! This library provides:
//! - A tracking state machine ([`PlaceTracker`]) that decides when to geocode,
//!   when to (re)issue or cancel a route request and when to re-center the map
//! - Collaborator traits for the platform geocoder, router, location source
//!   and map view
//! - A mutex-serialized [`TrackingSession`] with a completion event queue
//!
//! ## Features
//!
//! - **`persistence`** - SQLite place store
//! - **`http`** - Nominatim geocoding and OSRM routing adapters
//! - **`ffi`** - FFI bindings for mobile platforms (iOS/Android)
//! - **`synthetic`** - Recording collaborators for tests
//! - **`full`** - Enable `ffi`, `http` and `persistence`
//!
//! ## Quick Start
//!
//! ```rust
//! use place_tracker::{Coordinate, haversine_distance};
//!
//! let kremlin = Coordinate::new(55.7520, 37.6175);
//! let gorky_park = Coordinate::new(55.7298, 37.6010);
//! let meters = haversine_distance(&kremlin, &gorky_park);
//! assert!(meters > 2_000.0 && meters < 3_500.0);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{ClientError, Result, TrackerError};

// Tracker and endpoint configuration
pub mod config;
pub use config::{MapMode, TrackerConfig};
#[cfg(feature = "http")]
pub use config::ServiceEndpoints;

// Geographic utilities
pub mod geo_utils;
pub use geo_utils::haversine_distance;

// Place records
pub mod place;
pub use place::Place;

// Collaborator traits (geocoder, router, location source, map view)
pub mod clients;
pub use clients::{GeocodingClient, LocationSource, MapPresenter, RoutingClient};

// Tracking state machine
pub mod tracker;
pub use tracker::{PlaceTracker, TrackingPhase};

// Serialized session handle and completion events
pub mod session;
pub use session::{ClientEvent, TrackingSession};

// SQLite place store
#[cfg(feature = "persistence")]
pub mod persistence;
#[cfg(feature = "persistence")]
pub use persistence::{with_place_store, PlaceStore, PLACE_STORE};

// HTTP geocoding and routing adapters
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::{NominatimGeocoder, OsrmRouter};

// Recording collaborators for tests
#[cfg(any(test, feature = "synthetic"))]
pub mod synthetic;

// FFI bindings for mobile platforms (iOS/Android)
#[cfg(feature = "ffi")]
pub mod ffi;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
pub(crate) fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("PlaceTrackerRust"),
    );
}

/// Initialize logging for iOS (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "ios"))]
pub(crate) fn init_logging() {
    use log::LevelFilter;
    use once_cell::sync::OnceCell;

    static LOGGER: OnceCell<()> = OnceCell::new();
    LOGGER.get_or_init(|| {
        // A second logger install fails harmlessly when the host already set one
        let _ = oslog::OsLogger::new("com.myplaces.placetracker")
            .level_filter(LevelFilter::Debug)
            .init();
    });
}

#[cfg(all(feature = "ffi", not(any(target_os = "android", target_os = "ios"))))]
pub(crate) fn init_logging() {
    // No-op on desktop platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A WGS84 coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use place_tracker::Coordinate;
/// let point = Coordinate::new(55.7558, 37.6173); // Moscow
/// assert!(point.is_valid());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check if the coordinate has valid values.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One candidate returned by a geocoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GeocodeMatch {
    pub coordinate: Coordinate,
    /// Human readable name of the match (e.g. "Moscow, Central Federal District, Russia")
    pub display_name: String,
}

/// The marker shown for a resolved place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct ResolvedAnnotation {
    pub coordinate: Coordinate,
    /// Place name
    pub title: String,
    /// Place category, if any
    pub subtitle: Option<String>,
}

/// How the route should be travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Driving,
}

/// A request for directions from the user's position to the resolved place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RouteRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    pub transport_mode: TransportMode,
    /// Ask the router for alternative routes as well as the best one
    pub allow_alternates: bool,
}

/// A route returned by the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct Route {
    /// Ordered points from origin to destination
    pub polyline: Vec<Coordinate>,
    /// Route length in meters
    pub distance_meters: f64,
    /// Expected travel time in seconds
    pub eta_seconds: f64,
}

/// Tag for an issued route request.
///
/// Completions carrying a handle that is no longer the session's pending one
/// are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RouteHandle {
    pub session_id: u64,
    pub generation: u64,
}

/// Tag for an issued geocode request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct GeocodeTicket {
    pub session_id: u64,
    pub generation: u64,
}

/// Location permission as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[serde(rename_all = "camelCase")]
pub enum AuthorizationState {
    #[default]
    Undetermined,
    AuthorizedWhileInUse,
    AuthorizedAlways,
    Denied,
    Restricted,
}

impl AuthorizationState {
    /// Whether position updates may be streamed in this state.
    pub fn is_authorized(self) -> bool {
        matches!(
            self,
            AuthorizationState::AuthorizedWhileInUse | AuthorizationState::AuthorizedAlways
        )
    }
}

/// Instruction to move the visible map region to follow the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct RecenterCommand {
    pub center: Coordinate,
    /// Region size in meters (both latitudinal and longitudinal)
    pub span_meters: f64,
}

// ============================================================================
// Tests
// ============================================================================
