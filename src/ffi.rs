//! FFI bindings for mobile platforms (iOS/Android).
//!
//! This module provides the UniFFI bindings that expose a tracking session to
//! Kotlin and Swift. The host implements the collaborator callback interfaces
//! from [`crate::clients`] and drives a [`MapSession`]: it forwards position
//! fixes and authorization changes, and reports geocoder/router answers
//! through the `on_*_success` / `on_*_failure` methods.

use std::sync::Arc;

use log::info;

use crate::clients::{GeocodingClient, LocationSource, MapPresenter, RoutingClient};
use crate::session::EventOutcome;
use crate::{
    init_logging, AuthorizationState, ClientError, ClientEvent, Coordinate, GeocodeMatch,
    GeocodeTicket, Place, PlaceTracker, RecenterCommand, ResolvedAnnotation, Route, RouteHandle,
    TrackerConfig, TrackerError, TrackingPhase, TrackingSession,
};

// ============================================================================
// Map Session
// ============================================================================

/// One map screen's tracking session.
///
/// Create it when the screen opens and call `teardown` when it closes.
#[derive(Debug, uniffi::Object)]
pub struct MapSession {
    session: TrackingSession,
}

impl MapSession {
    fn resolved(&self, event: ClientEvent) -> Result<Option<ResolvedAnnotation>, TrackerError> {
        match self.session.dispatch(event)? {
            Some(EventOutcome::Resolved(result)) => result.map(Some),
            _ => Ok(None),
        }
    }

    fn routed(&self, event: ClientEvent) -> Result<Option<u32>, TrackerError> {
        match self.session.dispatch(event)? {
            Some(EventOutcome::Routed(result)) => result.map(|count| Some(count as u32)),
            _ => Ok(None),
        }
    }
}

#[uniffi::export]
impl MapSession {
    #[uniffi::constructor]
    pub fn new(
        config: TrackerConfig,
        geocoder: Box<dyn GeocodingClient>,
        router: Box<dyn RoutingClient>,
        location: Box<dyn LocationSource>,
        presenter: Box<dyn MapPresenter>,
    ) -> Arc<Self> {
        init_logging();
        let tracker = PlaceTracker::new(config, geocoder, router, location, presenter);
        info!(
            "[PlaceTrackerRust] MapSession {} created",
            tracker.session_id()
        );
        Arc::new(Self {
            session: TrackingSession::new(tracker),
        })
    }

    pub fn session_id(&self) -> Result<u64, TrackerError> {
        self.session.session_id()
    }

    pub fn phase(&self) -> Result<TrackingPhase, TrackerError> {
        self.session.phase()
    }

    /// Start geocoding the place's address.
    pub fn resolve_place(&self, place: Place) -> Result<GeocodeTicket, TrackerError> {
        self.session.resolve_place(&place)
    }

    /// Report geocoder matches. Returns `None` if the ticket is stale.
    pub fn on_geocode_success(
        &self,
        ticket: GeocodeTicket,
        matches: Vec<GeocodeMatch>,
    ) -> Result<Option<ResolvedAnnotation>, TrackerError> {
        self.resolved(ClientEvent::GeocodeFinished {
            ticket,
            outcome: Ok(matches),
        })
    }

    /// Report a geocoder failure. Returns `None` if the ticket is stale.
    pub fn on_geocode_failure(
        &self,
        ticket: GeocodeTicket,
        message: String,
    ) -> Result<Option<ResolvedAnnotation>, TrackerError> {
        self.resolved(ClientEvent::GeocodeFinished {
            ticket,
            outcome: Err(ClientError::new(message)),
        })
    }

    pub fn begin_tracking(&self) -> Result<TrackingPhase, TrackerError> {
        self.session.begin_tracking()
    }

    pub fn on_authorization_changed(
        &self,
        state: AuthorizationState,
    ) -> Result<TrackingPhase, TrackerError> {
        self.session.on_authorization_changed(state)
    }

    pub fn request_route(&self, current_fix: Coordinate) -> Result<RouteHandle, TrackerError> {
        self.session.request_route(current_fix)
    }

    pub fn request_route_from_current_location(&self) -> Result<RouteHandle, TrackerError> {
        self.session.request_route_from_current_location()
    }

    /// Report router results. Returns the number of routes drawn, or `None`
    /// if the handle was cancelled or superseded.
    pub fn on_route_success(
        &self,
        handle: RouteHandle,
        routes: Vec<Route>,
    ) -> Result<Option<u32>, TrackerError> {
        self.routed(ClientEvent::RouteFinished {
            handle,
            outcome: Ok(routes),
        })
    }

    /// Report a router failure. Returns `None` if the handle is stale.
    pub fn on_route_failure(
        &self,
        handle: RouteHandle,
        message: String,
    ) -> Result<Option<u32>, TrackerError> {
        self.routed(ClientEvent::RouteFinished {
            handle,
            outcome: Err(ClientError::new(message)),
        })
    }

    /// Feed a position fix. Returns a command when the map should follow.
    pub fn on_position_fix(
        &self,
        fix: Coordinate,
        visual_center: Option<Coordinate>,
    ) -> Result<Option<RecenterCommand>, TrackerError> {
        self.session.on_position_fix(fix, visual_center)
    }

    pub fn teardown(&self) -> Result<(), TrackerError> {
        self.session.teardown()
    }
}

// ============================================================================
// Utilities
// ============================================================================

/// Great-circle distance in meters.
#[uniffi::export]
pub fn ffi_haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    crate::haversine_distance(&a, &b)
}

/// Get default configuration.
#[uniffi::export]
pub fn default_tracker_config() -> TrackerConfig {
    init_logging();
    info!("[PlaceTrackerRust] default_tracker_config called - Rust is active!");
    TrackerConfig::default()
}

/// The place list stored on first launch.
#[uniffi::export]
pub fn default_places() -> Vec<Place> {
    Place::default_places()
}
