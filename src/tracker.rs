//! # Place Tracker
//!
//! State machine behind one map screen. It owns:
//! - the destination coordinate resolved from the place's address
//! - the single in-flight route request, tagged with a generation
//! - the last map center, used to decide when the map follows the user
//! - the location authorization sub-state
//!
//! Outbound work goes to the collaborators in [`crate::clients`]. Their
//! answers come back through [`PlaceTracker::on_geocode_complete`] and
//! [`PlaceTracker::on_route_complete`]; answers carrying an outdated tag are
//! dropped so a superseded request can never touch the current state.
//!
//! ## Authorization
//!
//! ```text
//! Undetermined --request--> (external callback) --+--> AuthorizedWhileInUse / Always --> Streaming
//!                                                 +--> Denied / Restricted            --> Blocked
//! ```
//!
//! Blocked is left only when the platform reports a new state, which is
//! always reprocessed.

use std::sync::atomic::{AtomicU64, Ordering};

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::clients::{GeocodingClient, LocationSource, MapPresenter, RoutingClient};
use crate::{
    haversine_distance, AuthorizationState, ClientError, Coordinate, GeocodeMatch, GeocodeTicket,
    MapMode, Place, RecenterCommand, ResolvedAnnotation, Result, Route, RouteHandle, RouteRequest,
    TrackerConfig, TrackerError,
};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Where the tracker stands after the last authorization decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum TrackingPhase {
    /// `begin_tracking` has not run yet
    Idle,
    /// Location services are off device-wide
    ServicesDisabled,
    /// Waiting for the user to answer the permission prompt
    AwaitingAuthorization,
    /// Position fixes are being delivered
    Streaming,
    /// Permission denied or restricted
    Blocked,
    /// The session was torn down
    Closed,
}

/// Geocode request waiting for its answer.
#[derive(Debug, Clone)]
struct PendingGeocode {
    ticket: GeocodeTicket,
    address: String,
    title: String,
    subtitle: Option<String>,
}

/// The tracking state machine for one map screen.
pub struct PlaceTracker {
    session_id: u64,
    config: TrackerConfig,

    // Collaborators
    geocoder: Box<dyn GeocodingClient>,
    router: Box<dyn RoutingClient>,
    location: Box<dyn LocationSource>,
    presenter: Box<dyn MapPresenter>,

    // Destination
    destination: Option<Coordinate>,
    pending_geocode: Option<PendingGeocode>,
    geocode_generation: u64,

    // Route lifecycle
    pending_route: Option<RouteHandle>,
    route_generation: u64,
    last_routes: Vec<Route>,

    // Movement
    last_center: Option<Coordinate>,

    // Authorization
    authorization: AuthorizationState,
    phase: TrackingPhase,
    authorization_requested: bool,
    streaming: bool,
}

impl PlaceTracker {
    /// Create a tracker for a new map screen.
    pub fn new(
        config: TrackerConfig,
        geocoder: Box<dyn GeocodingClient>,
        router: Box<dyn RoutingClient>,
        location: Box<dyn LocationSource>,
        presenter: Box<dyn MapPresenter>,
    ) -> Self {
        let session_id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        debug!("[PlaceTracker] Session {} created ({:?})", session_id, config.map_mode);
        Self {
            session_id,
            config,
            geocoder,
            router,
            location,
            presenter,
            destination: None,
            pending_geocode: None,
            geocode_generation: 0,
            pending_route: None,
            route_generation: 0,
            last_routes: Vec::new(),
            last_center: None,
            authorization: AuthorizationState::Undetermined,
            phase: TrackingPhase::Idle,
            authorization_requested: false,
            streaming: false,
        }
    }

    // ========================================================================
    // Geocoding
    // ========================================================================

    /// Start resolving `place` into a destination.
    ///
    /// Any previously resolved destination is forgotten, its route overlays
    /// are cleared and a route still in flight towards it is cancelled. The answer is delivered to
    /// [`Self::on_geocode_complete`] with the returned ticket.
    pub fn resolve_place(&mut self, place: &Place) -> Result<GeocodeTicket> {
        self.ensure_open()?;

        self.pending_geocode = None;
        self.cancel_pending_route();
        if self.destination.take().is_some() || !self.last_routes.is_empty() {
            self.last_routes.clear();
            self.presenter.clear_overlays();
        }

        let Some(address) = place.geocodable_address() else {
            warn!("[PlaceTracker] '{}' has no address to geocode", place.name);
            return Err(TrackerError::Geocode {
                reason: format!("'{}' has no address", place.name),
            });
        };

        self.geocode_generation += 1;
        let ticket = GeocodeTicket {
            session_id: self.session_id,
            generation: self.geocode_generation,
        };
        self.pending_geocode = Some(PendingGeocode {
            ticket,
            address: address.to_string(),
            title: place.name.clone(),
            subtitle: place.category.clone(),
        });

        info!(
            "[PlaceTracker] Geocoding '{}' for '{}' (generation {})",
            address, place.name, ticket.generation
        );
        self.geocoder.geocode(ticket, address.to_string());
        Ok(ticket)
    }

    /// Handle a geocoder answer.
    ///
    /// Returns `None` when the ticket is stale or the session is closed.
    /// On failure nothing is cached and the user is alerted.
    pub fn on_geocode_complete(
        &mut self,
        ticket: GeocodeTicket,
        outcome: std::result::Result<Vec<GeocodeMatch>, ClientError>,
    ) -> Option<Result<ResolvedAnnotation>> {
        if self.is_closed() {
            debug!("[PlaceTracker] Geocode answer after teardown ignored");
            return None;
        }
        let pending = match self.pending_geocode.take() {
            Some(pending) if pending.ticket == ticket => pending,
            other => {
                self.pending_geocode = other;
                debug!(
                    "[PlaceTracker] Stale geocode answer (session {}, generation {}) discarded",
                    ticket.session_id, ticket.generation
                );
                return None;
            }
        };

        let result = match outcome {
            Err(e) => Err(TrackerError::Geocode { reason: e.message }),
            Ok(matches) => matches
                .into_iter()
                .find(|m| m.coordinate.is_valid())
                .map(|m| ResolvedAnnotation {
                    coordinate: m.coordinate,
                    title: pending.title.clone(),
                    subtitle: pending.subtitle.clone(),
                })
                .ok_or_else(|| TrackerError::Geocode {
                    reason: format!("no match for '{}'", pending.address),
                }),
        };

        match &result {
            Ok(annotation) => {
                info!(
                    "[PlaceTracker] '{}' resolved to ({:.5}, {:.5})",
                    annotation.title, annotation.coordinate.latitude, annotation.coordinate.longitude
                );
                self.destination = Some(annotation.coordinate);
                self.presenter.show_annotation(annotation.clone());
            }
            Err(e) => self.report(e),
        }
        Some(result)
    }

    // ========================================================================
    // Authorization
    // ========================================================================

    /// Check location services and act on the current authorization.
    pub fn begin_tracking(&mut self) -> TrackingPhase {
        if self.is_closed() {
            return TrackingPhase::Closed;
        }
        if !self.location.services_enabled() {
            self.report(&TrackerError::ServicesDisabled);
            self.phase = TrackingPhase::ServicesDisabled;
            return self.phase;
        }
        let state = self.location.authorization_state();
        self.apply_authorization(state)
    }

    /// Handle an authorization change reported by the platform.
    ///
    /// Before `begin_tracking` the state is only recorded. A repeated report
    /// of the state already acted on is ignored.
    pub fn on_authorization_changed(&mut self, state: AuthorizationState) -> TrackingPhase {
        match self.phase {
            TrackingPhase::Closed => TrackingPhase::Closed,
            TrackingPhase::Idle => {
                debug!("[PlaceTracker] Authorization {:?} recorded before tracking", state);
                self.authorization = state;
                self.phase
            }
            TrackingPhase::ServicesDisabled => {
                if self.location.services_enabled() {
                    self.begin_tracking()
                } else {
                    debug!("[PlaceTracker] Authorization {:?} recorded, services still off", state);
                    self.authorization = state;
                    self.phase
                }
            }
            _ if state == self.authorization => {
                debug!("[PlaceTracker] Authorization unchanged ({:?})", state);
                self.phase
            }
            _ => self.apply_authorization(state),
        }
    }

    fn apply_authorization(&mut self, state: AuthorizationState) -> TrackingPhase {
        info!(
            "[PlaceTracker] Authorization {:?} -> {:?}",
            self.authorization, state
        );
        self.authorization = state;
        if state != AuthorizationState::Undetermined {
            self.authorization_requested = false;
        }

        self.phase = match state {
            AuthorizationState::Undetermined => {
                // One prompt per entry into Undetermined
                if !self.authorization_requested {
                    self.authorization_requested = true;
                    self.location.request_authorization();
                }
                TrackingPhase::AwaitingAuthorization
            }
            _ if state.is_authorized() => {
                if !self.streaming {
                    self.streaming = true;
                    self.location.start_updates();
                }
                self.presenter.show_user_marker(true);
                if self.config.map_mode == MapMode::PickAddress {
                    self.center_on_user();
                }
                TrackingPhase::Streaming
            }
            _ => {
                self.stop_streaming();
                if state == AuthorizationState::Denied {
                    self.report(&TrackerError::PermissionDenied);
                } else {
                    warn!("[PlaceTracker] Location access restricted on this device");
                }
                TrackingPhase::Blocked
            }
        };
        self.phase
    }

    fn center_on_user(&self) {
        match self.location.last_known_position() {
            Some(position) => self
                .presenter
                .set_region(position, self.config.region_span_meters),
            None => debug!("[PlaceTracker] No position yet to center on"),
        }
    }

    fn stop_streaming(&mut self) {
        if self.streaming {
            self.streaming = false;
            self.location.stop_updates();
            self.presenter.show_user_marker(false);
        }
    }

    // ========================================================================
    // Routing
    // ========================================================================

    /// Request routes from `current_fix` to the resolved destination.
    ///
    /// A request still in flight is cancelled first and existing overlays are
    /// cleared. The answer is delivered to [`Self::on_route_complete`].
    pub fn request_route(&mut self, current_fix: Coordinate) -> Result<RouteHandle> {
        self.ensure_open()?;

        let Some(destination) = self.destination else {
            error!("[PlaceTracker] Route requested before the destination was resolved");
            return Err(TrackerError::NoDestination);
        };
        if !current_fix.is_valid() {
            let err = TrackerError::NoCurrentLocation;
            self.report(&err);
            return Err(err);
        }

        self.cancel_pending_route();
        self.presenter.clear_overlays();
        self.last_routes.clear();

        if self.last_center.is_none() {
            self.last_center = Some(current_fix);
        }

        self.route_generation += 1;
        let handle = RouteHandle {
            session_id: self.session_id,
            generation: self.route_generation,
        };
        let request = RouteRequest {
            origin: current_fix,
            destination,
            transport_mode: self.config.transport_mode,
            allow_alternates: self.config.allow_alternates,
        };
        self.pending_route = Some(handle);

        info!(
            "[PlaceTracker] Route request {} from ({:.5}, {:.5})",
            handle.generation, current_fix.latitude, current_fix.longitude
        );
        self.router.route(handle, request);
        Ok(handle)
    }

    /// Request routes starting at the platform's last known position.
    pub fn request_route_from_current_location(&mut self) -> Result<RouteHandle> {
        self.ensure_open()?;
        match self.location.last_known_position() {
            Some(position) => self.request_route(position),
            None => {
                let err = TrackerError::NoCurrentLocation;
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Handle a router answer.
    ///
    /// Returns `None` for answers to a cancelled or superseded request,
    /// otherwise the number of routes drawn or the error. Transport errors
    /// are only logged; an empty answer alerts the user.
    pub fn on_route_complete(
        &mut self,
        handle: RouteHandle,
        outcome: std::result::Result<Vec<Route>, ClientError>,
    ) -> Option<Result<usize>> {
        if self.is_closed() || self.pending_route != Some(handle) {
            debug!(
                "[PlaceTracker] Stale route answer (session {}, generation {}) discarded",
                handle.session_id, handle.generation
            );
            return None;
        }
        self.pending_route = None;

        let routes = match outcome {
            Ok(routes) => routes,
            Err(e) => {
                // TODO: surface transport failures once the host shows a retry action
                warn!("[PlaceTracker] Route calculation failed: {}", e);
                return Some(Err(TrackerError::RoutingTransport { message: e.message }));
            }
        };
        if routes.is_empty() {
            let err = TrackerError::NoRouteFound;
            self.report(&err);
            return Some(Err(err));
        }

        let mut all_points = Vec::new();
        for route in &routes {
            info!(
                "[PlaceTracker] Route: {:.1} km, {:.0} s",
                route.distance_meters / 1000.0,
                route.eta_seconds
            );
            self.presenter.draw_polyline(route.polyline.clone());
            all_points.extend_from_slice(&route.polyline);
        }
        if !all_points.is_empty() {
            self.presenter.fit_bounds(all_points);
        }

        let count = routes.len();
        self.last_routes = routes;
        Some(Ok(count))
    }

    fn cancel_pending_route(&mut self) {
        if let Some(handle) = self.pending_route.take() {
            debug!("[PlaceTracker] Cancelling route request {}", handle.generation);
            self.router.cancel(handle);
        }
    }

    // ========================================================================
    // Movement
    // ========================================================================

    /// Decide whether the map should follow a new position fix.
    ///
    /// The first fix only primes the reference point. Afterwards the map is
    /// re-centered when the fix is farther than the threshold from
    /// `visual_center` (if given) or from the last center.
    pub fn on_position_fix(
        &mut self,
        fix: Coordinate,
        visual_center: Option<Coordinate>,
    ) -> Option<RecenterCommand> {
        if self.is_closed() || !fix.is_valid() {
            return None;
        }
        let Some(last_center) = self.last_center else {
            self.last_center = Some(fix);
            return None;
        };

        let reference = visual_center.unwrap_or(last_center);
        if haversine_distance(&reference, &fix) > self.config.recenter_threshold_meters {
            self.last_center = Some(fix);
            Some(RecenterCommand {
                center: fix,
                span_meters: self.config.region_span_meters,
            })
        } else {
            None
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Cancel outstanding work and stop location updates. Safe to call twice.
    pub fn teardown(&mut self) {
        if self.is_closed() {
            debug!("[PlaceTracker] Session {} already torn down", self.session_id);
            return;
        }
        self.cancel_pending_route();
        self.pending_geocode = None;
        self.streaming = false;
        self.location.stop_updates();
        self.phase = TrackingPhase::Closed;
        info!("[PlaceTracker] Session {} torn down", self.session_id);
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(TrackerError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn report(&self, err: &TrackerError) {
        warn!("[PlaceTracker] {}", err);
        if let Some((title, message)) = err.alert() {
            self.presenter.show_alert(title.to_string(), message);
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn phase(&self) -> TrackingPhase {
        self.phase
    }

    pub fn is_closed(&self) -> bool {
        self.phase == TrackingPhase::Closed
    }

    pub fn authorization_state(&self) -> AuthorizationState {
        self.authorization
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn destination(&self) -> Option<Coordinate> {
        self.destination
    }

    pub fn pending_route(&self) -> Option<RouteHandle> {
        self.pending_route
    }

    pub fn last_center(&self) -> Option<Coordinate> {
        self.last_center
    }

    /// Routes drawn by the last successful route request.
    pub fn last_routes(&self) -> &[Route] {
        &self.last_routes
    }
}

impl Drop for PlaceTracker {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for PlaceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaceTracker")
            .field("session_id", &self.session_id)
            .field("phase", &self.phase)
            .field("authorization", &self.authorization)
            .field("destination", &self.destination)
            .field("pending_route", &self.pending_route)
            .field("last_center", &self.last_center)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{offset_north, Call, SyntheticWorld};

    fn moscow() -> Coordinate {
        Coordinate::new(55.7558, 37.6173)
    }

    fn place() -> Place {
        Place::new("Bonsai")
            .with_address("Moscow")
            .with_category("Restaurant")
    }

    fn hit(coordinate: Coordinate) -> Vec<GeocodeMatch> {
        vec![GeocodeMatch {
            coordinate,
            display_name: "Moscow, Russia".to_string(),
        }]
    }

    fn route_to(destination: Coordinate) -> Route {
        Route {
            polyline: vec![Coordinate::new(55.70, 37.50), destination],
            distance_meters: 12_400.0,
            eta_seconds: 1_320.0,
        }
    }

    /// Tracker with the destination already resolved to `moscow()`.
    fn resolved(world: &SyntheticWorld) -> PlaceTracker {
        let mut tracker = world.tracker(TrackerConfig::default());
        let ticket = tracker.resolve_place(&place()).unwrap();
        tracker.on_geocode_complete(ticket, Ok(hit(moscow())));
        world.recorder.clear();
        tracker
    }

    // ------------------------------------------------------------------------
    // Geocoding
    // ------------------------------------------------------------------------

    #[test]
    fn test_resolve_place_shows_annotation() {
        let world = SyntheticWorld::new();
        let mut tracker = world.tracker(TrackerConfig::default());

        let ticket = tracker.resolve_place(&place()).unwrap();
        assert_eq!(
            world.recorder.calls(),
            vec![Call::Geocode {
                ticket,
                address: "Moscow".to_string()
            }]
        );

        let annotation = tracker
            .on_geocode_complete(ticket, Ok(hit(moscow())))
            .unwrap()
            .unwrap();
        assert_eq!(annotation.title, "Bonsai");
        assert_eq!(annotation.subtitle.as_deref(), Some("Restaurant"));
        assert_eq!(tracker.destination(), Some(moscow()));
        assert!(world
            .recorder
            .calls()
            .contains(&Call::ShowAnnotation(annotation)));
    }

    #[test]
    fn test_zero_matches_is_geocode_error() {
        let world = SyntheticWorld::new();
        let mut tracker = world.tracker(TrackerConfig::default());

        let ticket = tracker.resolve_place(&place()).unwrap();
        let result = tracker.on_geocode_complete(ticket, Ok(vec![])).unwrap();

        assert!(matches!(result, Err(TrackerError::Geocode { .. })));
        assert_eq!(tracker.destination(), None);
        assert_eq!(world.recorder.alerts().len(), 1);
    }

    #[test]
    fn test_geocoder_failure_caches_nothing() {
        let world = SyntheticWorld::new();
        let mut tracker = world.tracker(TrackerConfig::default());

        let ticket = tracker.resolve_place(&place()).unwrap();
        let result = tracker
            .on_geocode_complete(ticket, Err(ClientError::new("offline")))
            .unwrap();

        assert_eq!(
            result,
            Err(TrackerError::Geocode {
                reason: "offline".to_string()
            })
        );
        assert_eq!(tracker.destination(), None);
    }

    #[test]
    fn test_place_without_address_fails_immediately() {
        let world = SyntheticWorld::new();
        let mut tracker = world.tracker(TrackerConfig::default());

        let result = tracker.resolve_place(&Place::new("Nowhere"));
        assert!(matches!(result, Err(TrackerError::Geocode { .. })));
        assert!(world.recorder.calls().is_empty());
    }

    #[test]
    fn test_resolving_again_reissues_and_drops_old_answer() {
        let world = SyntheticWorld::new();
        let mut tracker = world.tracker(TrackerConfig::default());

        let first = tracker.resolve_place(&place()).unwrap();
        let second = tracker.resolve_place(&place()).unwrap();
        assert_ne!(first, second);
        assert_eq!(world.recorder.geocode_count(), 2);

        assert!(tracker.on_geocode_complete(first, Ok(hit(moscow()))).is_none());
        assert_eq!(tracker.destination(), None);

        assert!(tracker
            .on_geocode_complete(second, Ok(hit(moscow())))
            .unwrap()
            .is_ok());
        assert_eq!(tracker.destination(), Some(moscow()));
    }

    #[test]
    fn test_new_place_invalidates_destination() {
        let world = SyntheticWorld::new();
        let mut tracker = resolved(&world);
        assert!(tracker.destination().is_some());

        tracker
            .resolve_place(&Place::new("Kitchen").with_address("Tverskaya 1"))
            .unwrap();
        assert_eq!(tracker.destination(), None);
        assert_eq!(
            tracker.request_route(moscow()),
            Err(TrackerError::NoDestination)
        );
    }

    #[test]
    fn test_new_place_clears_old_route() {
        let world = SyntheticWorld::new();
        let mut tracker = resolved(&world);
        let handle = tracker.request_route(Coordinate::new(55.70, 37.50)).unwrap();
        tracker.on_route_complete(handle, Ok(vec![route_to(moscow())]));
        assert_eq!(tracker.last_routes().len(), 1);
        world.recorder.clear();

        tracker
            .resolve_place(&Place::new("Kitchen").with_address("Tverskaya 1"))
            .unwrap();
        assert!(tracker.last_routes().is_empty());
        assert_eq!(world.recorder.count(&Call::ClearOverlays), 1);
        let cleared = world.recorder.position(|c| *c == Call::ClearOverlays).unwrap();
        let geocoded = world
            .recorder
            .position(|c| matches!(c, Call::Geocode { .. }))
            .unwrap();
        assert!(cleared < geocoded);
    }

    // ------------------------------------------------------------------------
    // Routing
    // ------------------------------------------------------------------------

    #[test]
    fn test_route_requires_destination() {
        let world = SyntheticWorld::new();
        let mut tracker = world.tracker(TrackerConfig::default());

        let result = tracker.request_route(moscow());
        assert_eq!(result, Err(TrackerError::NoDestination));
        assert!(world.recorder.alerts().is_empty());
        assert_eq!(world.recorder.route_count(), 0);
    }

    #[test]
    fn test_route_request_shape() {
        let world = SyntheticWorld::new();
        let mut tracker = resolved(&world);
        let origin = Coordinate::new(55.70, 37.50);

        let handle = tracker.request_route(origin).unwrap();

        let calls = world.recorder.calls();
        assert_eq!(calls[0], Call::ClearOverlays);
        match &calls[1] {
            Call::Route { handle: h, request } => {
                assert_eq!(*h, handle);
                assert_eq!(request.origin, origin);
                assert_eq!(request.destination, moscow());
                assert!(request.allow_alternates);
            }
            other => panic!("unexpected call {:?}", other),
        }
        assert_eq!(tracker.pending_route(), Some(handle));
        assert_eq!(tracker.last_center(), Some(origin));
    }

    #[test]
    fn test_second_request_cancels_first() {
        let world = SyntheticWorld::new();
        let mut tracker = resolved(&world);

        let first = tracker.request_route(Coordinate::new(55.70, 37.50)).unwrap();
        let second = tracker.request_route(Coordinate::new(55.71, 37.51)).unwrap();

        assert_eq!(world.recorder.cancelled(), vec![first]);
        assert_eq!(tracker.pending_route(), Some(second));

        // Late answer for the first request is discarded
        assert!(tracker
            .on_route_complete(first, Ok(vec![route_to(moscow())]))
            .is_none());
        assert_eq!(world.recorder.polylines().len(), 0);

        let drawn = tracker
            .on_route_complete(second, Ok(vec![route_to(moscow())]))
            .unwrap();
        assert_eq!(drawn, Ok(1));
        assert_eq!(tracker.pending_route(), None);
    }

    #[test]
    fn test_routes_are_drawn_and_fitted() {
        let world = SyntheticWorld::new();
        let mut tracker = resolved(&world);
        let handle = tracker.request_route(Coordinate::new(55.70, 37.50)).unwrap();
        world.recorder.clear();

        let routes = vec![route_to(moscow()), route_to(moscow())];
        assert_eq!(tracker.on_route_complete(handle, Ok(routes)), Some(Ok(2)));

        assert_eq!(world.recorder.polylines().len(), 2);
        let fits: Vec<_> = world
            .recorder
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::FitBounds(points) => Some(points),
                _ => None,
            })
            .collect();
        assert_eq!(fits.len(), 1);
        assert_eq!(fits[0].len(), 4);
        assert_eq!(tracker.last_routes().len(), 2);
    }

    #[test]
    fn test_empty_route_answer_alerts() {
        let world = SyntheticWorld::new();
        let mut tracker = resolved(&world);
        let handle = tracker.request_route(Coordinate::new(55.70, 37.50)).unwrap();

        let result = tracker.on_route_complete(handle, Ok(vec![]));
        assert_eq!(result, Some(Err(TrackerError::NoRouteFound)));
        assert_eq!(world.recorder.alerts().len(), 1);
    }

    #[test]
    fn test_transport_error_is_not_alerted() {
        let world = SyntheticWorld::new();
        let mut tracker = resolved(&world);
        let handle = tracker.request_route(Coordinate::new(55.70, 37.50)).unwrap();

        let result = tracker.on_route_complete(handle, Err(ClientError::new("timeout")));
        assert!(matches!(
            result,
            Some(Err(TrackerError::RoutingTransport { .. }))
        ));
        assert!(world.recorder.alerts().is_empty());
        assert_eq!(tracker.pending_route(), None);
    }

    #[test]
    fn test_route_from_current_location_without_fix() {
        let world = SyntheticWorld::new();
        let mut tracker = resolved(&world);

        let result = tracker.request_route_from_current_location();
        assert_eq!(result, Err(TrackerError::NoCurrentLocation));
        assert_eq!(world.recorder.alerts().len(), 1);

        world.device.set_last_known(Some(Coordinate::new(55.70, 37.50)));
        assert!(tracker.request_route_from_current_location().is_ok());
    }

    #[test]
    fn test_handle_from_other_session_is_stale() {
        let world = SyntheticWorld::new();
        let mut tracker = resolved(&world);
        let handle = tracker.request_route(Coordinate::new(55.70, 37.50)).unwrap();

        let foreign = RouteHandle {
            session_id: handle.session_id + 1000,
            generation: handle.generation,
        };
        assert!(tracker.on_route_complete(foreign, Ok(vec![])).is_none());
        assert_eq!(tracker.pending_route(), Some(handle));
    }

    // ------------------------------------------------------------------------
    // Movement
    // ------------------------------------------------------------------------

    #[test]
    fn test_first_fix_primes_only() {
        let world = SyntheticWorld::new();
        let mut tracker = world.tracker(TrackerConfig::default());
        let a = Coordinate::new(0.0, 0.0);

        assert!(tracker.on_position_fix(a, None).is_none());
        assert_eq!(tracker.last_center(), Some(a));
    }

    #[test]
    fn test_recenter_scenario() {
        let world = SyntheticWorld::new();
        let mut tracker = world.tracker(TrackerConfig::default());
        let a = Coordinate::new(0.0, 0.0);
        let b = offset_north(a, 60.0);
        let c = offset_north(b, 10.0);

        assert!(tracker.on_position_fix(a, None).is_none());

        let command = tracker.on_position_fix(b, None).unwrap();
        assert_eq!(command.center, b);
        assert_eq!(command.span_meters, 1000.0);
        assert_eq!(tracker.last_center(), Some(b));

        assert!(tracker.on_position_fix(c, None).is_none());
        assert_eq!(tracker.last_center(), Some(b));
    }

    #[test]
    fn test_jitter_never_recenters() {
        let world = SyntheticWorld::new();
        let mut tracker = world.tracker(TrackerConfig::default());
        let a = Coordinate::new(55.7558, 37.6173);

        assert!(tracker.on_position_fix(a, None).is_none());
        for meters in [5.0, 20.0, 49.0, 35.0, 0.0] {
            assert!(tracker.on_position_fix(offset_north(a, meters), None).is_none());
        }
        assert_eq!(tracker.last_center(), Some(a));
    }

    #[test]
    fn test_visual_center_is_reference_when_supplied() {
        let world = SyntheticWorld::new();
        let mut tracker = world.tracker(TrackerConfig::default());
        let a = Coordinate::new(0.0, 0.0);
        tracker.on_position_fix(a, None);

        // Close to the last center but far from where the user panned the map
        let fix = offset_north(a, 10.0);
        let panned = offset_north(a, 500.0);
        let command = tracker.on_position_fix(fix, Some(panned)).unwrap();
        assert_eq!(command.center, fix);
    }

    #[test]
    fn test_custom_threshold() {
        let world = SyntheticWorld::new();
        let config = TrackerConfig {
            recenter_threshold_meters: 5.0,
            ..TrackerConfig::default()
        };
        let mut tracker = world.tracker(config);
        let a = Coordinate::new(0.0, 0.0);
        tracker.on_position_fix(a, None);
        assert!(tracker.on_position_fix(offset_north(a, 10.0), None).is_some());
    }

    // ------------------------------------------------------------------------
    // Authorization
    // ------------------------------------------------------------------------

    #[test]
    fn test_services_disabled() {
        let world = SyntheticWorld::new();
        world.device.set_services_enabled(false);
        let mut tracker = world.tracker(TrackerConfig::default());

        assert_eq!(tracker.begin_tracking(), TrackingPhase::ServicesDisabled);
        let alerts = world.recorder.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].0, "Location Services are Disabled");
        assert_eq!(world.recorder.count(&Call::StartUpdates), 0);
    }

    #[test]
    fn test_authorized_starts_streaming() {
        let world = SyntheticWorld::new();
        world
            .device
            .set_authorization(AuthorizationState::AuthorizedWhileInUse);
        let mut tracker = world.tracker(TrackerConfig::default());

        assert_eq!(tracker.begin_tracking(), TrackingPhase::Streaming);
        assert!(tracker.is_streaming());
        assert_eq!(world.recorder.count(&Call::StartUpdates), 1);
        assert_eq!(world.recorder.count(&Call::ShowUserMarker(true)), 1);
        // ShowPlace mode does not move the map to the user
        assert!(world.recorder.regions().is_empty());
    }

    #[test]
    fn test_pick_address_centers_on_user() {
        let world = SyntheticWorld::new();
        let here = Coordinate::new(55.75, 37.61);
        world.device.set_authorization(AuthorizationState::AuthorizedAlways);
        world.device.set_last_known(Some(here));
        let mut tracker =
            world.tracker(TrackerConfig::default().with_map_mode(MapMode::PickAddress));

        tracker.begin_tracking();
        assert_eq!(world.recorder.regions(), vec![(here, 1000.0)]);
    }

    #[test]
    fn test_undetermined_then_denied() {
        let world = SyntheticWorld::new();
        let mut tracker = world.tracker(TrackerConfig::default());

        assert_eq!(tracker.begin_tracking(), TrackingPhase::AwaitingAuthorization);
        assert_eq!(world.recorder.count(&Call::RequestAuthorization), 1);

        assert_eq!(
            tracker.on_authorization_changed(AuthorizationState::Denied),
            TrackingPhase::Blocked
        );
        // Duplicate report is ignored
        tracker.on_authorization_changed(AuthorizationState::Denied);

        assert_eq!(world.recorder.alerts().len(), 1);
        assert_eq!(world.recorder.count(&Call::StartUpdates), 0);
        assert_eq!(world.recorder.count(&Call::RequestAuthorization), 1);
    }

    #[test]
    fn test_undetermined_again_prompts_again() {
        let world = SyntheticWorld::new();
        let mut tracker = world.tracker(TrackerConfig::default());

        tracker.begin_tracking();
        tracker.on_authorization_changed(AuthorizationState::Denied);
        // "Ask next time" puts the app back to undetermined
        assert_eq!(
            tracker.on_authorization_changed(AuthorizationState::Undetermined),
            TrackingPhase::AwaitingAuthorization
        );
        assert_eq!(world.recorder.count(&Call::RequestAuthorization), 2);

        // Repeating the same report does not prompt again
        tracker.on_authorization_changed(AuthorizationState::Undetermined);
        tracker.begin_tracking();
        assert_eq!(world.recorder.count(&Call::RequestAuthorization), 2);
    }

    #[test]
    fn test_blocked_accepts_later_grant() {
        let world = SyntheticWorld::new();
        world.device.set_authorization(AuthorizationState::Denied);
        let mut tracker = world.tracker(TrackerConfig::default());
        assert_eq!(tracker.begin_tracking(), TrackingPhase::Blocked);

        assert_eq!(
            tracker.on_authorization_changed(AuthorizationState::AuthorizedWhileInUse),
            TrackingPhase::Streaming
        );
        assert_eq!(world.recorder.count(&Call::StartUpdates), 1);
    }

    #[test]
    fn test_revocation_stops_streaming() {
        let world = SyntheticWorld::new();
        world
            .device
            .set_authorization(AuthorizationState::AuthorizedWhileInUse);
        let mut tracker = world.tracker(TrackerConfig::default());
        tracker.begin_tracking();

        tracker.on_authorization_changed(AuthorizationState::Restricted);
        assert!(!tracker.is_streaming());
        assert_eq!(world.recorder.count(&Call::StopUpdates), 1);
        assert_eq!(world.recorder.count(&Call::ShowUserMarker(false)), 1);
        // Restricted is not alerted
        assert!(world.recorder.alerts().is_empty());
    }

    #[test]
    fn test_authorization_before_begin_is_recorded() {
        let world = SyntheticWorld::new();
        let mut tracker = world.tracker(TrackerConfig::default());

        assert_eq!(
            tracker.on_authorization_changed(AuthorizationState::AuthorizedAlways),
            TrackingPhase::Idle
        );
        assert_eq!(tracker.authorization_state(), AuthorizationState::AuthorizedAlways);
        assert!(world.recorder.calls().is_empty());
    }

    #[test]
    fn test_services_reenabled_on_next_callback() {
        let world = SyntheticWorld::new();
        world.device.set_services_enabled(false);
        let mut tracker = world.tracker(TrackerConfig::default());
        tracker.begin_tracking();

        world.device.set_services_enabled(true);
        world
            .device
            .set_authorization(AuthorizationState::AuthorizedWhileInUse);
        assert_eq!(
            tracker.on_authorization_changed(AuthorizationState::AuthorizedWhileInUse),
            TrackingPhase::Streaming
        );
    }

    #[test]
    fn test_services_still_disabled_alerts_once() {
        let world = SyntheticWorld::new();
        world.device.set_services_enabled(false);
        let mut tracker = world.tracker(TrackerConfig::default());
        tracker.begin_tracking();

        for _ in 0..3 {
            assert_eq!(
                tracker.on_authorization_changed(AuthorizationState::Undetermined),
                TrackingPhase::ServicesDisabled
            );
        }
        assert_eq!(world.recorder.alerts().len(), 1);
        assert_eq!(world.recorder.count(&Call::RequestAuthorization), 0);
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    #[test]
    fn test_teardown_twice() {
        let world = SyntheticWorld::new();
        let mut tracker = resolved(&world);
        let handle = tracker.request_route(Coordinate::new(55.70, 37.50)).unwrap();

        tracker.teardown();
        tracker.teardown();

        assert_eq!(tracker.pending_route(), None);
        assert!(!tracker.is_streaming());
        assert_eq!(world.recorder.cancelled(), vec![handle]);
        assert_eq!(world.recorder.count(&Call::StopUpdates), 1);
        assert_eq!(tracker.phase(), TrackingPhase::Closed);
    }

    #[test]
    fn test_teardown_without_pending_route() {
        let world = SyntheticWorld::new();
        let mut tracker = world.tracker(TrackerConfig::default());
        tracker.teardown();
        assert!(world.recorder.cancelled().is_empty());
        assert_eq!(world.recorder.count(&Call::StopUpdates), 1);
    }

    #[test]
    fn test_closed_session_rejects_work() {
        let world = SyntheticWorld::new();
        let mut tracker = resolved(&world);
        let handle = tracker.request_route(Coordinate::new(55.70, 37.50)).unwrap();
        tracker.teardown();

        assert_eq!(
            tracker.request_route(moscow()),
            Err(TrackerError::SessionClosed)
        );
        assert_eq!(
            tracker.resolve_place(&place()),
            Err(TrackerError::SessionClosed)
        );
        assert!(tracker.on_route_complete(handle, Ok(vec![])).is_none());
        assert!(tracker
            .on_position_fix(Coordinate::new(1.0, 1.0), None)
            .is_none());
        assert_eq!(tracker.begin_tracking(), TrackingPhase::Closed);
    }

    #[test]
    fn test_drop_tears_down() {
        let world = SyntheticWorld::new();
        {
            let mut tracker = resolved(&world);
            tracker.request_route(Coordinate::new(55.70, 37.50)).unwrap();
        }
        assert_eq!(world.recorder.cancelled().len(), 1);
        assert_eq!(world.recorder.count(&Call::StopUpdates), 1);
    }
}
