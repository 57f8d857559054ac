//! Recording collaborators for deterministic tests.
//!
//! Every collaborator call is appended to a shared [`Recorder`]; the
//! location source answers from a mutable [`DeviceState`]. Nothing here ever
//! completes a request on its own, so tests decide exactly when (and in what
//! order) geocode and route answers arrive.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::clients::{GeocodingClient, LocationSource, MapPresenter, RoutingClient};
use crate::{
    AuthorizationState, Coordinate, GeocodeTicket, PlaceTracker, ResolvedAnnotation, RouteHandle,
    RouteRequest, TrackerConfig, TrackingSession,
};

/// Meters per degree of latitude on the sphere used by haversine distance.
const METERS_PER_DEGREE: f64 = 6_371_008.8 * std::f64::consts::PI / 180.0;

/// Move `from` due north by `meters`.
pub fn offset_north(from: Coordinate, meters: f64) -> Coordinate {
    Coordinate::new(from.latitude + meters / METERS_PER_DEGREE, from.longitude)
}

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Geocode {
        ticket: GeocodeTicket,
        address: String,
    },
    Route {
        handle: RouteHandle,
        request: RouteRequest,
    },
    CancelRoute(RouteHandle),
    RequestAuthorization,
    StartUpdates,
    StopUpdates,
    ShowAnnotation(ResolvedAnnotation),
    ShowUserMarker(bool),
    SetRegion {
        center: Coordinate,
        span_meters: f64,
    },
    DrawPolyline(Vec<Coordinate>),
    ClearOverlays,
    FitBounds(Vec<Coordinate>),
    ShowAlert {
        title: String,
        message: String,
    },
}

/// Shared, ordered log of collaborator calls.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    calls: Arc<Mutex<Vec<Call>>>,
}

impl Recorder {
    fn lock(&self) -> MutexGuard<'_, Vec<Call>> {
        // A panicking test thread must not hide the log from the others
        self.calls.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn push(&self, call: Call) {
        self.lock().push(call);
    }

    /// All calls so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.lock().clone()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of calls equal to `call`.
    pub fn count(&self, call: &Call) -> usize {
        self.lock().iter().filter(|c| *c == call).count()
    }

    pub fn geocode_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|c| matches!(c, Call::Geocode { .. }))
            .count()
    }

    pub fn route_count(&self) -> usize {
        self.lock()
            .iter()
            .filter(|c| matches!(c, Call::Route { .. }))
            .count()
    }

    /// Handles passed to `RoutingClient::cancel`, in order.
    pub fn cancelled(&self) -> Vec<RouteHandle> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                Call::CancelRoute(handle) => Some(*handle),
                _ => None,
            })
            .collect()
    }

    pub fn alerts(&self) -> Vec<(String, String)> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                Call::ShowAlert { title, message } => Some((title.clone(), message.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn polylines(&self) -> Vec<Vec<Coordinate>> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                Call::DrawPolyline(points) => Some(points.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn regions(&self) -> Vec<(Coordinate, f64)> {
        self.lock()
            .iter()
            .filter_map(|c| match c {
                Call::SetRegion {
                    center,
                    span_meters,
                } => Some((*center, *span_meters)),
                _ => None,
            })
            .collect()
    }

    /// Index of the first call matching `pred`.
    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.lock().iter().position(pred)
    }
}

#[derive(Debug, Clone)]
struct Device {
    services_enabled: bool,
    authorization: AuthorizationState,
    last_known: Option<Coordinate>,
}

/// What the synthetic location source reports.
#[derive(Debug, Clone)]
pub struct DeviceState {
    inner: Arc<Mutex<Device>>,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Device {
                services_enabled: true,
                authorization: AuthorizationState::Undetermined,
                last_known: None,
            })),
        }
    }
}

impl DeviceState {
    fn lock(&self) -> MutexGuard<'_, Device> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_services_enabled(&self, enabled: bool) {
        self.lock().services_enabled = enabled;
    }

    pub fn set_authorization(&self, state: AuthorizationState) {
        self.lock().authorization = state;
    }

    pub fn set_last_known(&self, position: Option<Coordinate>) {
        self.lock().last_known = position;
    }
}

struct RecordingGeocoder {
    recorder: Recorder,
}

impl GeocodingClient for RecordingGeocoder {
    fn geocode(&self, ticket: GeocodeTicket, address: String) {
        self.recorder.push(Call::Geocode { ticket, address });
    }
}

struct RecordingRouter {
    recorder: Recorder,
}

impl RoutingClient for RecordingRouter {
    fn route(&self, handle: RouteHandle, request: RouteRequest) {
        self.recorder.push(Call::Route { handle, request });
    }

    fn cancel(&self, handle: RouteHandle) {
        self.recorder.push(Call::CancelRoute(handle));
    }
}

struct SyntheticLocation {
    recorder: Recorder,
    device: DeviceState,
}

impl LocationSource for SyntheticLocation {
    fn services_enabled(&self) -> bool {
        self.device.lock().services_enabled
    }

    fn authorization_state(&self) -> AuthorizationState {
        self.device.lock().authorization
    }

    fn request_authorization(&self) {
        self.recorder.push(Call::RequestAuthorization);
    }

    fn start_updates(&self) {
        self.recorder.push(Call::StartUpdates);
    }

    fn stop_updates(&self) {
        self.recorder.push(Call::StopUpdates);
    }

    fn last_known_position(&self) -> Option<Coordinate> {
        self.device.lock().last_known
    }
}

struct RecordingPresenter {
    recorder: Recorder,
}

impl MapPresenter for RecordingPresenter {
    fn show_annotation(&self, annotation: ResolvedAnnotation) {
        self.recorder.push(Call::ShowAnnotation(annotation));
    }

    fn show_user_marker(&self, visible: bool) {
        self.recorder.push(Call::ShowUserMarker(visible));
    }

    fn set_region(&self, center: Coordinate, span_meters: f64) {
        self.recorder.push(Call::SetRegion {
            center,
            span_meters,
        });
    }

    fn draw_polyline(&self, points: Vec<Coordinate>) {
        self.recorder.push(Call::DrawPolyline(points));
    }

    fn clear_overlays(&self) {
        self.recorder.push(Call::ClearOverlays);
    }

    fn fit_bounds(&self, points: Vec<Coordinate>) {
        self.recorder.push(Call::FitBounds(points));
    }

    fn show_alert(&self, title: String, message: String) {
        self.recorder.push(Call::ShowAlert { title, message });
    }
}

/// A recorder plus a device, able to build trackers wired to both.
#[derive(Debug, Clone, Default)]
pub struct SyntheticWorld {
    pub recorder: Recorder,
    pub device: DeviceState,
}

impl SyntheticWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// A tracker whose collaborators all record into `self.recorder`.
    pub fn tracker(&self, config: TrackerConfig) -> PlaceTracker {
        PlaceTracker::new(
            config,
            Box::new(RecordingGeocoder {
                recorder: self.recorder.clone(),
            }),
            Box::new(RecordingRouter {
                recorder: self.recorder.clone(),
            }),
            Box::new(SyntheticLocation {
                recorder: self.recorder.clone(),
                device: self.device.clone(),
            }),
            Box::new(RecordingPresenter {
                recorder: self.recorder.clone(),
            }),
        )
    }

    /// Same as [`Self::tracker`], wrapped in a shared session.
    pub fn session(&self, config: TrackerConfig) -> TrackingSession {
        TrackingSession::new(self.tracker(config))
    }
}
