//! Collaborator interfaces the tracker drives.
//!
//! The platform (or the HTTP adapters) implements these. Requests are
//! fire-and-forget: an implementation keeps the [`GeocodeTicket`] or
//! [`RouteHandle`] it was given and reports the outcome later through
//! [`crate::ClientEvent`] or the tracker's `on_*_complete` handlers.
//!
//! Implementations must not call back into the session from inside these
//! methods; the session lock is held while they run.
//!
//! With the `ffi` feature these are UniFFI callback interfaces, implemented in
//! Swift/Kotlin.

use crate::{
    AuthorizationState, Coordinate, GeocodeTicket, ResolvedAnnotation, RouteHandle, RouteRequest,
};

/// Resolves free-text addresses into coordinates.
#[cfg_attr(feature = "ffi", uniffi::export(callback_interface))]
pub trait GeocodingClient: Send + Sync {
    /// Start geocoding `address`. The outcome must be reported with `ticket`.
    fn geocode(&self, ticket: GeocodeTicket, address: String);
}

/// Computes driving routes.
#[cfg_attr(feature = "ffi", uniffi::export(callback_interface))]
pub trait RoutingClient: Send + Sync {
    /// Start computing routes for `request`. The outcome must be reported with `handle`.
    fn route(&self, handle: RouteHandle, request: RouteRequest);

    /// Abandon the request tagged `handle`. Unknown or finished handles are ignored.
    fn cancel(&self, handle: RouteHandle);
}

/// The device's location service.
#[cfg_attr(feature = "ffi", uniffi::export(callback_interface))]
pub trait LocationSource: Send + Sync {
    /// Whether location services are enabled device-wide.
    fn services_enabled(&self) -> bool;

    fn authorization_state(&self) -> AuthorizationState;

    /// Ask the user for when-in-use permission. The answer arrives as an
    /// authorization change.
    fn request_authorization(&self);

    /// Begin delivering position fixes.
    fn start_updates(&self);

    fn stop_updates(&self);

    /// The most recent fix the platform knows about.
    fn last_known_position(&self) -> Option<Coordinate>;
}

/// The map view.
#[cfg_attr(feature = "ffi", uniffi::export(callback_interface))]
pub trait MapPresenter: Send + Sync {
    /// Show and select the place marker.
    fn show_annotation(&self, annotation: ResolvedAnnotation);

    fn show_user_marker(&self, visible: bool);

    fn set_region(&self, center: Coordinate, span_meters: f64);

    fn draw_polyline(&self, points: Vec<Coordinate>);

    /// Remove every route overlay.
    fn clear_overlays(&self);

    /// Zoom so that every point is visible.
    fn fit_bounds(&self, points: Vec<Coordinate>);

    fn show_alert(&self, title: String, message: String);
}
