//! Unified error handling for the place-tracker library.
//!
//! Every failure a session can hit maps onto [`TrackerError`]. Errors that the
//! user should see carry an alert text via [`TrackerError::alert`]; the rest
//! are logic faults or transport noise and are only logged.

use thiserror::Error;

/// Unified error type for place-tracker operations.
#[derive(Debug, Clone, PartialEq, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
pub enum TrackerError {
    /// The address had no geocoder match or the geocoder failed
    #[error("Geocoding failed: {reason}")]
    Geocode { reason: String },
    /// Location services are switched off device-wide
    #[error("Location services are disabled")]
    ServicesDisabled,
    /// The app is not allowed to read the user's location
    #[error("Location permission denied")]
    PermissionDenied,
    /// A route was requested before the place was geocoded
    #[error("Route requested before the destination was resolved")]
    NoDestination,
    /// No position fix is available to start a route from
    #[error("Current location is not available")]
    NoCurrentLocation,
    /// The router answered with no routes
    #[error("No route found to the destination")]
    NoRouteFound,
    /// The router failed to answer
    #[error("Routing transport error: {message}")]
    RoutingTransport { message: String },
    /// The session was torn down
    #[error("Tracking session is closed")]
    SessionClosed,
    /// Persistence/storage error
    #[error("Persistence error: {message}")]
    Persistence { message: String },
    /// HTTP/API error
    #[error("HTTP error ({status_code:?}): {message}")]
    Http {
        message: String,
        status_code: Option<u16>,
    },
    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TrackerError {
    /// Title and message for the alert shown to the user, if this error is
    /// user-facing.
    pub fn alert(&self) -> Option<(&'static str, String)> {
        match self {
            TrackerError::Geocode { reason } => {
                Some(("Address not found", format!("Could not locate this place: {}", reason)))
            }
            TrackerError::ServicesDisabled => Some((
                "Location Services are Disabled",
                "To enable it go: Settings -> Privacy -> Location Services and turn On"
                    .to_string(),
            )),
            TrackerError::PermissionDenied => Some((
                "Your location is not Available",
                "To give permissions Go to: Settings -> MyPlaces -> Location".to_string(),
            )),
            TrackerError::NoCurrentLocation => {
                Some(("Error", "Current location is not found".to_string()))
            }
            TrackerError::NoRouteFound => {
                Some(("Error", "Direction is not available".to_string()))
            }
            TrackerError::NoDestination
            | TrackerError::RoutingTransport { .. }
            | TrackerError::SessionClosed
            | TrackerError::Persistence { .. }
            | TrackerError::Http { .. }
            | TrackerError::Internal { .. } => None,
        }
    }
}

#[cfg(feature = "persistence")]
impl From<rusqlite::Error> for TrackerError {
    fn from(err: rusqlite::Error) -> Self {
        TrackerError::Persistence {
            message: err.to_string(),
        }
    }
}

/// Result type alias for place-tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Failure reported by a geocoding or routing collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClientError {
    pub message: String,
}

impl ClientError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
