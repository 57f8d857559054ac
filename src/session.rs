//! # Tracking Session
//!
//! Thread-safe handle around a [`PlaceTracker`]. Every operation takes the
//! session lock, so commands from the UI thread, position fixes and
//! collaborator answers are applied one at a time in arrival order.
//!
//! Collaborators report answers as [`ClientEvent`]s over a channel created
//! with [`TrackingSession::event_channel`]. The receiving side is drained
//! either on the owning thread ([`TrackingSession::pump_events`]) or on a
//! dedicated thread ([`TrackingSession::spawn_event_loop`]).

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};

use log::{debug, error, info};

use crate::{
    AuthorizationState, ClientError, Coordinate, GeocodeMatch, GeocodeTicket, Place, PlaceTracker,
    RecenterCommand, ResolvedAnnotation, Result, Route, RouteHandle, TrackerError, TrackingPhase,
};

/// Answer from a geocoding or routing collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    GeocodeFinished {
        ticket: GeocodeTicket,
        outcome: std::result::Result<Vec<GeocodeMatch>, ClientError>,
    },
    RouteFinished {
        handle: RouteHandle,
        outcome: std::result::Result<Vec<Route>, ClientError>,
    },
}

/// What applying a [`ClientEvent`] produced.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    Resolved(Result<ResolvedAnnotation>),
    Routed(Result<usize>),
}

/// Sending half handed to collaborator adapters.
pub type EventSender = Sender<ClientEvent>;

/// Shared, serialized handle to one tracking session.
#[derive(Clone)]
pub struct TrackingSession {
    inner: Arc<Mutex<PlaceTracker>>,
}

impl TrackingSession {
    pub fn new(tracker: PlaceTracker) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tracker)),
        }
    }

    /// Channel for collaborator answers.
    pub fn event_channel() -> (EventSender, Receiver<ClientEvent>) {
        mpsc::channel()
    }

    /// Run `f` with exclusive access to the tracker.
    pub fn with_tracker<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut PlaceTracker) -> R,
    {
        let mut guard = self.inner.lock().map_err(|_| TrackerError::Internal {
            message: "tracking session lock poisoned".to_string(),
        })?;
        Ok(f(&mut guard))
    }

    pub fn session_id(&self) -> Result<u64> {
        self.with_tracker(|t| t.session_id())
    }

    pub fn phase(&self) -> Result<TrackingPhase> {
        self.with_tracker(|t| t.phase())
    }

    // ========================================================================
    // Commands
    // ========================================================================

    pub fn resolve_place(&self, place: &Place) -> Result<GeocodeTicket> {
        self.with_tracker(|t| t.resolve_place(place))?
    }

    pub fn begin_tracking(&self) -> Result<TrackingPhase> {
        self.with_tracker(|t| t.begin_tracking())
    }

    pub fn on_authorization_changed(&self, state: AuthorizationState) -> Result<TrackingPhase> {
        self.with_tracker(|t| t.on_authorization_changed(state))
    }

    pub fn request_route(&self, current_fix: Coordinate) -> Result<RouteHandle> {
        self.with_tracker(|t| t.request_route(current_fix))?
    }

    pub fn request_route_from_current_location(&self) -> Result<RouteHandle> {
        self.with_tracker(|t| t.request_route_from_current_location())?
    }

    pub fn on_position_fix(
        &self,
        fix: Coordinate,
        visual_center: Option<Coordinate>,
    ) -> Result<Option<RecenterCommand>> {
        self.with_tracker(|t| t.on_position_fix(fix, visual_center))
    }

    pub fn teardown(&self) -> Result<()> {
        self.with_tracker(|t| t.teardown())
    }

    // ========================================================================
    // Collaborator answers
    // ========================================================================

    /// Apply one collaborator answer. `Ok(None)` means it was stale.
    pub fn dispatch(&self, event: ClientEvent) -> Result<Option<EventOutcome>> {
        self.with_tracker(|t| match event {
            ClientEvent::GeocodeFinished { ticket, outcome } => t
                .on_geocode_complete(ticket, outcome)
                .map(EventOutcome::Resolved),
            ClientEvent::RouteFinished { handle, outcome } => t
                .on_route_complete(handle, outcome)
                .map(EventOutcome::Routed),
        })
    }

    /// Apply every answer already waiting in `events` without blocking.
    ///
    /// Returns how many events were applied (stale ones included).
    pub fn pump_events(&self, events: &Receiver<ClientEvent>) -> Result<usize> {
        let mut applied = 0;
        while let Ok(event) = events.try_recv() {
            self.dispatch(event)?;
            applied += 1;
        }
        if applied > 0 {
            debug!("[TrackingSession] Applied {} client events", applied);
        }
        Ok(applied)
    }

    /// Apply answers on a background thread until every sender is dropped or
    /// the session itself is gone.
    pub fn spawn_event_loop(&self, events: Receiver<ClientEvent>) -> JoinHandle<()> {
        let session: Weak<Mutex<PlaceTracker>> = Arc::downgrade(&self.inner);
        thread::spawn(move || {
            for event in events.iter() {
                let Some(inner) = session.upgrade() else {
                    break;
                };
                if let Err(e) = (TrackingSession { inner }).dispatch(event) {
                    error!("[TrackingSession] Event loop stopped: {}", e);
                    break;
                }
            }
            info!("[TrackingSession] Event loop finished");
        })
    }
}

impl std::fmt::Debug for TrackingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingSession")
            .field("strong_count", &Arc::strong_count(&self.inner))
            .finish()
    }
}
