//! HTTP geocoding and routing adapters.
//!
//! - [`NominatimGeocoder`] resolves addresses with the Nominatim search API
//! - [`OsrmRouter`] computes driving routes with the OSRM route service
//!
//! Requests run as tasks on a caller-supplied tokio runtime. Answers are
//! posted to the session's event channel as [`ClientEvent`]s, never applied
//! directly, so the session lock is never taken from inside a collaborator.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use log::{debug, info, warn};
use reqwest::Client;
use serde::Deserialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::clients::{GeocodingClient, RoutingClient};
use crate::session::{ClientEvent, EventSender};
use crate::{
    ClientError, Coordinate, GeocodeMatch, GeocodeTicket, Result, Route, RouteHandle,
    RouteRequest, ServiceEndpoints, TrackerError,
};

const MAX_GEOCODE_RESULTS: &str = "5";

fn build_client(endpoints: &ServiceEndpoints) -> Result<Client> {
    Client::builder()
        .user_agent(endpoints.user_agent.clone())
        .timeout(Duration::from_secs(endpoints.timeout_secs))
        .build()
        .map_err(|e| TrackerError::Http {
            message: format!("Failed to create HTTP client: {}", e),
            status_code: None,
        })
}

fn post(events: &EventSender, event: ClientEvent) {
    if events.send(event).is_err() {
        debug!("Client event dropped: session event channel closed");
    }
}

// ============================================================================
// Nominatim
// ============================================================================

/// Nominatim `jsonv2` search result.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    display_name: String,
}

fn parse_nominatim(places: Vec<NominatimPlace>) -> Vec<GeocodeMatch> {
    places
        .into_iter()
        .filter_map(|p| {
            let latitude = p.lat.parse::<f64>().ok()?;
            let longitude = p.lon.parse::<f64>().ok()?;
            let coordinate = Coordinate::new(latitude, longitude);
            coordinate.is_valid().then_some(GeocodeMatch {
                coordinate,
                display_name: p.display_name,
            })
        })
        .collect()
}

/// Geocoder backed by a Nominatim server.
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    runtime: Handle,
    events: EventSender,
}

impl NominatimGeocoder {
    pub fn new(endpoints: &ServiceEndpoints, runtime: Handle, events: EventSender) -> Result<Self> {
        Ok(Self {
            client: build_client(endpoints)?,
            base_url: endpoints.geocoder_url.trim_end_matches('/').to_string(),
            runtime,
            events,
        })
    }

    async fn search(
        client: &Client,
        base_url: &str,
        address: &str,
    ) -> std::result::Result<Vec<GeocodeMatch>, ClientError> {
        let response = client
            .get(format!("{}/search", base_url))
            .query(&[
                ("q", address),
                ("format", "jsonv2"),
                ("limit", MAX_GEOCODE_RESULTS),
            ])
            .send()
            .await
            .map_err(|e| ClientError::new(format!("Request error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::new(format!("HTTP {}", status)));
        }

        let places = response
            .json::<Vec<NominatimPlace>>()
            .await
            .map_err(|e| ClientError::new(format!("Parse error: {}", e)))?;
        Ok(parse_nominatim(places))
    }
}

impl GeocodingClient for NominatimGeocoder {
    fn geocode(&self, ticket: GeocodeTicket, address: String) {
        let client = self.client.clone();
        let base_url = self.base_url.clone();
        let events = self.events.clone();

        self.runtime.spawn(async move {
            let outcome = Self::search(&client, &base_url, &address).await;
            match &outcome {
                Ok(matches) => info!("[Nominatim] '{}': {} matches", address, matches.len()),
                Err(e) => warn!("[Nominatim] '{}' failed: {}", address, e),
            }
            post(&events, ClientEvent::GeocodeFinished { ticket, outcome });
        });
    }
}

// ============================================================================
// OSRM
// ============================================================================

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    code: String,
    message: Option<String>,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: OsrmGeometry,
    distance: f64,
    duration: f64,
}

/// GeoJSON line string, coordinates as [lon, lat].
#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    coordinates: Vec<[f64; 2]>,
}

/// OSRM codes that mean "no route" rather than a failure.
const OSRM_NO_ROUTE_CODES: [&str; 2] = ["NoRoute", "NoSegment"];

fn parse_osrm(response: OsrmResponse) -> std::result::Result<Vec<Route>, ClientError> {
    if OSRM_NO_ROUTE_CODES.contains(&response.code.as_str()) {
        return Ok(Vec::new());
    }
    if response.code != "Ok" {
        return Err(ClientError::new(format!(
            "OSRM {}: {}",
            response.code,
            response.message.unwrap_or_default()
        )));
    }
    Ok(response
        .routes
        .into_iter()
        .map(|r| Route {
            polyline: r
                .geometry
                .coordinates
                .into_iter()
                .map(|[lon, lat]| Coordinate::new(lat, lon))
                .collect(),
            distance_meters: r.distance,
            eta_seconds: r.duration,
        })
        .collect())
}

fn osrm_route_url(base_url: &str, request: &RouteRequest) -> String {
    format!(
        "{}/route/v1/driving/{:.6},{:.6};{:.6},{:.6}?alternatives={}&overview=full&geometries=geojson",
        base_url,
        request.origin.longitude,
        request.origin.latitude,
        request.destination.longitude,
        request.destination.latitude,
        request.allow_alternates
    )
}

/// Router backed by an OSRM server.
pub struct OsrmRouter {
    client: Client,
    base_url: String,
    runtime: Handle,
    events: EventSender,
    in_flight: Mutex<HashMap<RouteHandle, JoinHandle<()>>>,
}

impl OsrmRouter {
    pub fn new(endpoints: &ServiceEndpoints, runtime: Handle, events: EventSender) -> Result<Self> {
        Ok(Self {
            client: build_client(endpoints)?,
            base_url: endpoints.router_url.trim_end_matches('/').to_string(),
            runtime,
            events,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    async fn fetch_routes(
        client: &Client,
        url: &str,
    ) -> std::result::Result<Vec<Route>, ClientError> {
        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::new(format!("Request error: {}", e)))?;

        // OSRM answers NoRoute with a 400 and a JSON body
        let status = response.status();
        let body = response
            .json::<OsrmResponse>()
            .await
            .map_err(|e| ClientError::new(format!("HTTP {} ({})", status, e)))?;
        parse_osrm(body)
    }

    /// Number of requests that have not finished or been cancelled.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight
            .lock()
            .map(|tasks| tasks.values().filter(|t| !t.is_finished()).count())
            .unwrap_or(0)
    }
}

impl RoutingClient for OsrmRouter {
    fn route(&self, handle: RouteHandle, request: RouteRequest) {
        let client = self.client.clone();
        let url = osrm_route_url(&self.base_url, &request);
        let events = self.events.clone();

        let task = self.runtime.spawn(async move {
            let outcome = Self::fetch_routes(&client, &url).await;
            match &outcome {
                Ok(routes) => info!(
                    "[Osrm] Request {}: {} routes",
                    handle.generation,
                    routes.len()
                ),
                Err(e) => warn!("[Osrm] Request {} failed: {}", handle.generation, e),
            }
            post(&events, ClientEvent::RouteFinished { handle, outcome });
        });

        if let Ok(mut tasks) = self.in_flight.lock() {
            tasks.retain(|_, t| !t.is_finished());
            tasks.insert(handle, task);
        }
    }

    fn cancel(&self, handle: RouteHandle) {
        let task = self
            .in_flight
            .lock()
            .ok()
            .and_then(|mut tasks| tasks.remove(&handle));
        if let Some(task) = task {
            debug!("[Osrm] Aborting request {}", handle.generation);
            task.abort();
        }
    }
}

impl Drop for OsrmRouter {
    fn drop(&mut self) {
        if let Ok(tasks) = self.in_flight.get_mut() {
            for (_, task) in tasks.drain() {
                task.abort();
            }
        }
    }
}
