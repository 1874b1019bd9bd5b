//! Geo-distance calculations.
//!
//! Great-circle distance between an observer and an event, plus best-effort
//! resolution of the observer position. A missing observer is never an
//! error; the distance is simply absent.

use std::f64::consts::PI;
use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::models::{Coordinates, SeismicEvent};

/// Earth radius in kilometers for haversine calculations.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the globe, latitude first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<Coordinates> for GeoPoint {
    fn from(c: Coordinates) -> Self {
        Self::new(c.latitude, c.longitude)
    }
}

impl std::str::FromStr for GeoPoint {
    type Err = String;

    /// Parse `lat,lon`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').collect();
        if parts.len() != 2 {
            return Err(format!(
                "location requires 2 values (lat,lon), got {}",
                parts.len()
            ));
        }

        let vals: Result<Vec<f64>, _> = parts.iter().map(|p| p.trim().parse::<f64>()).collect();
        let vals = vals.map_err(|e| format!("invalid number in location: {e}"))?;

        let point = Self::new(vals[0], vals[1]);

        if !(-90.0..=90.0).contains(&point.latitude) {
            return Err(format!(
                "latitude {} out of range [-90, 90]",
                point.latitude
            ));
        }
        if !(-180.0..=180.0).contains(&point.longitude) {
            return Err(format!(
                "longitude {} out of range [-180, 180]",
                point.longitude
            ));
        }

        Ok(point)
    }
}

/// Calculate the great-circle distance between two points using the haversine formula.
///
/// Returns distance in kilometers.
#[must_use]
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1_rad = a.latitude * PI / 180.0;
    let lat2_rad = b.latitude * PI / 180.0;
    let delta_lat = (b.latitude - a.latitude) * PI / 180.0;
    let delta_lon = (b.longitude - a.longitude) * PI / 180.0;

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Distance from the observer to an event, if the observer is known.
#[must_use]
pub fn event_distance(observer: Option<GeoPoint>, event: &SeismicEvent) -> Option<f64> {
    observer.map(|o| haversine_distance(o, GeoPoint::from(event.coordinates)))
}

/// A source of the observer's position.
///
/// The lookup may fail or never complete; callers bound it with
/// [`resolve_observer`].
pub trait LocationSource: Send + Sync {
    fn locate(&self) -> impl Future<Output = Option<GeoPoint>> + Send;
}

/// Position supplied up front (for example from `--near`).
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedLocation(pub Option<GeoPoint>);

impl LocationSource for FixedLocation {
    async fn locate(&self) -> Option<GeoPoint> {
        self.0
    }
}

/// Resolve the observer position, giving up after `timeout`.
pub async fn resolve_observer<L: LocationSource>(source: &L, timeout: Duration) -> Option<GeoPoint> {
    match tokio::time::timeout(timeout, source.locate()).await {
        Ok(position) => position,
        Err(_) => {
            debug!("observer location did not resolve within {timeout:?}");
            None
        }
    }
}
