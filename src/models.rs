//! Data models for the earthquake API and the normalized event set.
//!
//! Wire structures mirror the JSON envelopes served by the upstream
//! `deprem` API. `SeismicEvent` is the normalized, immutable record the rest
//! of the crate works with.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Upstream seismic data sources selectable by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Kandilli Observatory (Boğaziçi University)
    #[default]
    Kandilli,
    /// Disaster and Emergency Management Authority
    Afad,
}

impl Provider {
    /// Get the URL path segment for this provider.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Kandilli => "kandilli",
            Self::Afad => "afad",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kandilli" => Ok(Self::Kandilli),
            "afad" => Ok(Self::Afad),
            _ => Err(format!("unknown provider: {s} (expected: kandilli, afad)")),
        }
    }
}

// ============================================================================
// Wire envelopes
// ============================================================================

/// Envelope shared by the live and search endpoints.
///
/// `result` is kept as raw JSON values so one malformed record cannot fail
/// the whole batch.
#[derive(Debug, Clone, Deserialize)]
pub struct EventEnvelope {
    pub status: bool,

    #[serde(rename = "httpStatus", default)]
    pub http_status: u16,

    #[serde(default)]
    pub desc: Option<String>,

    #[serde(default)]
    pub serverloadms: Option<f64>,

    #[serde(default)]
    pub metadata: Option<FeedMetadata>,

    #[serde(default)]
    pub result: Option<Vec<serde_json::Value>>,
}

/// Response metadata for a live or search request.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FeedMetadata {
    #[serde(default)]
    pub date_starts: Option<String>,
    #[serde(default)]
    pub date_ends: Option<String>,
    #[serde(default)]
    pub count: Option<usize>,
}

/// A single earthquake record as served by the API.
///
/// Every field is optional here; the normalizer decides what is mandatory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEvent {
    pub earthquake_id: Option<String>,
    pub provider: Option<String>,
    pub title: Option<String>,
    pub mag: Option<f64>,
    pub depth: Option<f64>,
    pub geojson: Option<RawGeometry>,
    pub location_properties: Option<LocationProperties>,
    pub date_time: Option<String>,
    /// Unix seconds; used when `date_time` is missing or unparseable
    pub created_at: Option<i64>,
}

/// GeoJSON point; coordinates are `[longitude, latitude]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGeometry {
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

/// Provider-supplied location metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationProperties {
    #[serde(rename = "closestCity")]
    pub closest_city: Option<NamedPlace>,
    #[serde(rename = "epiCenter")]
    pub epi_center: Option<NamedPlace>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedPlace {
    pub name: Option<String>,
}

/// Envelope for the city directory endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CitiesEnvelope {
    pub status: bool,
    #[serde(default)]
    pub result: Option<Vec<City>>,
}

// ============================================================================
// Domain types
// ============================================================================

/// A city from the reference directory.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct City {
    pub name: String,
    #[serde(default)]
    pub population: u64,
    /// Number of historical records for this city
    #[serde(default)]
    pub count: u64,
}

/// Upstream API health, refreshed on every poll tick.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ProviderHealth {
    #[serde(rename(deserialize = "status"))]
    pub is_up: bool,

    #[serde(rename(deserialize = "httpStatus"), default)]
    pub http_status: u16,

    #[serde(rename(deserialize = "serverloadms"), default)]
    pub server_load_ms: f64,
}

/// Event position, stored in GeoJSON order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub longitude: f64,
    pub latitude: f64,
}

/// Structured location hints, preferred over parsing the title.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocationHints {
    pub nearest_city: Option<String>,
    pub epicenter: Option<String>,
}

/// A normalized earthquake event. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeismicEvent {
    /// Stable across polls for the same physical event
    pub id: String,
    pub provider: Provider,
    pub title_raw: String,
    /// Title with the trailing parenthetical removed
    pub display_title: String,
    /// Resolved city (hint chain, then title, then "unknown")
    pub city: String,
    pub magnitude: f64,
    pub depth_km: f64,
    pub coordinates: Coordinates,
    pub hints: LocationHints,
    /// Provider-reported event time
    pub occurred_at: Option<DateTime<FixedOffset>>,
}

impl SeismicEvent {
    /// Severity tier for this event.
    #[must_use]
    pub fn tier(&self) -> MagnitudeTier {
        MagnitudeTier::from_magnitude(self.magnitude)
    }

    #[must_use]
    pub fn latitude(&self) -> f64 {
        self.coordinates.latitude
    }

    #[must_use]
    pub fn longitude(&self) -> f64 {
        self.coordinates.longitude
    }
}

/// Severity classification derived purely from magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MagnitudeTier {
    /// mag < 3.0
    Low,
    /// 3.0 <= mag < 4.0
    Medium,
    /// 4.0 <= mag < 5.0
    High,
    /// mag >= 5.0
    Extreme,
}

impl MagnitudeTier {
    #[must_use]
    pub fn from_magnitude(mag: f64) -> Self {
        match mag {
            m if m >= 5.0 => Self::Extreme,
            m if m >= 4.0 => Self::High,
            m if m >= 3.0 => Self::Medium,
            _ => Self::Low,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Extreme => "EXTREME",
        }
    }
}

/// Simplified event for output.
///
/// This is the structure we emit in JSON/NDJSON output.
#[derive(Debug, Clone, Serialize)]
pub struct OutputEvent {
    pub id: String,
    pub provider: Provider,
    pub title: String,
    pub city: String,
    pub magnitude: f64,
    pub tier: MagnitudeTier,
    pub depth_km: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

impl OutputEvent {
    /// Attach an observer distance, if one is known.
    #[must_use]
    pub fn with_distance(mut self, distance_km: Option<f64>) -> Self {
        self.distance_km = distance_km;
        self
    }
}

impl From<&SeismicEvent> for OutputEvent {
    fn from(e: &SeismicEvent) -> Self {
        Self {
            id: e.id.clone(),
            provider: e.provider,
            title: e.display_title.clone(),
            city: e.city.clone(),
            magnitude: e.magnitude,
            tier: e.tier(),
            depth_km: e.depth_km,
            latitude: e.latitude(),
            longitude: e.longitude(),
            time: e
                .occurred_at
                .map_or_else(|| "unknown".into(), |t| t.to_rfc3339()),
            distance_km: None,
        }
    }
}
