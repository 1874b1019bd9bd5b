//! Record normalizer.
//!
//! Turns raw API records into [`SeismicEvent`]s. A record that is missing a
//! mandatory field (id, magnitude, coordinates) or fails to deserialize is
//! dropped on its own; it never fails the batch.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use regex::Regex;
use tracing::debug;

use crate::errors::QuakeboardError;
use crate::models::{Coordinates, LocationHints, NamedPlace, Provider, RawEvent, SeismicEvent};

/// City sentinel when neither hints nor the title name one.
pub const UNKNOWN_CITY: &str = "unknown";

/// Both providers report local Turkish time (UTC+3, no DST).
const TURKEY_UTC_OFFSET_SECS: i32 = 3 * 3600;

/// Naive timestamp layouts seen from the providers.
const NAIVE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y.%m.%d %H:%M:%S"];

#[allow(clippy::expect_used)]
static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]+)\)").expect("static pattern is valid"));

/// Result of normalizing one response payload.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub events: Vec<SeismicEvent>,
    /// Records rejected (malformed, incomplete, or duplicate id)
    pub dropped: usize,
}

/// Normalize every record in a payload, preserving provider order.
///
/// Only the first record for a given id is kept.
#[must_use]
pub fn normalize_batch(records: &[serde_json::Value], fallback: Provider) -> NormalizedBatch {
    let mut seen = HashSet::with_capacity(records.len());
    let mut batch = NormalizedBatch {
        events: Vec::with_capacity(records.len()),
        dropped: 0,
    };

    for (index, record) in records.iter().enumerate() {
        match normalize_record(record, fallback) {
            Ok(event) => {
                if seen.insert(event.id.clone()) {
                    batch.events.push(event);
                } else {
                    debug!(index, id = %event.id, "dropping duplicate record");
                    batch.dropped += 1;
                }
            }
            Err(e) => {
                debug!(index, "dropping record: {e}");
                batch.dropped += 1;
            }
        }
    }

    batch
}

/// Normalize a single raw record.
///
/// # Errors
///
/// Returns an error if the record cannot be deserialized or lacks an id,
/// magnitude, or a usable coordinate pair.
pub fn normalize_record(
    value: &serde_json::Value,
    fallback: Provider,
) -> Result<SeismicEvent, QuakeboardError> {
    let raw: RawEvent = serde_json::from_value(value.clone())?;

    let id = raw
        .earthquake_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| QuakeboardError::Validation("missing earthquake_id".into()))?
        .to_string();

    let magnitude = raw
        .mag
        .filter(|m| m.is_finite())
        .ok_or_else(|| QuakeboardError::Validation(format!("{id}: missing magnitude")))?;

    let coordinates = raw
        .geojson
        .as_ref()
        .and_then(|g| coordinates_from(&g.coordinates))
        .ok_or_else(|| QuakeboardError::Validation(format!("{id}: missing coordinates")))?;

    let hints = LocationHints {
        nearest_city: raw
            .location_properties
            .as_ref()
            .and_then(|p| place_name(p.closest_city.as_ref())),
        epicenter: raw
            .location_properties
            .as_ref()
            .and_then(|p| place_name(p.epi_center.as_ref())),
    };

    let title_raw = raw.title.unwrap_or_default();
    let city = resolve_city(&hints, &title_raw);

    Ok(SeismicEvent {
        provider: raw
            .provider
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or(fallback),
        display_title: display_title(&title_raw),
        city,
        magnitude,
        depth_km: raw.depth.filter(|d| d.is_finite()).unwrap_or(0.0).max(0.0),
        coordinates,
        hints,
        occurred_at: raw
            .date_time
            .as_deref()
            .and_then(parse_occurred_at)
            .or_else(|| raw.created_at.and_then(from_unix_seconds)),
        title_raw,
        id,
    })
}

/// Resolve the city for an event.
///
/// Order: nearest-city hint, epicenter hint, first parenthetical in the
/// title, then [`UNKNOWN_CITY`]. Blank values are skipped.
#[must_use]
pub fn resolve_city(hints: &LocationHints, title_raw: &str) -> String {
    non_empty(hints.nearest_city.as_deref())
        .or_else(|| non_empty(hints.epicenter.as_deref()))
        .or_else(|| title_city(title_raw))
        .unwrap_or(UNKNOWN_CITY)
        .to_string()
}

/// Extract the first parenthetical segment from a title.
#[must_use]
pub fn title_city(title_raw: &str) -> Option<&str> {
    PARENTHETICAL
        .captures(title_raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
}

/// Title with the parenthetical tail removed, or the raw title if that
/// leaves nothing.
#[must_use]
pub fn display_title(title_raw: &str) -> String {
    let head = title_raw
        .split_once(" (")
        .map_or(title_raw, |(head, _)| head)
        .trim_end();

    if head.is_empty() {
        title_raw.to_string()
    } else {
        head.to_string()
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn place_name(place: Option<&NamedPlace>) -> Option<String> {
    non_empty(place.and_then(|p| p.name.as_deref())).map(str::to_string)
}

fn coordinates_from(values: &[f64]) -> Option<Coordinates> {
    let (&longitude, &latitude) = (values.first()?, values.get(1)?);
    let valid = longitude.is_finite()
        && latitude.is_finite()
        && (-180.0..=180.0).contains(&longitude)
        && (-90.0..=90.0).contains(&latitude);

    valid.then_some(Coordinates {
        longitude,
        latitude,
    })
}

fn parse_occurred_at(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t);
    }

    let offset = FixedOffset::east_opt(TURKEY_UTC_OFFSET_SECS)?;
    NAIVE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| naive.and_local_timezone(offset).single())
}

fn from_unix_seconds(secs: i64) -> Option<DateTime<FixedOffset>> {
    let offset = FixedOffset::east_opt(TURKEY_UTC_OFFSET_SECS)?;
    DateTime::from_timestamp(secs, 0).map(|t| t.with_timezone(&offset))
}
