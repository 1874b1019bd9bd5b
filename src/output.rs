//! Output formatters for earthquake events and the live dashboard.
//!
//! Supports human-readable (with colors), JSON, and NDJSON formats.

use std::io::{self, Write};

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::Serialize;

use crate::geo::{GeoPoint, event_distance};
use crate::models::{City, MagnitudeTier, OutputEvent, Provider, ProviderHealth, SeismicEvent};
use crate::poller::Snapshot;

// ANSI color codes
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

// Tier colors
const GREEN: &str = "\x1b[92m"; // Low: mag < 3.0
const YELLOW: &str = "\x1b[93m"; // Medium: mag >= 3.0
const RED: &str = "\x1b[91m"; // High: mag >= 4.0
const RED_BG: &str = "\x1b[41;97m"; // Extreme: mag >= 5.0

const ICON_QUAKE: &str = "🌍";
const ICON_TOP: &str = "▲";
const RULE: &str = "─────────────────────────────────────────────────────────────────────";

/// Output format selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human-readable terminal output (default)
    #[default]
    Human,
    /// JSON array
    Json,
    /// Newline-delimited JSON (one object per line)
    Ndjson,
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "ndjson" => Ok(Self::Ndjson),
            _ => Err(format!("unknown format: {s} (expected: human, json, ndjson)")),
        }
    }
}

/// Get the color code for a tier.
fn tier_color(tier: MagnitudeTier) -> &'static str {
    match tier {
        MagnitudeTier::Extreme => RED_BG,
        MagnitudeTier::High => RED,
        MagnitudeTier::Medium => YELLOW,
        MagnitudeTier::Low => GREEN,
    }
}

/// "N min ago" style age of an event.
#[must_use]
pub fn relative_time(t: Option<DateTime<FixedOffset>>, now: DateTime<Utc>) -> String {
    let Some(t) = t else {
        return "unknown".to_string();
    };

    let diff = now.signed_duration_since(t);
    if diff.num_hours() < 1 {
        format!("{} min ago", diff.num_minutes().max(1))
    } else if diff.num_hours() < 24 {
        format!("{} hr ago", diff.num_hours())
    } else {
        format!("{} days ago", diff.num_days())
    }
}

fn to_json_io<T: Serialize>(value: &T, pretty: bool) -> io::Result<String> {
    let result = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    result.map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn output_events(events: &[&SeismicEvent], observer: Option<GeoPoint>) -> Vec<OutputEvent> {
    events
        .iter()
        .map(|e| OutputEvent::from(*e).with_distance(event_distance(observer, e)))
        .collect()
}

/// Write events as one colored card per line.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_human<W: Write>(
    writer: &mut W,
    events: &[&SeismicEvent],
    observer: Option<GeoPoint>,
    now: DateTime<Utc>,
) -> io::Result<()> {
    for event in events {
        let tier = event.tier();
        let color = tier_color(tier);
        let label = tier.as_str();
        let mag = event.magnitude;
        let depth = event.depth_km;
        let age = relative_time(event.occurred_at, now);
        let title = &event.display_title;
        let city = &event.city;

        let distance = event_distance(observer, event)
            .map(|km| format!(" │ {DIM}{km:.0} km away{RESET}"))
            .unwrap_or_default();

        writeln!(
            writer,
            "{color}{BOLD}M{mag:.1}{RESET} │ \
             {color}{label:7}{RESET} │ \
             {DIM}{depth:>5.1}km{RESET} │ \
             {age:>11} │ \
             {title} {DIM}[{city}]{RESET}{distance}"
        )?;
    }
    Ok(())
}

/// Write events as a JSON array.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_json<W: Write>(
    writer: &mut W,
    events: &[&SeismicEvent],
    observer: Option<GeoPoint>,
) -> io::Result<()> {
    let json = to_json_io(&output_events(events, observer), true)?;
    writeln!(writer, "{json}")
}

/// Write events as newline-delimited JSON.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_ndjson<W: Write>(
    writer: &mut W,
    events: &[&SeismicEvent],
    observer: Option<GeoPoint>,
) -> io::Result<()> {
    for event in output_events(events, observer) {
        writeln!(writer, "{}", to_json_io(&event, false)?)?;
    }
    Ok(())
}

/// Write events in the specified format.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_events<W: Write>(
    writer: &mut W,
    events: &[&SeismicEvent],
    format: Format,
    observer: Option<GeoPoint>,
) -> io::Result<()> {
    match format {
        Format::Human => write_human(writer, events, observer, Utc::now()),
        Format::Json => write_json(writer, events, observer),
        Format::Ndjson => write_ndjson(writer, events, observer),
    }
}

/// Write the "strongest event" panel.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_summary<W: Write>(writer: &mut W, top: Option<&SeismicEvent>) -> io::Result<()> {
    match top {
        Some(event) => {
            let color = tier_color(event.tier());
            writeln!(
                writer,
                "{ICON_TOP} Strongest: {BOLD}{}{RESET}  {color}{BOLD}M{:.1}{RESET}",
                event.display_title, event.magnitude
            )
        }
        None => writeln!(writer, "{DIM}No events match the current filter{RESET}"),
    }
}

/// Format API health as a short pill.
#[must_use]
pub fn health_pill(health: Option<&ProviderHealth>) -> String {
    match health {
        Some(h) if h.is_up => format!("{GREEN}● up{RESET} {:.0}ms", h.server_load_ms),
        Some(h) => format!("{RED}● down{RESET} (HTTP {})", h.http_status),
        None => format!("{DIM}● unknown{RESET}"),
    }
}

/// Write the full dashboard for one snapshot.
///
/// Human output redraws the screen; JSON emits one document per snapshot;
/// NDJSON emits the filtered events.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_dashboard<W: Write>(
    writer: &mut W,
    snapshot: &Snapshot,
    format: Format,
    observer: Option<GeoPoint>,
    rows: usize,
) -> io::Result<()> {
    let filtered = snapshot.filtered();
    let top = snapshot.most_significant();

    match format {
        Format::Human => {
            write!(writer, "{CLEAR_SCREEN}")?;
            write_status_line(writer, snapshot)?;
            writeln!(
                writer,
                "{DIM}Filter: {} │ {} of {} events{RESET}",
                snapshot.city_filter,
                filtered.len(),
                snapshot.events.len()
            )?;
            writeln!(writer, "{DIM}{RULE}{RESET}")?;
            write_summary(writer, top)?;
            writeln!(writer, "{DIM}{RULE}{RESET}")?;

            let shown = &filtered[..filtered.len().min(rows)];
            write_human(writer, shown, observer, Utc::now())?;
            if filtered.len() > shown.len() {
                writeln!(writer, "{DIM}… {} more{RESET}", filtered.len() - shown.len())?;
            }
            writeln!(
                writer,
                "{DIM}p <provider> · c <city|all> · r refresh · s <city> search · x close · o <id> open · q quit{RESET}"
            )
        }
        Format::Json => {
            let view = DashboardView {
                provider: snapshot.provider,
                city_filter: snapshot.city_filter.as_str(),
                health: snapshot.health,
                last_success: snapshot.last_success,
                ticks_completed: snapshot.ticks_completed,
                total: snapshot.events.len(),
                most_significant: top.map(|e| OutputEvent::from(e).with_distance(event_distance(observer, e))),
                events: output_events(&filtered, observer),
            };
            writeln!(writer, "{}", to_json_io(&view, false)?)
        }
        Format::Ndjson => write_ndjson(writer, &filtered, observer),
    }
}

fn write_status_line<W: Write>(writer: &mut W, snapshot: &Snapshot) -> io::Result<()> {
    let updated = snapshot.last_success.map_or_else(
        || "never".to_string(),
        |t| t.with_timezone(&Local).format("%H:%M:%S").to_string(),
    );
    let fetching = if snapshot.is_fetching {
        format!(" │ {DIM}refreshing…{RESET}")
    } else {
        String::new()
    };

    writeln!(
        writer,
        "{ICON_QUAKE} {BOLD}quakeboard{RESET} │ {} │ API {} │ Last update {updated}{fetching}",
        snapshot.provider,
        health_pill(snapshot.health.as_ref())
    )
}

#[derive(Serialize)]
struct DashboardView<'a> {
    provider: Provider,
    city_filter: &'a str,
    health: Option<ProviderHealth>,
    last_success: Option<DateTime<Utc>>,
    ticks_completed: u64,
    total: usize,
    most_significant: Option<OutputEvent>,
    events: Vec<OutputEvent>,
}

/// Write the results of a historical search.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_search_results<W: Write>(
    writer: &mut W,
    city: &str,
    events: &[SeismicEvent],
    format: Format,
    observer: Option<GeoPoint>,
) -> io::Result<()> {
    let refs: Vec<&SeismicEvent> = events.iter().collect();

    if format == Format::Human {
        writeln!(writer, "{DIM}{RULE}{RESET}")?;
        if refs.is_empty() {
            writeln!(writer, "No past earthquakes found for {BOLD}{city}{RESET}")?;
            return Ok(());
        }
        writeln!(writer, "{} results for {BOLD}{city}{RESET}", refs.len())?;
    }

    write_events(writer, &refs, format, observer)
}

/// Write the search results shown under the live dashboard.
///
/// Machine formats get a single tagged line so the results cannot be
/// mistaken for live events.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_search_panel<W: Write>(
    writer: &mut W,
    city: &str,
    events: &[SeismicEvent],
    format: Format,
    observer: Option<GeoPoint>,
) -> io::Result<()> {
    if format == Format::Human {
        return write_search_results(writer, city, events, format, observer);
    }

    let refs: Vec<&SeismicEvent> = events.iter().collect();
    let panel = serde_json::json!({
        "search": { "city": city, "events": output_events(&refs, observer) }
    });
    writeln!(writer, "{}", to_json_io(&panel, false)?)
}

/// Write the selected event: a detail card for humans, a tagged JSON line
/// otherwise.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_selected<W: Write>(
    writer: &mut W,
    event: &SeismicEvent,
    format: Format,
    observer: Option<GeoPoint>,
    now: DateTime<Utc>,
) -> io::Result<()> {
    if format == Format::Human {
        return write_detail(writer, event, observer, now);
    }

    let selected = OutputEvent::from(event).with_distance(event_distance(observer, event));
    let line = serde_json::json!({ "selected": selected });
    writeln!(writer, "{}", to_json_io(&line, false)?)
}

/// Write the detail card for one selected event.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn write_detail<W: Write>(
    writer: &mut W,
    event: &SeismicEvent,
    observer: Option<GeoPoint>,
    now: DateTime<Utc>,
) -> io::Result<()> {
    let color = tier_color(event.tier());
    writeln!(writer, "{DIM}{RULE}{RESET}")?;
    writeln!(writer, "{BOLD}{}{RESET} {DIM}({}){RESET}", event.title_raw, event.id)?;
    writeln!(
        writer,
        "  Magnitude  {color}{BOLD}{:.1}{RESET} {}",
        event.magnitude,
        event.tier().as_str()
    )?;
    writeln!(writer, "  City       {}", event.city)?;
    writeln!(writer, "  Depth      {:.1} km", event.depth_km)?;
    writeln!(
        writer,
        "  Location   {:.4}°, {:.4}°",
        event.latitude(),
        event.longitude()
    )?;
    writeln!(
        writer,
        "  Time       {} ({})",
        event
            .occurred_at
            .map_or_else(|| "unknown".to_string(), |t| t.to_rfc3339()),
        relative_time(event.occurred_at, now)
    )?;
    writeln!(writer, "  Provider   {}", event.provider)?;
    if let Some(km) = event_distance(observer, event) {
        writeln!(writer, "  Distance   {km:.0} km")?;
    }
    Ok(())
}

/// Write the city directory sorted by name.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_cities<W: Write>(writer: &mut W, cities: &[City], format: Format) -> io::Result<()> {
    let mut sorted: Vec<&City> = cities.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    match format {
        Format::Human => {
            for city in sorted {
                writeln!(
                    writer,
                    "{:<16} {:>6} records  {DIM}pop {}{RESET}",
                    city.name, city.count, city.population
                )?;
            }
            Ok(())
        }
        Format::Json => writeln!(writer, "{}", to_json_io(&sorted, true)?),
        Format::Ndjson => {
            for city in sorted {
                writeln!(writer, "{}", to_json_io(city, false)?)?;
            }
            Ok(())
        }
    }
}

/// Write API health.
///
/// # Errors
///
/// Returns an error if serialization or writing fails.
pub fn write_health<W: Write>(writer: &mut W, health: &ProviderHealth, format: Format) -> io::Result<()> {
    match format {
        Format::Human => writeln!(
            writer,
            "API {} (HTTP {})",
            health_pill(Some(health)),
            health.http_status
        ),
        Format::Json | Format::Ndjson => writeln!(writer, "{}", to_json_io(health, false)?),
    }
}
