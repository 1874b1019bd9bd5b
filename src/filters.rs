//! City filtering and aggregation over the working event set.
//!
//! Everything here is pure: the input slice is never mutated, so clearing
//! the filter needs no re-fetch.

use crate::models::SeismicEvent;

/// Sentinel accepted on the command line for "no city filter".
pub const ALL_CITIES: &str = "all";

/// City selector applied to the working event set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CityFilter {
    #[default]
    All,
    City(String),
}

impl CityFilter {
    /// Check if an event matches this selector.
    ///
    /// A city matches on the nearest-city hint, the epicenter hint, or a
    /// case-sensitive substring of the raw title.
    #[must_use]
    pub fn matches(&self, event: &SeismicEvent) -> bool {
        match self {
            Self::All => true,
            Self::City(city) => {
                event.hints.nearest_city.as_deref() == Some(city.as_str())
                    || event.hints.epicenter.as_deref() == Some(city.as_str())
                    || event.title_raw.contains(city.as_str())
            }
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::All => ALL_CITIES,
            Self::City(city) => city,
        }
    }
}

impl std::str::FromStr for CityFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("city filter cannot be empty (use \"all\" to clear)".into());
        }
        if s == ALL_CITIES {
            Ok(Self::All)
        } else {
            Ok(Self::City(s.to_string()))
        }
    }
}

impl std::fmt::Display for CityFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events matching the selector, in input order.
#[must_use]
pub fn filtered_events<'a>(events: &'a [SeismicEvent], filter: &CityFilter) -> Vec<&'a SeismicEvent> {
    events.iter().filter(|e| filter.matches(e)).collect()
}

/// Event with the highest magnitude; the first one wins a tie.
#[must_use]
pub fn most_significant<'a, I>(events: I) -> Option<&'a SeismicEvent>
where
    I: IntoIterator<Item = &'a SeismicEvent>,
{
    events.into_iter().fold(None, |max, current| match max {
        Some(m) if current.magnitude <= m.magnitude => Some(m),
        _ => Some(current),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coordinates, LocationHints, Provider};

    fn event(id: &str, title: &str, mag: f64, nearest: Option<&str>, epi: Option<&str>) -> SeismicEvent {
        SeismicEvent {
            id: id.into(),
            provider: Provider::Kandilli,
            title_raw: title.into(),
            display_title: crate::normalize::display_title(title),
            city: String::new(),
            magnitude: mag,
            depth_km: 7.0,
            coordinates: Coordinates {
                longitude: 29.0,
                latitude: 41.0,
            },
            hints: LocationHints {
                nearest_city: nearest.map(Into::into),
                epicenter: epi.map(Into::into),
            },
            occurred_at: None,
        }
    }

    fn sample() -> Vec<SeismicEvent> {
        vec![
            event("1", "YESILYURT (MALATYA)", 3.2, Some("Malatya"), None),
            event("2", "SINDIRGI (BALIKESIR)", 4.6, None, Some("Balıkesir")),
            event("3", "AKDENIZ", 2.0, None, None),
            event("4", "KALE (Malatya)", 4.6, None, None),
            event("5", "MARMARA DENIZI", 1.9, Some("İstanbul"), Some("Silivri")),
        ]
    }

    #[test]
    fn test_all_is_identity() {
        let events = sample();
        let filtered = filtered_events(&events, &CityFilter::All);
        assert_eq!(filtered.len(), events.len());
        for (a, b) in filtered.iter().zip(&events) {
            assert!(std::ptr::eq(*a, b));
        }
    }

    #[test]
    fn test_city_match_conditions() {
        let events = sample();
        let filter = CityFilter::City("Malatya".into());
        let ids: Vec<&str> = filtered_events(&events, &filter)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        // "1" by nearest city, "4" by title substring
        assert_eq!(ids, ["1", "4"]);

        let filter = CityFilter::City("Silivri".into());
        let ids: Vec<&str> = filtered_events(&events, &filter)
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, ["5"]);

        for city in ["Malatya", "Balıkesir", "DENIZ", "Nowhere"] {
            let filter = CityFilter::City(city.into());
            for e in filtered_events(&events, &filter) {
                assert!(
                    e.hints.nearest_city.as_deref() == Some(city)
                        || e.hints.epicenter.as_deref() == Some(city)
                        || e.title_raw.contains(city)
                );
            }
        }
    }

    #[test]
    fn test_title_match_is_case_sensitive() {
        let events = sample();
        let filter = CityFilter::City("malatya".into());
        assert!(filtered_events(&events, &filter).is_empty());
    }

    #[test]
    fn test_filter_does_not_touch_input() {
        let events = sample();
        let before = events.clone();
        let _ = filtered_events(&events, &CityFilter::City("Malatya".into()));
        assert_eq!(events, before);
    }

    #[test]
    fn test_most_significant() {
        let empty: Vec<SeismicEvent> = Vec::new();
        assert!(most_significant(&empty).is_none());

        let events = sample();
        let top = most_significant(&events).expect("non-empty input");
        // "2" and "4" tie at 4.6; first occurrence wins
        assert_eq!(top.id, "2");
        assert!(events.iter().all(|e| top.magnitude >= e.magnitude));
    }

    #[test]
    fn test_most_significant_of_filtered_set() {
        let events = sample();
        let filtered = filtered_events(&events, &CityFilter::City("Malatya".into()));
        let top = most_significant(filtered.iter().copied()).expect("non-empty input");
        assert_eq!(top.id, "4");

        let none = filtered_events(&events, &CityFilter::City("Nowhere".into()));
        assert!(most_significant(none.iter().copied()).is_none());
    }

    #[test]
    fn test_parse_city_filter() {
        assert_eq!("all".parse::<CityFilter>(), Ok(CityFilter::All));
        assert_eq!(
            " İzmir ".parse::<CityFilter>(),
            Ok(CityFilter::City("İzmir".into()))
        );
        assert!("  ".parse::<CityFilter>().is_err());
    }
}
