//! Historical search.
//!
//! One request per user action, scoped to a city. Failures collapse to an
//! empty result; the live poll cycle is never involved.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::{DEFAULT_SEARCH_LIMIT, QuakeSource};
use crate::errors::QuakeboardError;
use crate::models::SeismicEvent;

/// A validated search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub city: String,
    pub limit: usize,
}

impl SearchQuery {
    /// Build a query, rejecting a blank city or a zero limit.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the city is empty or the limit is zero.
    pub fn new(city: &str, limit: usize) -> Result<Self, QuakeboardError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(QuakeboardError::Validation("no city selected".into()));
        }
        if limit == 0 {
            return Err(QuakeboardError::Validation("limit must be positive".into()));
        }

        Ok(Self {
            city: city.to_string(),
            limit,
        })
    }
}

/// Runs city-scoped historical searches.
pub struct SearchExecutor<S> {
    source: Arc<S>,
    limit: usize,
}

impl<S: QuakeSource> SearchExecutor<S> {
    #[must_use]
    pub fn new(source: Arc<S>) -> Self {
        Self {
            source,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Search one city. Returns an empty set on any failure.
    ///
    /// A blank city is rejected before a request is issued.
    pub async fn search(&self, city: &str) -> Vec<SeismicEvent> {
        let query = match SearchQuery::new(city, self.limit) {
            Ok(q) => q,
            Err(e) => {
                debug!("search rejected: {e}");
                return Vec::new();
            }
        };

        match self.source.search(&query.city, query.limit).await {
            Ok(feed) => {
                debug!(city = %query.city, count = feed.events.len(), "search complete");
                feed.events
            }
            Err(e) => {
                warn!(city = %query.city, "search failed: {e}");
                Vec::new()
            }
        }
    }
}

/// Results of the most recent search, shown until the next search or until
/// the view is closed.
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub city: String,
    pub events: Vec<SeismicEvent>,
}

/// The search view: an executor plus whatever it last returned.
pub struct SearchView<S> {
    executor: SearchExecutor<S>,
    current: Option<SearchResults>,
}

impl<S: QuakeSource> SearchView<S> {
    #[must_use]
    pub fn new(executor: SearchExecutor<S>) -> Self {
        Self {
            executor,
            current: None,
        }
    }

    /// Run a search, replacing any previous results.
    pub async fn run(&mut self, city: &str) -> &SearchResults {
        let events = self.executor.search(city).await;
        self.current.insert(SearchResults {
            city: city.trim().to_string(),
            events,
        })
    }

    /// Pick an event from the current results by id.
    ///
    /// A hit closes the view, like choosing a row in a picker does.
    pub fn select(&mut self, id: &str) -> Option<SeismicEvent> {
        let event = self
            .current
            .as_ref()?
            .events
            .iter()
            .find(|e| e.id == id)
            .cloned()?;
        self.close();
        Some(event)
    }

    /// Dismiss the view and drop its results.
    pub fn close(&mut self) {
        self.current = None;
    }

    #[must_use]
    pub fn current(&self) -> Option<&SearchResults> {
        self.current.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::client::LiveFeed;
    use crate::models::{City, Coordinates, LocationHints, Provider, ProviderHealth};

    /// Records search calls; fails when `fail` is set.
    #[derive(Default)]
    struct RecordingSource {
        calls: AtomicUsize,
        last: Mutex<Option<(String, usize)>>,
        fail: bool,
    }

    fn event(id: &str) -> SeismicEvent {
        SeismicEvent {
            id: id.into(),
            provider: Provider::Kandilli,
            title_raw: "MERKEZ (ELAZIG)".into(),
            display_title: "MERKEZ".into(),
            city: "ELAZIG".into(),
            magnitude: 3.4,
            depth_km: 8.0,
            coordinates: Coordinates {
                longitude: 39.2,
                latitude: 38.6,
            },
            hints: LocationHints::default(),
            occurred_at: None,
        }
    }

    impl QuakeSource for RecordingSource {
        async fn live_events(&self, _: Provider, _: usize) -> Result<LiveFeed, QuakeboardError> {
            Ok(LiveFeed::default())
        }

        async fn cities(&self) -> Result<Vec<City>, QuakeboardError> {
            Ok(Vec::new())
        }

        async fn status(&self) -> Result<ProviderHealth, QuakeboardError> {
            Err(QuakeboardError::InvalidResponse("unused".into()))
        }

        async fn search(&self, city: &str, limit: usize) -> Result<LiveFeed, QuakeboardError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut last) = self.last.lock() {
                *last = Some((city.to_string(), limit));
            }
            if self.fail {
                return Err(QuakeboardError::Api {
                    status: 500,
                    message: "boom".into(),
                });
            }
            Ok(LiveFeed {
                events: vec![event("s1"), event("s2")],
                ..LiveFeed::default()
            })
        }
    }

    #[tokio::test]
    async fn test_empty_city_issues_no_request() {
        let source = Arc::new(RecordingSource::default());
        let executor = SearchExecutor::new(Arc::clone(&source));

        assert!(executor.search("").await.is_empty());
        assert!(executor.search("   ").await.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_search_passes_city_and_default_limit() {
        let source = Arc::new(RecordingSource::default());
        let executor = SearchExecutor::new(Arc::clone(&source));

        let results = executor.search("Elazığ").await;
        assert_eq!(results.len(), 2);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        let last = source.last.lock().expect("lock").clone();
        assert_eq!(last, Some(("Elazığ".to_string(), DEFAULT_SEARCH_LIMIT)));
    }

    #[tokio::test]
    async fn test_failure_yields_empty() {
        let source = Arc::new(RecordingSource {
            fail: true,
            ..RecordingSource::default()
        });
        let executor = SearchExecutor::new(Arc::clone(&source)).with_limit(10);

        assert!(executor.search("Van").await.is_empty());
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_view_replaces_and_closes() {
        let source = Arc::new(RecordingSource::default());
        let mut view = SearchView::new(SearchExecutor::new(source));
        assert!(view.current().is_none());

        let results = view.run("Van").await;
        assert_eq!(results.city, "Van");
        assert_eq!(results.events.len(), 2);

        view.run("Bitlis").await;
        assert_eq!(view.current().map(|r| r.city.as_str()), Some("Bitlis"));

        view.close();
        assert!(view.current().is_none());
    }

    #[test]
    fn test_query_validation() {
        assert!(SearchQuery::new("", 50).is_err());
        assert!(SearchQuery::new("Van", 0).is_err());
        let query = SearchQuery::new(" Van ", 50).expect("valid query");
        assert_eq!(query.city, "Van");
    }

    #[tokio::test]
    async fn test_select_from_results_closes_view() {
        let source = Arc::new(RecordingSource::default());
        let mut view = SearchView::new(SearchExecutor::new(source));
        assert!(view.select("s1").is_none());

        view.run("Van").await;
        assert!(view.select("missing").is_none());
        assert!(view.current().is_some());

        let picked = view.select("s2").expect("s2 is in the results");
        assert_eq!(picked.id, "s2");
        assert!(view.current().is_none());
    }
}
