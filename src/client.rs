//! Earthquake API client.
//!
//! Provides async HTTP access to the `deprem` API (Kandilli and AFAD live
//! feeds, the city directory, API status, and historical search).
//! Uses reqwest with rustls for TLS.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response};
use tracing::{debug, instrument};

use crate::errors::QuakeboardError;
use crate::models::{
    CitiesEnvelope, City, EventEnvelope, FeedMetadata, Provider, ProviderHealth, SeismicEvent,
};
use crate::normalize::normalize_batch;

/// Default request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// User agent string for API requests.
const USER_AGENT: &str = concat!("quakeboard/", env!("CARGO_PKG_VERSION"));

/// Default base URL of the earthquake API.
pub const DEFAULT_BASE_URL: &str = "https://api.orhanaydogdu.com.tr/deprem";

/// Default number of live events requested per poll.
pub const DEFAULT_LIVE_LIMIT: usize = 100;

/// Default result cap for historical search.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

/// A normalized live or search response.
#[derive(Debug, Clone, Default)]
pub struct LiveFeed {
    pub events: Vec<SeismicEvent>,
    pub metadata: FeedMetadata,
    /// Records dropped during normalization
    pub dropped: usize,
}

/// The upstream operations the rest of the crate depends on.
///
/// `QuakeClient` is the real implementation; tests substitute in-process
/// fakes.
pub trait QuakeSource: Send + Sync + 'static {
    /// Live events for a provider, newest first.
    fn live_events(
        &self,
        provider: Provider,
        limit: usize,
    ) -> impl Future<Output = Result<LiveFeed, QuakeboardError>> + Send;

    /// The city directory.
    fn cities(&self) -> impl Future<Output = Result<Vec<City>, QuakeboardError>> + Send;

    /// Current API health. Never cached.
    fn status(&self) -> impl Future<Output = Result<ProviderHealth, QuakeboardError>> + Send;

    /// Historical events for one city.
    fn search(
        &self,
        city: &str,
        limit: usize,
    ) -> impl Future<Output = Result<LiveFeed, QuakeboardError>> + Send;
}

/// Client for the earthquake API.
#[derive(Debug, Clone)]
pub struct QuakeClient {
    client: Client,
    base_url: String,
}

impl QuakeClient {
    /// Create a client from explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn with_config(config: &ClientConfig) -> Result<Self, QuakeboardError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch live events for a provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API reports failure, or
    /// the envelope cannot be parsed.
    #[instrument(skip(self), fields(provider = provider.as_str()))]
    pub async fn fetch_live(&self, provider: Provider, limit: usize) -> Result<LiveFeed, QuakeboardError> {
        let url = format!("{}/{}/live", self.base_url, provider.as_str());
        debug!("fetching live events from {}", url);

        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit)])
            .send()
            .await?;

        let body = read_body(response).await?;
        let envelope: EventEnvelope = serde_json::from_str(&body)?;
        let server_load_ms = envelope.serverloadms;
        let feed = feed_from_envelope(envelope, provider)?;

        debug!(
            server_load_ms = ?server_load_ms,
            "fetched {} events ({} dropped)",
            feed.events.len(),
            feed.dropped
        );
        Ok(feed)
    }

    /// Fetch the city directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the API reports failure.
    #[instrument(skip(self))]
    pub async fn fetch_cities(&self) -> Result<Vec<City>, QuakeboardError> {
        let url = format!("{}/statics/cities", self.base_url);
        debug!("fetching cities from {}", url);

        let response = self.client.get(&url).send().await?;
        let body = read_body(response).await?;
        let envelope: CitiesEnvelope = serde_json::from_str(&body)?;

        if !envelope.status {
            return Err(QuakeboardError::Upstream {
                status: 200,
                desc: "city directory unavailable".into(),
            });
        }

        let cities = envelope.result.unwrap_or_default();
        debug!("fetched {} cities", cities.len());
        Ok(cities)
    }

    /// Fetch API health.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body cannot be parsed.
    #[instrument(skip(self))]
    pub async fn fetch_status(&self) -> Result<ProviderHealth, QuakeboardError> {
        let url = format!("{}/status", self.base_url);

        let response = self
            .client
            .get(&url)
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await?;

        let body = read_body(response).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Search historical events for a city.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API reports failure, or
    /// the envelope cannot be parsed.
    #[instrument(skip(self))]
    pub async fn search_city(&self, city: &str, limit: usize) -> Result<LiveFeed, QuakeboardError> {
        let url = format!("{}/data/search", self.base_url);
        let limit = limit.to_string();

        let response = self
            .client
            .post(&url)
            .form(&[("city", city), ("limit", limit.as_str())])
            .send()
            .await?;

        let body = read_body(response).await?;
        let envelope: EventEnvelope = serde_json::from_str(&body)?;
        let feed = feed_from_envelope(envelope, Provider::Kandilli)?;

        debug!("search matched {} events", feed.events.len());
        Ok(feed)
    }
}

impl QuakeSource for QuakeClient {
    fn live_events(
        &self,
        provider: Provider,
        limit: usize,
    ) -> impl Future<Output = Result<LiveFeed, QuakeboardError>> + Send {
        self.fetch_live(provider, limit)
    }

    fn cities(&self) -> impl Future<Output = Result<Vec<City>, QuakeboardError>> + Send {
        self.fetch_cities()
    }

    fn status(&self) -> impl Future<Output = Result<ProviderHealth, QuakeboardError>> + Send {
        self.fetch_status()
    }

    fn search(
        &self,
        city: &str,
        limit: usize,
    ) -> impl Future<Output = Result<LiveFeed, QuakeboardError>> + Send {
        self.search_city(city, limit)
    }
}

/// Check status before parsing.
async fn read_body(response: Response) -> Result<String, QuakeboardError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(QuakeboardError::Api {
            status: status.as_u16(),
            message: body,
        });
    }

    Ok(response.text().await?)
}

/// Validate an event envelope and normalize its records.
pub(crate) fn feed_from_envelope(
    envelope: EventEnvelope,
    fallback: Provider,
) -> Result<LiveFeed, QuakeboardError> {
    if !envelope.status {
        return Err(QuakeboardError::Upstream {
            status: envelope.http_status,
            desc: envelope.desc.unwrap_or_default(),
        });
    }

    let records = envelope
        .result
        .ok_or_else(|| QuakeboardError::InvalidResponse("missing result array".into()))?;

    let batch = normalize_batch(&records, fallback);

    Ok(LiveFeed {
        events: batch.events,
        metadata: envelope.metadata.unwrap_or_default(),
        dropped: batch.dropped,
    })
}
