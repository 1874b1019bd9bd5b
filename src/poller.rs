//! Polling coordinator.
//!
//! Owns the refresh cadence, the selected provider, and the working event
//! set. Each tick fetches live events and then API health, in that order,
//! on a spawned task; results come back over a channel and are applied on
//! the coordinator's single timeline.
//!
//! Ticks are not serialized: a slow fetch can still be in flight when the
//! next tick fires, and last write wins. Substitute [`SingleFlight`] for
//! [`AllowOverlap`] to drop overlapping ticks instead.
//!
//! Switching provider bumps an epoch. Live responses tagged with an older
//! epoch are discarded when they arrive, so a slow response for the old
//! provider can never overwrite the new provider's data.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::client::{DEFAULT_LIVE_LIMIT, LiveFeed, QuakeSource};
use crate::errors::QuakeboardError;
use crate::filters::{CityFilter, filtered_events, most_significant};
use crate::models::{City, Provider, ProviderHealth, SeismicEvent};

/// Fixed refresh cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Capacity of the command channel from views to the coordinator.
const COMMAND_BUFFER: usize = 32;

// ============================================================================
// Tick admission
// ============================================================================

/// Decides whether a tick may start while others are still in flight.
pub trait TickPolicy: Send + 'static {
    fn admit(&mut self, in_flight: usize) -> bool;

    fn name(&self) -> &'static str;
}

/// Every tick fetches, overlapping or not.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowOverlap;

impl TickPolicy for AllowOverlap {
    fn admit(&mut self, _in_flight: usize) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "allow-overlap"
    }
}

/// A tick is dropped while a previous one is still in flight.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleFlight;

impl TickPolicy for SingleFlight {
    fn admit(&mut self, in_flight: usize) -> bool {
        in_flight == 0
    }

    fn name(&self) -> &'static str {
        "single-flight"
    }
}

// ============================================================================
// Configuration and state
// ============================================================================

/// Poller configuration.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub provider: Provider,
    pub limit: usize,
    pub interval: Duration,
    pub city_filter: CityFilter,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            limit: DEFAULT_LIVE_LIMIT,
            interval: DEFAULT_POLL_INTERVAL,
            city_filter: CityFilter::All,
        }
    }
}

/// Read-only view of the coordinator state handed to presentation code.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub provider: Provider,
    pub city_filter: CityFilter,
    /// Working event set from the last accepted poll, unfiltered
    pub events: Arc<Vec<SeismicEvent>>,
    pub cities: Arc<Vec<City>>,
    pub health: Option<ProviderHealth>,
    pub last_success: Option<DateTime<Utc>>,
    pub is_fetching: bool,
    pub ticks_completed: u64,
    /// Bumped whenever rendered content changes
    pub revision: u64,
}

impl Snapshot {
    /// Working set narrowed by the current city filter.
    #[must_use]
    pub fn filtered(&self) -> Vec<&SeismicEvent> {
        filtered_events(&self.events, &self.city_filter)
    }

    /// Strongest event in the filtered set.
    #[must_use]
    pub fn most_significant(&self) -> Option<&SeismicEvent> {
        most_significant(self.filtered())
    }
}

#[derive(Debug)]
struct AppState {
    provider: Provider,
    city_filter: CityFilter,
    epoch: u64,
    events: Arc<Vec<SeismicEvent>>,
    cities: Arc<Vec<City>>,
    health: Option<ProviderHealth>,
    last_success: Option<DateTime<Utc>>,
    /// Ticks in flight across all epochs
    in_flight: usize,
    /// Ticks in flight for the current epoch; the only ones a policy sees
    in_flight_current: usize,
    ticks_completed: u64,
    revision: u64,
}

impl AppState {
    fn new(config: &PollerConfig) -> Self {
        Self {
            provider: config.provider,
            city_filter: config.city_filter.clone(),
            epoch: 0,
            events: Arc::new(Vec::new()),
            cities: Arc::new(Vec::new()),
            health: None,
            last_success: None,
            in_flight: 0,
            in_flight_current: 0,
            ticks_completed: 0,
            revision: 0,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            provider: self.provider,
            city_filter: self.city_filter.clone(),
            events: Arc::clone(&self.events),
            cities: Arc::clone(&self.cities),
            health: self.health,
            last_success: self.last_success,
            is_fetching: self.in_flight > 0,
            ticks_completed: self.ticks_completed,
            revision: self.revision,
        }
    }
}

#[derive(Debug)]
enum Command {
    SwitchProvider(Provider),
    SetCityFilter(CityFilter),
    Refresh,
    Shutdown,
}

#[derive(Debug)]
enum Outcome {
    Events {
        epoch: u64,
        provider: Provider,
        result: Result<LiveFeed, QuakeboardError>,
    },
    /// Always the last message of a tick
    Health {
        epoch: u64,
        result: Result<ProviderHealth, QuakeboardError>,
    },
    Cities(Result<Vec<City>, QuakeboardError>),
}

// ============================================================================
// Handle
// ============================================================================

/// Cloneable handle used by views to steer the coordinator and observe it.
#[derive(Debug, Clone)]
pub struct PollerHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Arc<Snapshot>>,
}

impl PollerHandle {
    /// Select a provider; restarts the cycle if it changed.
    ///
    /// # Errors
    ///
    /// Returns `Stopped` if the coordinator has exited.
    pub async fn switch_provider(&self, provider: Provider) -> Result<(), QuakeboardError> {
        self.send(Command::SwitchProvider(provider)).await
    }

    /// Replace the city filter. The working set is left untouched.
    ///
    /// # Errors
    ///
    /// Returns `Stopped` if the coordinator has exited.
    pub async fn set_city_filter(&self, filter: CityFilter) -> Result<(), QuakeboardError> {
        self.send(Command::SetCityFilter(filter)).await
    }

    /// Fetch now without moving the schedule.
    ///
    /// # Errors
    ///
    /// Returns `Stopped` if the coordinator has exited.
    pub async fn refresh(&self) -> Result<(), QuakeboardError> {
        self.send(Command::Refresh).await
    }

    /// Stop the coordinator. In-flight fetches finish but are not applied.
    ///
    /// # Errors
    ///
    /// Returns `Stopped` if the coordinator has already exited.
    pub async fn shutdown(&self) -> Result<(), QuakeboardError> {
        self.send(Command::Shutdown).await
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshots.borrow())
    }

    /// Receiver notified on every published snapshot.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.snapshots.clone()
    }

    async fn send(&self, command: Command) -> Result<(), QuakeboardError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| QuakeboardError::Stopped)
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Start the polling coordinator on the current tokio runtime.
///
/// The first tick fires immediately; the city directory is fetched once.
pub fn spawn<S, P>(source: Arc<S>, config: PollerConfig, policy: P) -> (PollerHandle, JoinHandle<()>)
where
    S: QuakeSource,
    P: TickPolicy,
{
    let state = AppState::new(&config);
    let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(state.snapshot()));
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

    let poller = Poller {
        source,
        policy,
        state,
        limit: config.limit,
        interval: config.interval,
        commands: command_rx,
        outcome_tx,
        outcomes: outcome_rx,
        snapshots: snapshot_tx,
    };

    let task = tokio::spawn(poller.run());
    let handle = PollerHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
    };

    (handle, task)
}

struct Poller<S, P> {
    source: Arc<S>,
    policy: P,
    state: AppState,
    limit: usize,
    interval: Duration,
    commands: mpsc::Receiver<Command>,
    outcome_tx: mpsc::UnboundedSender<Outcome>,
    outcomes: mpsc::UnboundedReceiver<Outcome>,
    snapshots: watch::Sender<Arc<Snapshot>>,
}

impl<S: QuakeSource, P: TickPolicy> Poller<S, P> {
    async fn run(mut self) {
        info!(
            provider = %self.state.provider,
            interval_secs = self.interval.as_secs(),
            policy = self.policy.name(),
            "polling coordinator started"
        );

        self.fetch_cities();

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.start_tick(),
                command = self.commands.recv() => match command {
                    Some(Command::SwitchProvider(provider)) => {
                        if self.switch_provider(provider) {
                            ticker.reset_immediately();
                        }
                    }
                    Some(Command::SetCityFilter(filter)) => self.set_city_filter(filter),
                    Some(Command::Refresh) => self.start_tick(),
                    Some(Command::Shutdown) | None => break,
                },
                Some(outcome) = self.outcomes.recv() => self.apply(outcome),
            }
        }

        info!("polling coordinator stopped");
    }

    fn fetch_cities(&self) {
        let source = Arc::clone(&self.source);
        let tx = self.outcome_tx.clone();

        tokio::spawn(async move {
            let result = source.cities().await;
            let _ = tx.send(Outcome::Cities(result));
        });
    }

    fn start_tick(&mut self) {
        if !self.policy.admit(self.state.in_flight_current) {
            debug!(
                in_flight = self.state.in_flight_current,
                "tick skipped, fetch still in flight"
            );
            return;
        }

        let source = Arc::clone(&self.source);
        let tx = self.outcome_tx.clone();
        let provider = self.state.provider;
        let epoch = self.state.epoch;
        let limit = self.limit;

        debug!(%provider, epoch, "poll tick");
        self.state.in_flight += 1;
        self.state.in_flight_current += 1;

        tokio::spawn(async move {
            let result = source.live_events(provider, limit).await;
            if tx.send(Outcome::Events { epoch, provider, result }).is_err() {
                return;
            }

            let result = source.status().await;
            let _ = tx.send(Outcome::Health { epoch, result });
        });

        self.publish();
    }

    /// Returns `true` if the provider actually changed.
    fn switch_provider(&mut self, provider: Provider) -> bool {
        if provider == self.state.provider {
            return false;
        }

        info!(from = %self.state.provider, to = %provider, "switching provider");
        self.state.provider = provider;
        self.state.epoch += 1;
        // fetches for the old provider no longer hold back new ticks
        self.state.in_flight_current = 0;
        self.state.revision += 1;
        self.publish();
        true
    }

    fn set_city_filter(&mut self, filter: CityFilter) {
        if filter == self.state.city_filter {
            return;
        }

        debug!(filter = %filter, "city filter changed");
        self.state.city_filter = filter;
        self.state.revision += 1;
        self.publish();
    }

    fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Events {
                epoch,
                provider,
                result,
            } => {
                if epoch != self.state.epoch {
                    debug!(%provider, epoch, current = self.state.epoch, "discarding stale response");
                    return;
                }

                match result {
                    Ok(feed) => {
                        info!(
                            %provider,
                            count = feed.events.len(),
                            dropped = feed.dropped,
                            "working set replaced"
                        );
                        self.state.events = Arc::new(feed.events);
                        self.state.last_success = Some(Utc::now());
                        self.state.revision += 1;
                    }
                    Err(e) => warn!(%provider, "live fetch failed, keeping previous data: {e}"),
                }
            }
            Outcome::Health { epoch, result } => {
                self.state.in_flight = self.state.in_flight.saturating_sub(1);
                if epoch == self.state.epoch {
                    self.state.in_flight_current = self.state.in_flight_current.saturating_sub(1);
                }
                self.state.ticks_completed += 1;

                match result {
                    Ok(health) => {
                        self.state.health = Some(health);
                        self.state.revision += 1;
                    }
                    Err(e) => warn!("status fetch failed: {e}"),
                }
            }
            Outcome::Cities(result) => match result {
                Ok(cities) => {
                    debug!(count = cities.len(), "city directory loaded");
                    self.state.cities = Arc::new(cities);
                    self.state.revision += 1;
                }
                Err(e) => warn!("city directory fetch failed: {e}"),
            },
        }

        self.publish();
    }

    fn publish(&self) {
        self.snapshots.send_replace(Arc::new(self.state.snapshot()));
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use tokio::sync::Notify;
    use tokio::time::timeout;

    use super::*;
    use crate::models::{Coordinates, LocationHints};

    const WAIT: Duration = Duration::from_secs(5);

    /// In-process source. When `gate_kandilli` is set, Kandilli fetches
    /// block until `kandilli_gate` is notified.
    #[derive(Default)]
    struct FakeSource {
        gate_kandilli: bool,
        kandilli_started: Notify,
        kandilli_gate: Notify,
        fail_live: AtomicBool,
        fail_status: AtomicBool,
        /// "live" / "status" in the order the calls started
        calls: Mutex<Vec<&'static str>>,
        live_calls: AtomicUsize,
        cities_calls: AtomicUsize,
    }

    impl FakeSource {
        fn gated() -> Self {
            Self {
                gate_kandilli: true,
                ..Self::default()
            }
        }

        fn record(&self, call: &'static str) {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call);
            }
        }
    }

    fn event(id: &str, provider: Provider, mag: f64, title: &str) -> SeismicEvent {
        SeismicEvent {
            id: id.into(),
            provider,
            title_raw: title.into(),
            display_title: crate::normalize::display_title(title),
            city: crate::normalize::title_city(title).unwrap_or("unknown").into(),
            magnitude: mag,
            depth_km: 7.0,
            coordinates: Coordinates {
                longitude: 29.0,
                latitude: 41.0,
            },
            hints: LocationHints::default(),
            occurred_at: None,
        }
    }

    impl QuakeSource for FakeSource {
        async fn live_events(&self, provider: Provider, _limit: usize) -> Result<LiveFeed, QuakeboardError> {
            self.live_calls.fetch_add(1, Ordering::SeqCst);
            self.record("live");

            if provider == Provider::Kandilli && self.gate_kandilli {
                self.kandilli_started.notify_one();
                self.kandilli_gate.notified().await;
            }

            if self.fail_live.load(Ordering::SeqCst) {
                return Err(QuakeboardError::Api {
                    status: 502,
                    message: "bad gateway".into(),
                });
            }

            let events = match provider {
                Provider::Kandilli => vec![
                    event("k1", provider, 2.4, "SILIVRI (ISTANBUL)"),
                    event("k2", provider, 4.1, "KALE (MALATYA)"),
                ],
                Provider::Afad => vec![event("a1", provider, 3.3, "SINDIRGI (BALIKESIR)")],
            };

            Ok(LiveFeed {
                events,
                ..LiveFeed::default()
            })
        }

        async fn cities(&self) -> Result<Vec<City>, QuakeboardError> {
            self.cities_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![City {
                name: "Malatya".into(),
                population: 812_580,
                count: 1204,
            }])
        }

        async fn status(&self) -> Result<ProviderHealth, QuakeboardError> {
            self.record("status");
            if self.fail_status.load(Ordering::SeqCst) {
                return Err(QuakeboardError::Api {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            Ok(ProviderHealth {
                is_up: true,
                http_status: 200,
                server_load_ms: 4.0,
            })
        }

        async fn search(&self, _city: &str, _limit: usize) -> Result<LiveFeed, QuakeboardError> {
            Ok(LiveFeed::default())
        }
    }

    fn config() -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(3600),
            ..PollerConfig::default()
        }
    }

    async fn wait_until<F>(handle: &PollerHandle, predicate: F)
    where
        F: FnMut(&Arc<Snapshot>) -> bool,
    {
        let mut rx = handle.subscribe();
        timeout(WAIT, rx.wait_for(predicate))
            .await
            .expect("timed out waiting for snapshot")
            .expect("poller stopped");
    }

    fn ids(snapshot: &Snapshot) -> Vec<String> {
        snapshot.events.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn test_tick_policies() {
        let mut overlap = AllowOverlap;
        assert!(overlap.admit(0));
        assert!(overlap.admit(3));

        let mut single = SingleFlight;
        assert!(single.admit(0));
        assert!(!single.admit(1));
    }

    #[tokio::test]
    async fn test_first_tick_populates_state() {
        let source = Arc::new(FakeSource::default());
        let (handle, task) = spawn(Arc::clone(&source), config(), AllowOverlap);

        wait_until(&handle, |s| s.ticks_completed >= 1 && !s.cities.is_empty()).await;

        let snapshot = handle.snapshot();
        assert_eq!(ids(&snapshot), ["k1", "k2"]);
        assert!(snapshot.last_success.is_some());
        assert!(snapshot.health.is_some_and(|h| h.is_up));
        assert!(!snapshot.is_fetching);
        assert_eq!(snapshot.most_significant().map(|e| e.id.as_str()), Some("k2"));
        assert_eq!(source.cities_calls.load(Ordering::SeqCst), 1);

        handle.shutdown().await.expect("poller running");
        task.await.expect("poller task");
    }

    #[tokio::test]
    async fn test_switch_provider_discards_stale_response() {
        let source = Arc::new(FakeSource::gated());
        let (handle, task) = spawn(Arc::clone(&source), config(), AllowOverlap);

        // Kandilli fetch is now parked on the gate.
        timeout(WAIT, source.kandilli_started.notified())
            .await
            .expect("kandilli fetch never started");

        handle.switch_provider(Provider::Afad).await.expect("poller running");
        wait_until(&handle, |s| s.events.first().is_some_and(|e| e.id == "a1")).await;

        // Let the old Kandilli response arrive late.
        source.kandilli_gate.notify_one();
        wait_until(&handle, |s| s.ticks_completed >= 2).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.provider, Provider::Afad);
        assert_eq!(ids(&snapshot), ["a1"]);
        assert!(!snapshot.is_fetching);

        handle.shutdown().await.expect("poller running");
        task.await.expect("poller task");
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_data() {
        let source = Arc::new(FakeSource::default());
        let (handle, task) = spawn(Arc::clone(&source), config(), AllowOverlap);

        wait_until(&handle, |s| s.ticks_completed >= 1).await;
        let before = handle.snapshot();

        source.fail_live.store(true, Ordering::SeqCst);
        handle.refresh().await.expect("poller running");
        wait_until(&handle, |s| s.ticks_completed >= 2).await;

        let after = handle.snapshot();
        assert_eq!(ids(&after), ["k1", "k2"]);
        assert_eq!(after.last_success, before.last_success);
        assert!(after.health.is_some());

        // The cycle is still alive after a failure.
        source.fail_live.store(false, Ordering::SeqCst);
        handle.refresh().await.expect("poller running");
        wait_until(&handle, |s| s.ticks_completed >= 3).await;
        let recovered = handle.snapshot();
        assert!(recovered.revision > after.revision);
        assert!(recovered.last_success >= before.last_success);

        handle.shutdown().await.expect("poller running");
        task.await.expect("poller task");
    }

    #[tokio::test]
    async fn test_city_filter_is_non_destructive() {
        let source = Arc::new(FakeSource::default());
        let (handle, task) = spawn(Arc::clone(&source), config(), AllowOverlap);
        wait_until(&handle, |s| s.ticks_completed >= 1).await;
        let calls = source.live_calls.load(Ordering::SeqCst);

        handle
            .set_city_filter(CityFilter::City("MALATYA".into()))
            .await
            .expect("poller running");
        wait_until(&handle, |s| s.city_filter != CityFilter::All).await;

        let snapshot = handle.snapshot();
        let filtered: Vec<&str> = snapshot.filtered().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(filtered, ["k2"]);
        assert_eq!(snapshot.events.len(), 2);

        handle
            .set_city_filter(CityFilter::City("Nowhere".into()))
            .await
            .expect("poller running");
        wait_until(&handle, |s| s.city_filter.as_str() == "Nowhere").await;
        assert!(handle.snapshot().most_significant().is_none());

        handle.set_city_filter(CityFilter::All).await.expect("poller running");
        wait_until(&handle, |s| s.city_filter == CityFilter::All).await;
        assert_eq!(handle.snapshot().filtered().len(), 2);

        // No re-fetch was needed for any of this.
        assert_eq!(source.live_calls.load(Ordering::SeqCst), calls);

        handle.shutdown().await.expect("poller running");
        task.await.expect("poller task");
    }

    #[tokio::test]
    async fn test_single_flight_drops_overlapping_tick() {
        let source = Arc::new(FakeSource::gated());
        let (handle, task) = spawn(Arc::clone(&source), config(), SingleFlight);

        timeout(WAIT, source.kandilli_started.notified())
            .await
            .expect("kandilli fetch never started");
        wait_until(&handle, |s| s.is_fetching).await;

        handle.refresh().await.expect("poller running");
        // Commands are handled in order; once the filter shows up the
        // refresh has been processed.
        handle
            .set_city_filter(CityFilter::City("X".into()))
            .await
            .expect("poller running");
        wait_until(&handle, |s| s.city_filter != CityFilter::All).await;
        assert_eq!(source.live_calls.load(Ordering::SeqCst), 1);

        source.kandilli_gate.notify_one();
        wait_until(&handle, |s| s.ticks_completed >= 1).await;
        assert_eq!(ids(&handle.snapshot()), ["k1", "k2"]);

        handle.shutdown().await.expect("poller running");
        task.await.expect("poller task");
    }

    #[tokio::test]
    async fn test_same_provider_is_noop() {
        let source = Arc::new(FakeSource::default());
        let (handle, task) = spawn(Arc::clone(&source), config(), AllowOverlap);
        wait_until(&handle, |s| s.ticks_completed >= 1).await;

        handle.switch_provider(Provider::Kandilli).await.expect("poller running");
        handle
            .set_city_filter(CityFilter::City("X".into()))
            .await
            .expect("poller running");
        wait_until(&handle, |s| s.city_filter != CityFilter::All).await;
        assert_eq!(source.live_calls.load(Ordering::SeqCst), 1);

        handle.shutdown().await.expect("poller running");
        task.await.expect("poller task");
    }

    #[tokio::test]
    async fn test_single_flight_switch_fetches_new_provider_immediately() {
        let source = Arc::new(FakeSource::gated());
        let (handle, task) = spawn(Arc::clone(&source), config(), SingleFlight);

        // Kandilli fetch is parked; the switch must not wait for it.
        timeout(WAIT, source.kandilli_started.notified())
            .await
            .expect("kandilli fetch never started");

        handle.switch_provider(Provider::Afad).await.expect("poller running");
        wait_until(&handle, |s| s.events.first().is_some_and(|e| e.id == "a1")).await;
        assert_eq!(source.live_calls.load(Ordering::SeqCst), 2);

        source.kandilli_gate.notify_one();
        wait_until(&handle, |s| s.ticks_completed >= 2).await;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.provider, Provider::Afad);
        assert_eq!(ids(&snapshot), ["a1"]);
        assert!(!snapshot.is_fetching);

        // Single-flight still applies within the new provider.
        handle.refresh().await.expect("poller running");
        wait_until(&handle, |s| s.ticks_completed >= 3).await;
        assert_eq!(ids(&handle.snapshot()), ["a1"]);

        handle.shutdown().await.expect("poller running");
        task.await.expect("poller task");
    }

    #[tokio::test]
    async fn test_interval_keeps_ticking_through_failures() {
        let source = Arc::new(FakeSource::default());
        source.fail_live.store(true, Ordering::SeqCst);
        source.fail_status.store(true, Ordering::SeqCst);

        let config = PollerConfig {
            interval: Duration::from_millis(30),
            ..PollerConfig::default()
        };
        let (handle, task) = spawn(Arc::clone(&source), config, SingleFlight);

        // No refresh commands: only the timer drives these ticks.
        wait_until(&handle, |s| s.ticks_completed >= 3).await;

        let snapshot = handle.snapshot();
        assert!(snapshot.events.is_empty());
        assert!(snapshot.last_success.is_none());
        assert!(snapshot.health.is_none());
        assert!(source.live_calls.load(Ordering::SeqCst) >= 3);

        handle.shutdown().await.expect("poller running");
        task.await.expect("poller task");

        // Ticks never overlap here, so each live call is followed by its status call.
        let calls = source.calls.lock().expect("lock").clone();
        assert!(calls.len() >= 6, "calls: {calls:?}");
        for (i, call) in calls.iter().enumerate() {
            let expected = if i % 2 == 0 { "live" } else { "status" };
            assert_eq!(*call, expected, "calls: {calls:?}");
        }
    }
}
