//! quakeboard - Turkish earthquake dashboard for your terminal.
//!
//! Polls the Kandilli and AFAD live feeds, filters by city, ranks events by
//! magnitude, measures distance from you, and searches past earthquakes.

use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::runtime::Runtime;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};

mod cli;
mod client;
mod errors;
mod filters;
mod geo;
mod models;
mod normalize;
mod output;
mod poller;
mod search;

use cli::{Cli, Command, MIN_POLL_INTERVAL_SECS, ViewCommand};
use client::{ClientConfig, QuakeClient};
use geo::{FixedLocation, GeoPoint, resolve_observer};
use models::SeismicEvent;
use output::Format;
use poller::{AllowOverlap, PollerConfig, PollerHandle, SingleFlight, Snapshot};
use search::{SearchExecutor, SearchResults, SearchView};

/// How long to wait for the observer position before rendering without it.
const LOCATION_TIMEOUT: Duration = Duration::from_secs(5);

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    init_tracing(cli.verbose, cli.quiet);

    let config = ClientConfig {
        base_url: cli.api_url,
        ..ClientConfig::default()
    };

    match cli.command {
        Command::Live(args) => runtime()?.block_on(cmd_live(args, config)),
        Command::Tail(args) => runtime()?.block_on(cmd_tail(args, config)),
        Command::Search(args) => runtime()?.block_on(cmd_search(args, config)),
        Command::Cities(args) => runtime()?.block_on(cmd_cities(args.format, config)),
        Command::Status(args) => runtime()?.block_on(cmd_status(args.format, config)),
    }
}

/// Initialize tracing subscriber.
fn init_tracing(verbose: bool, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn runtime() -> Result<Runtime> {
    Runtime::new().context("failed to create tokio runtime")
}

fn client(config: &ClientConfig) -> Result<QuakeClient> {
    QuakeClient::with_config(config).context("failed to create API client")
}

/// Execute the `tail` command - one-shot fetch of the live feed.
async fn cmd_tail(args: cli::TailArgs, config: ClientConfig) -> Result<()> {
    let client = client(&config)?;
    let observer = resolve_observer(&FixedLocation(args.near), LOCATION_TIMEOUT).await;

    let feed = client
        .fetch_live(args.provider, args.limit)
        .await
        .with_context(|| format!("failed to fetch {} live feed", args.provider))?;

    debug!(
        count = feed.events.len(),
        dropped = feed.dropped,
        starts = feed.metadata.date_starts.as_deref().unwrap_or("?"),
        ends = feed.metadata.date_ends.as_deref().unwrap_or("?"),
        "live feed received"
    );

    let events = filters::filtered_events(&feed.events, &args.city);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if args.format == Format::Human {
        output::write_summary(&mut handle, filters::most_significant(events.iter().copied()))?;
    }
    output::write_events(&mut handle, &events, args.format, observer)?;

    Ok(())
}

/// Execute the `search` command - historical events for one city.
async fn cmd_search(args: cli::SearchArgs, config: ClientConfig) -> Result<()> {
    // validate before touching the network
    let query = search::SearchQuery::new(&args.city, args.limit)?;

    let client = client(&config)?;
    let observer = resolve_observer(&FixedLocation(args.near), LOCATION_TIMEOUT).await;

    let feed = client
        .search_city(&query.city, query.limit)
        .await
        .with_context(|| format!("search for {} failed", query.city))?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_search_results(&mut handle, &query.city, &feed.events, args.format, observer)?;

    Ok(())
}

/// Execute the `cities` command.
async fn cmd_cities(format: Format, config: ClientConfig) -> Result<()> {
    let cities = client(&config)?
        .fetch_cities()
        .await
        .context("failed to fetch city directory")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_cities(&mut handle, &cities, format)?;

    Ok(())
}

/// Execute the `status` command.
async fn cmd_status(format: Format, config: ClientConfig) -> Result<()> {
    let health = client(&config)?
        .fetch_status()
        .await
        .context("failed to fetch API status")?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    output::write_health(&mut handle, &health, format)?;

    Ok(())
}

/// Execute the `live` command - the polling dashboard.
async fn cmd_live(args: cli::LiveArgs, config: ClientConfig) -> Result<()> {
    // Validate poll interval
    let poll_interval = args.poll_interval.max(MIN_POLL_INTERVAL_SECS);
    if poll_interval != args.poll_interval {
        warn!("poll interval clamped to minimum of {MIN_POLL_INTERVAL_SECS} seconds");
    }

    let source = Arc::new(client(&config)?);
    let observer = resolve_observer(&FixedLocation(args.near), LOCATION_TIMEOUT).await;

    let poller_config = PollerConfig {
        provider: args.provider,
        limit: args.limit,
        interval: Duration::from_secs(poll_interval),
        city_filter: args.city,
    };

    let (handle, task) = if args.single_flight {
        poller::spawn(Arc::clone(&source), poller_config, SingleFlight)
    } else {
        poller::spawn(Arc::clone(&source), poller_config, AllowOverlap)
    };

    let mut view = LiveView {
        format: args.format,
        observer,
        rows: args.rows,
        selected: None,
        search: SearchView::new(SearchExecutor::new(source).with_limit(args.search_limit)),
        last_drawn: None,
    };

    info!("dashboard started (type q to quit)");

    let result = view.run(&handle).await;

    // the coordinator may already be gone; either way wait for it
    if handle.shutdown().await.is_err() {
        warn!("polling coordinator exited early");
    }
    task.await.context("polling coordinator panicked")?;

    result
}

/// Renders coordinator snapshots and routes typed commands back to it.
struct LiveView {
    format: Format,
    observer: Option<GeoPoint>,
    rows: usize,
    selected: Option<SeismicEvent>,
    search: SearchView<QuakeClient>,
    last_drawn: Option<(u64, bool)>,
}

impl LiveView {
    async fn run(&mut self, handle: &PollerHandle) -> Result<()> {
        let mut snapshots = WatchStream::new(handle.subscribe());
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;

        loop {
            tokio::select! {
                snapshot = snapshots.next() => {
                    let Some(snapshot) = snapshot else {
                        warn!("polling coordinator stopped");
                        return Ok(());
                    };
                    self.draw(&snapshot, false)?;
                }
                line = lines.next_line(), if stdin_open => {
                    let Some(line) = line.context("failed to read command")? else {
                        // no more input; keep rendering until interrupted
                        stdin_open = false;
                        continue;
                    };
                    if !self.handle_line(&line, handle).await? {
                        return Ok(());
                    }
                }
                _ = tokio::signal::ctrl_c() => return Ok(()),
            }
        }
    }

    /// Apply one typed command. Returns `false` on quit.
    async fn handle_line(&mut self, line: &str, handle: &PollerHandle) -> Result<bool> {
        let command = match line.parse::<ViewCommand>() {
            Ok(command) => command,
            Err(e) => {
                warn!("{e}");
                return Ok(true);
            }
        };

        match command {
            ViewCommand::Provider(provider) => handle.switch_provider(provider).await?,
            ViewCommand::Filter(filter) => handle.set_city_filter(filter).await?,
            ViewCommand::Refresh => handle.refresh().await?,
            ViewCommand::Search(city) if city.is_empty() => {
                // bare `s` lists the searchable cities
                let snapshot = handle.snapshot();
                let stdout = io::stdout();
                output::write_cities(&mut stdout.lock(), &snapshot.cities, self.format)?;
            }
            ViewCommand::Search(city) => {
                self.search.run(&city).await;
                self.draw(&handle.snapshot(), true)?;
            }
            ViewCommand::CloseSearch => {
                self.search.close();
                self.draw(&handle.snapshot(), true)?;
            }
            ViewCommand::Open(id) => {
                let snapshot = handle.snapshot();
                // search results take precedence while they are shown
                let found = self.search.select(&id).or_else(|| {
                    snapshot.filtered().into_iter().find(|e| e.id == id).cloned()
                });
                match found {
                    Some(event) => {
                        self.selected = Some(event);
                        self.draw(&snapshot, true)?;
                    }
                    None => warn!("event {id} is not in the current view"),
                }
            }
            ViewCommand::Quit => return Ok(false),
        }

        Ok(true)
    }

    /// Redraw when the snapshot changed, or unconditionally when `force`.
    fn draw(&mut self, snapshot: &Snapshot, force: bool) -> io::Result<()> {
        // the fetching indicator only matters to the terminal view
        let key = (
            snapshot.revision,
            self.format == Format::Human && snapshot.is_fetching,
        );
        if !force && self.last_drawn == Some(key) {
            return Ok(());
        }
        self.last_drawn = Some(key);

        let stdout = io::stdout();
        let mut out = stdout.lock();
        output::write_dashboard(&mut out, snapshot, self.format, self.observer, self.rows)?;

        if let Some(event) = &self.selected {
            output::write_selected(&mut out, event, self.format, self.observer, Utc::now())?;
        }

        if let Some(SearchResults { city, events }) = self.search.current() {
            output::write_search_panel(&mut out, city, events, self.format, self.observer)?;
        }

        out.flush()
    }
}
