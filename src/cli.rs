//! Command-line interface definitions.
//!
//! Uses clap derive API for argument parsing. Also parses the line commands
//! typed into the `live` dashboard.

use clap::{Parser, Subcommand};

use crate::client::{DEFAULT_BASE_URL, DEFAULT_LIVE_LIMIT, DEFAULT_SEARCH_LIMIT};
use crate::filters::CityFilter;
use crate::geo::GeoPoint;
use crate::models::Provider;
use crate::output::Format;

/// Minimum poll interval accepted by `live`.
pub const MIN_POLL_INTERVAL_SECS: u64 = 30;

/// Turkish earthquake dashboard for your terminal.
#[derive(Parser, Debug)]
#[command(name = "quakeboard")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to run
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose debug logging
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Base URL of the earthquake API
    #[arg(long, global = true, env = "QUAKEBOARD_API_URL", default_value = DEFAULT_BASE_URL)]
    pub api_url: String,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the live dashboard (polls until `q`)
    Live(LiveArgs),

    /// Show the latest events once and exit
    Tail(TailArgs),

    /// Search past earthquakes for a city
    Search(SearchArgs),

    /// List the city directory
    Cities(FormatArgs),

    /// Show API health
    Status(FormatArgs),
}

/// Arguments for the `live` command.
#[derive(Parser, Debug)]
pub struct LiveArgs {
    /// Data provider
    #[arg(long, short = 'p', default_value = "kandilli", value_parser = parse_provider)]
    pub provider: Provider,

    /// City filter ("all" shows every event)
    #[arg(long, short = 'c', default_value = "all", value_parser = parse_city_filter)]
    pub city: CityFilter,

    /// Events requested per poll
    #[arg(long, short = 'n', default_value_t = DEFAULT_LIVE_LIMIT)]
    pub limit: usize,

    /// Poll interval in seconds (minimum 30)
    #[arg(long, default_value = "60")]
    pub poll_interval: u64,

    /// Observer position for distances: lat,lon
    #[arg(long, value_parser = parse_point)]
    pub near: Option<GeoPoint>,

    /// Maximum event rows drawn per refresh
    #[arg(long, default_value = "20")]
    pub rows: usize,

    /// Maximum results for `s <city>` searches
    #[arg(long, default_value_t = DEFAULT_SEARCH_LIMIT)]
    pub search_limit: usize,

    /// Drop a tick while the previous one is still in flight
    #[arg(long)]
    pub single_flight: bool,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `tail` command.
#[derive(Parser, Debug)]
pub struct TailArgs {
    /// Data provider
    #[arg(long, short = 'p', default_value = "kandilli", value_parser = parse_provider)]
    pub provider: Provider,

    /// City filter ("all" shows every event)
    #[arg(long, short = 'c', default_value = "all", value_parser = parse_city_filter)]
    pub city: CityFilter,

    /// Maximum number of events to fetch
    #[arg(long, short = 'n', default_value_t = DEFAULT_LIVE_LIMIT)]
    pub limit: usize,

    /// Observer position for distances: lat,lon
    #[arg(long, value_parser = parse_point)]
    pub near: Option<GeoPoint>,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments for the `search` command.
#[derive(Parser, Debug)]
pub struct SearchArgs {
    /// City to search
    #[arg(long, short = 'c')]
    pub city: String,

    /// Maximum results to return
    #[arg(long, short = 'n', default_value_t = DEFAULT_SEARCH_LIMIT)]
    pub limit: usize,

    /// Observer position for distances: lat,lon
    #[arg(long, value_parser = parse_point)]
    pub near: Option<GeoPoint>,

    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Arguments shared by `cities` and `status`.
#[derive(Parser, Debug)]
pub struct FormatArgs {
    /// Output format
    #[arg(long, short = 'f', default_value = "human", value_parser = parse_format)]
    pub format: Format,
}

/// Parse a provider from string.
fn parse_provider(s: &str) -> Result<Provider, String> {
    s.parse()
}

/// Parse a city filter from string.
fn parse_city_filter(s: &str) -> Result<CityFilter, String> {
    s.parse()
}

/// Parse an observer position from string.
fn parse_point(s: &str) -> Result<GeoPoint, String> {
    s.parse()
}

/// Parse an output format from string.
fn parse_format(s: &str) -> Result<Format, String> {
    s.parse()
}

/// A line typed into the live dashboard.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    /// `p <provider>`
    Provider(Provider),
    /// `c <city|all>`
    Filter(CityFilter),
    /// `r`
    Refresh,
    /// `s <city>`; a bare `s` lists the city directory
    Search(String),
    /// `x`
    CloseSearch,
    /// `o <id>`
    Open(String),
    /// `q`
    Quit,
}

impl std::str::FromStr for ViewCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        match verb {
            "p" => rest.parse().map(Self::Provider),
            "c" => rest.parse().map(Self::Filter),
            "r" => Ok(Self::Refresh),
            "s" => Ok(Self::Search(rest.to_string())),
            "x" => Ok(Self::CloseSearch),
            "o" if !rest.is_empty() => Ok(Self::Open(rest.to_string())),
            "o" => Err("usage: o <event id>".into()),
            "q" => Ok(Self::Quit),
            "" => Err("empty command".into()),
            other => Err(format!("unknown command: {other}")),
        }
    }
}
