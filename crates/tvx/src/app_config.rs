//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing.": every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! 🧠 Knowledge graph:
//! - Backend-specific configs live next to their backends (`TransitApiConfig`,
//!   `PostgresConfig`, `RedisConfig`) and are re-exported from `backends`.
//! - Pipeline knobs (fan-out rate, snapshot TTL, time zone, schedule) live here.
//! - Every section has serde defaults, so an empty file plus `TVX_TRANSIT_API__API_KEY`
//!   is a complete config for a dry run.

use anyhow::{Context, bail};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::backends::{PostgresConfig, RedisConfig, TransitApiConfig};
use crate::limiter::MAX_REQUESTS_PER_SECOND;

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub transit_api: TransitApiConfig,
    #[serde(default)]
    pub fan_out: FanOutConfig,
    #[serde(default)]
    pub trips: TripsConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub stores: StoresConfig,
}

// ============================================================
// 🚀 FanOutConfig: how fast and how wide the detail fetch goes
// ============================================================

/// 🚀 Knobs for the station detail fan-out.
///
/// `requests_per_second` throttles how often a worker is *launched*.
/// `max_in_flight` caps how many are alive at once, so a ten-thousand-stop
/// roster doesn't turn into ten thousand open sockets.
#[derive(Debug, Deserialize, Clone)]
pub struct FanOutConfig {
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// 📊 draw an indicatif bar while stations trickle in (one-shot runs, mostly)
    #[serde(default)]
    pub show_progress: bool,
}

// 🚦 ten per second: the API's published courtesy limit
fn default_requests_per_second() -> u32 {
    10
}

fn default_max_in_flight() -> usize {
    64
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            max_in_flight: default_max_in_flight(),
            show_progress: false,
        }
    }
}

// ============================================================
// 🕰️ TripsConfig: the wall clock the API lives on
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct TripsConfig {
    #[serde(default = "default_source_time_zone")]
    pub source_time_zone: String,
    #[serde(default = "default_modified_date_format")]
    pub modified_date_format: String,
}

fn default_source_time_zone() -> String {
    "America/New_York".to_string()
}

fn default_modified_date_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

impl Default for TripsConfig {
    fn default() -> Self {
        Self {
            source_time_zone: default_source_time_zone(),
            modified_date_format: default_modified_date_format(),
        }
    }
}

// ============================================================
// 🗺️ SnapshotConfig: where live positions go to (briefly) live
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    #[serde(default = "default_geo_index_key")]
    pub geo_index_key: String,
    /// ⏳ per-trip position keys expire after this long, whether or not we delete them
    #[serde(default = "default_position_ttl_secs")]
    pub position_ttl_secs: u64,
}

fn default_geo_index_key() -> String {
    "locates".to_string()
}

fn default_position_ttl_secs() -> u64 {
    3600
}

impl SnapshotConfig {
    pub fn position_ttl(&self) -> Duration {
        Duration::from_secs(self.position_ttl_secs)
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            geo_index_key: default_geo_index_key(),
            position_ttl_secs: default_position_ttl_secs(),
        }
    }
}

// ============================================================
// ⏰ ScheduleConfig: "run every N seconds", the outer loop
// ============================================================

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_trips_every_secs")]
    pub trips_every_secs: u64,
    #[serde(default = "default_stations_every_secs")]
    pub stations_every_secs: u64,
    /// 🚏 refresh the station roster right away instead of waiting a whole month
    #[serde(default)]
    pub stations_on_start: bool,
}

fn default_trips_every_secs() -> u64 {
    15
}

// 📅 thirty days. "monthly", give or take February's feelings.
fn default_stations_every_secs() -> u64 {
    30 * 24 * 60 * 60
}

impl ScheduleConfig {
    pub fn trips_every(&self) -> Duration {
        Duration::from_secs(self.trips_every_secs)
    }

    pub fn stations_every(&self) -> Duration {
        Duration::from_secs(self.stations_every_secs)
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            trips_every_secs: default_trips_every_secs(),
            stations_every_secs: default_stations_every_secs(),
            stations_on_start: false,
        }
    }
}

// ============================================================
// 🎭 StoresConfig: which backend plays which destination
// ============================================================

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStoreKind {
    #[default]
    Postgres,
    InMemory,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PositionStoreKind {
    #[default]
    Redis,
    InMemory,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StoresConfig {
    #[serde(default)]
    pub record_store: RecordStoreKind,
    #[serde(default)]
    pub position_store: PositionStoreKind,
}

impl AppConfig {
    /// ✅ Reject the settings that would make a run meaningless, warn about the ones that make it sad.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.fan_out.requests_per_second == 0 {
            bail!("💀 fan_out.requests_per_second must be at least 1. Zero is a parking lot, not a rate.");
        }
        if self.fan_out.requests_per_second > MAX_REQUESTS_PER_SECOND {
            bail!(
                "💀 fan_out.requests_per_second must be at most {}. Any faster and the tick rounds to zero.",
                MAX_REQUESTS_PER_SECOND
            );
        }
        if self.fan_out.max_in_flight == 0 {
            bail!("💀 fan_out.max_in_flight must be at least 1, or no detail fetch would ever start.");
        }
        if self.schedule.trips_every_secs == 0 || self.schedule.stations_every_secs == 0 {
            bail!("💀 schedule intervals must be at least one second. We are fast, but not that fast.");
        }
        if self.snapshot.position_ttl_secs == 0 {
            bail!("💀 snapshot.position_ttl_secs must be at least 1. Redis won't take EX 0, and neither will we.");
        }
        if self.stores.record_store == RecordStoreKind::Postgres && self.postgres.url.is_empty() {
            bail!("💀 postgres.url is empty but the record store is postgres. Set TVX_POSTGRES__URL or pick in_memory.");
        }
        if self.stores.position_store == PositionStoreKind::Redis && self.redis.url.is_empty() {
            bail!("💀 redis.url is empty but the position store is redis. Set TVX_REDIS__URL or pick in_memory.");
        }
        if self.transit_api.api_key.is_empty() {
            // ⚠️ not fatal: the API will just say no, every run, until someone notices
            warn!("⚠️ transit_api.api_key is empty: the transit API will probably reject every request");
        }
        Ok(())
    }

    /// 🧪 Swap both destinations for the in-memory backends. Nothing leaves the process.
    pub fn into_dry_run(mut self) -> Self {
        self.stores.record_store = RecordStoreKind::InMemory;
        self.stores.position_store = PositionStoreKind::InMemory;
        self
    }
}

/// 🚀 Load the config: from a file, from env vars, or from the sheer power of hoping.
///
/// 🔧 Merges environment variables (`TVX_*`, nested with `__`) with an optional TOML file.
/// - `None` → env vars only.
/// - `Some(path)` → env vars + TOML file, merged. TOML wins on conflicts.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<AppConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("TVX_").split("__"));

    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (TVX_*). \
             The file exists in our hearts, but apparently not in valid TOML.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (TVX_*). \
                 No file was provided: this one's all on the environment. Classic."
            .to_string(),
    };

    config.extract().context(context_msg)
}
