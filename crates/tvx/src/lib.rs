//! 🚌 tvx: transit ingestion, every fifteen seconds, forever.
//!
//! Pulls live trips and the station roster from the transit API, upserts them into
//! Postgres, and keeps a Redis geo index of every bus that is moving right now.
//!
//! 🧠 Knowledge graph:
//! - [`pipelines`]: the two flows. Each returns a [`RunReport`](progress::RunReport), never an error.
//! - [`backends`]: the transit API client and the two destinations, each trait → impls → enum.
//! - [`scheduler`]: the periodic loop and shutdown.
//! - `workers`: the station fan-out. Private. Nobody outside the pipeline gets to boss them around.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

pub mod app_config;
pub mod backends;
pub mod common;
pub mod limiter;
pub mod persister;
pub mod pipelines;
pub mod progress;
pub mod scheduler;
pub mod snapshot;
pub mod transforms;
mod workers;

use crate::app_config::AppConfig;
use crate::backends::{Stores, TransitApi};
use crate::progress::RunReport;
use crate::scheduler::{Scheduler, shutdown_signal};

/// 🎛️ What the process was asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// ⏰ both flows on their schedules, until Ctrl-C / SIGTERM
    Schedule,
    /// 🚏 one station refresh, then exit
    StationsOnce,
    /// 🚌 one trip refresh, then exit
    TripsOnce,
}

/// 🚀 Validate, connect, run, close.
///
/// Only construction can fail here: bad config, unreachable stores at startup.
/// Once a flow is running, its problems end up in its [`RunReport`].
/// One-shot modes hand the report back; the scheduler returns `None`.
pub async fn run(app_config: AppConfig, mode: Mode) -> Result<Option<RunReport>> {
    app_config
        .validate()
        .context("💀 The configuration loaded, but it doesn't make sense")?;

    let api = TransitApi::new(&app_config.transit_api)?;
    let stores = Stores::connect(&app_config)
        .await
        .context("💀 Could not construct the stores at startup")?;

    match mode {
        Mode::Schedule => {
            let scheduler = Scheduler::new(api, Arc::new(stores), app_config);
            let summary = scheduler.run_until(shutdown_signal()).await;
            info!("🏁 Program terminated: {:?}", summary);
            Ok(None)
        }
        Mode::StationsOnce => {
            let report =
                pipelines::refresh_stations(&api, &stores.records, &app_config).await;
            stores.close().await;
            Ok(Some(report))
        }
        Mode::TripsOnce => {
            let report = pipelines::refresh_trips(
                &api,
                &stores.records,
                &stores.positions,
                &app_config,
            )
            .await;
            stores.close().await;
            Ok(Some(report))
        }
    }
}
