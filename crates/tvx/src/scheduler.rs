//! ⏰ The scheduler: "run every N seconds", forever, until someone presses Ctrl-C.
//!
//! 🎬 *[every fifteen seconds, a clock strikes. the buses are counted again.]*
//! *[once a month, a bigger clock strikes. the stations are counted again.]*
//!
//! 🧠 Knowledge graph:
//! - Trips run inline in the loop. A run that overruns its slot skips the missed ticks
//!   instead of stacking them up.
//! - Stations run as their own task, since a full roster takes minutes at 10 req/s. A station
//!   tick that arrives while the previous stations run is still going is skipped.
//! - On shutdown the loop stops, any in-flight stations run is awaited, and the stores close.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval, interval_at};
use tracing::{error, info, warn};

use crate::app_config::AppConfig;
use crate::backends::{Stores, TransitApi};
use crate::pipelines::{refresh_stations, refresh_trips};
use crate::progress::RunReport;

/// 📋 How many times each flow ran before shutdown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleSummary {
    pub trip_runs: usize,
    pub station_runs: usize,
    pub station_ticks_skipped: usize,
}

#[derive(Debug)]
pub struct Scheduler {
    api: TransitApi,
    stores: Arc<Stores>,
    config: Arc<AppConfig>,
}

impl Scheduler {
    pub fn new(api: TransitApi, stores: Arc<Stores>, config: AppConfig) -> Self {
        Self {
            api,
            stores,
            config: Arc::new(config),
        }
    }

    /// 🔄 Run both periodic jobs until `shutdown` resolves.
    pub async fn run_until<F>(self, shutdown: F) -> ScheduleSummary
    where
        F: Future<Output = ()>,
    {
        let schedule = &self.config.schedule;
        let mut summary = ScheduleSummary::default();

        let mut trips_tick = interval(schedule.trips_every());
        trips_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let first_stations_run = if schedule.stations_on_start {
            Instant::now()
        } else {
            Instant::now() + schedule.stations_every()
        };
        let mut stations_tick = interval_at(first_stations_run, schedule.stations_every());
        stations_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "⏰ Scheduler started: trips every {:?}, stations every {:?}",
            schedule.trips_every(),
            schedule.stations_every()
        );

        let mut stations_task: Option<JoinHandle<RunReport>> = None;
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("🛑 Shutdown requested, no new runs will start");
                    break;
                }
                _ = trips_tick.tick() => {
                    refresh_trips(
                        &self.api,
                        &self.stores.records,
                        &self.stores.positions,
                        &self.config,
                    )
                    .await;
                    summary.trip_runs += 1;
                }
                _ = stations_tick.tick() => {
                    if stations_task.as_ref().is_some_and(|task| !task.is_finished()) {
                        warn!("⚠️ Previous stations run is still going, skipping this tick");
                        summary.station_ticks_skipped += 1;
                        continue;
                    }
                    stations_task = Some(self.spawn_stations_run());
                    summary.station_runs += 1;
                }
            }
        }

        if let Some(task) = stations_task {
            if !task.is_finished() {
                info!("⏳ Waiting for the in-flight stations run to finish");
            }
            if let Err(join_err) = task.await {
                error!("💀 The stations run panicked: {join_err}");
            }
        }

        self.stores.close().await;
        info!(
            "👋 Scheduler stopped after {} trip runs and {} station runs",
            summary.trip_runs, summary.station_runs
        );
        summary
    }

    fn spawn_stations_run(&self) -> JoinHandle<RunReport> {
        let api = self.api.clone();
        let stores = Arc::clone(&self.stores);
        let config = Arc::clone(&self.config);
        tokio::spawn(async move { refresh_stations(&api, &stores.records, &config).await })
    }
}

/// 🛑 Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("💀 Could not listen for Ctrl-C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("💀 Could not listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("🛑 Received interrupt signal"),
        _ = terminate => info!("🛑 Received SIGTERM"),
    }
}
