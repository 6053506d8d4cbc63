//! 🚏 The stations flow: roster → fan-out detail fetch → fan-in → one batch → Postgres.
//!
//! 🎬 *[4,000 stations. 10 per second. one aggregator, one clipboard.]*
//!
//! ⚠️ Persistence only starts once the channel is closed, which only happens once every
//! detail worker is done. The batch is therefore always the complete set for this run.

use std::time::Instant;

use async_channel::Receiver;
use tracing::{debug, error, info};

use crate::app_config::AppConfig;
use crate::backends::{RecordStore, TransitApi};
use crate::common::CompleteStation;
use crate::limiter::RateLimiter;
use crate::persister::{Upsert, UpsertBatch, persist};
use crate::progress::{FanOutProgress, Flow, RunReport};
use crate::workers::{FanOutLauncher, LaunchSummary};

/// 📥 Drain the channel into a batch until the last sender is gone.
async fn aggregate(rx: Receiver<CompleteStation>) -> UpsertBatch {
    let mut batch = UpsertBatch::new();
    while let Ok(station) = rx.recv().await {
        debug!("📥 Queued station {} ({})", station.location_code, station.station_name);
        batch.queue(Upsert::Station(station));
    }
    batch
}

/// 🚀 Refresh the whole station roster.
pub async fn refresh_stations<R>(api: &TransitApi, records: &R, config: &AppConfig) -> RunReport
where
    R: RecordStore + ?Sized,
{
    let started = Instant::now();
    info!("🚏 Station refresh started");
    let mut report = RunReport::new(Flow::Stations);

    let listings = match api.list_stations().await {
        Ok(listings) => listings,
        Err(err) => {
            error!("💀 Could not list stations, skipping this run: {err:#}");
            report.elapsed = started.elapsed();
            report.log_summary();
            return report;
        }
    };
    report.listed = listings.len();

    let limiter = match RateLimiter::per_second(config.fan_out.requests_per_second) {
        Ok(limiter) => limiter,
        Err(err) => {
            error!("💀 {err:#}");
            report.dropped = report.listed;
            report.elapsed = started.elapsed();
            report.log_summary();
            return report;
        }
    };

    let progress = FanOutProgress::new(listings.len(), config.fan_out.show_progress);
    // 🤝 capacity 1 is as close to a rendezvous as async-channel gets
    let (tx, rx) = async_channel::bounded(1);
    let launcher = FanOutLauncher::new(
        api.clone(),
        listings,
        limiter,
        config.fan_out.max_in_flight.max(1),
        tx,
        progress,
    );
    let launch = tokio::spawn(launcher.run());

    let batch = aggregate(rx).await;

    let summary = match launch.await {
        Ok(summary) => summary,
        Err(join_err) => {
            error!("💀 The fan-out launcher panicked: {join_err}");
            LaunchSummary::default()
        }
    };
    debug!(
        "🧵 {} detail workers launched, {} never made it to the channel",
        summary.launched, summary.failed
    );

    report.produced = batch.len();
    report.dropped = report.listed.saturating_sub(report.produced);

    let outcome = persist(records, batch, "stations").await;
    report.submitted = outcome.submitted;
    report.failed = outcome.failed;

    report.elapsed = started.elapsed();
    report.log_summary();
    report
}
