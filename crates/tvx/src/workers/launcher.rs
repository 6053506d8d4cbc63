//! 🚀 The FanOutLauncher: part metronome, part bouncer, part WaitGroup.
//!
//! 🧠 Knowledge graph:
//! - Launch cadence is set by the [`RateLimiter`]: one worker per tick, no bursts.
//! - Launch width is capped by a semaphore: at most `max_in_flight` workers alive at once.
//! - Every worker gets a clone of the sender. The launcher's own clone is dropped only
//!   after every handle has been joined, which is what closes the channel.
//! - A failed worker is logged and counted. It never stops its siblings.

use std::sync::Arc;

use async_channel::Sender;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::{DetailWorker, Worker};
use crate::backends::TransitApi;
use crate::common::{CompleteStation, StationListing};
use crate::limiter::RateLimiter;
use crate::progress::FanOutProgress;

/// 📋 What the launcher did, for the run report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LaunchSummary {
    pub launched: usize,
    /// workers that ended in an error or a panic, i.e. stations that never reached the channel
    pub failed: usize,
}

#[derive(Debug)]
pub(crate) struct FanOutLauncher {
    api: TransitApi,
    listings: Vec<StationListing>,
    limiter: RateLimiter,
    permits: Arc<Semaphore>,
    tx: Sender<CompleteStation>,
    progress: FanOutProgress,
}

impl FanOutLauncher {
    pub(crate) fn new(
        api: TransitApi,
        listings: Vec<StationListing>,
        limiter: RateLimiter,
        max_in_flight: usize,
        tx: Sender<CompleteStation>,
        progress: FanOutProgress,
    ) -> Self {
        Self {
            api,
            listings,
            limiter,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            tx,
            progress,
        }
    }

    /// 🧵 Launch everything, join everything, then let the channel close.
    pub(crate) async fn run(mut self) -> LaunchSummary {
        let mut summary = LaunchSummary::default();
        debug!(
            "🚀 launching {} detail workers, one every {:?}, at most {} alive",
            self.listings.len(),
            self.limiter.period(),
            self.permits.available_permits()
        );
        let mut handles: Vec<(String, JoinHandle<anyhow::Result<()>>)> =
            Vec::with_capacity(self.listings.len());

        for listing in std::mem::take(&mut self.listings) {
            self.limiter.wait().await;

            let permit = match Arc::clone(&self.permits).acquire_owned().await {
                Ok(permit) => permit,
                Err(err) => {
                    // 💀 only possible if the semaphore was closed, and nobody closes it
                    error!("💀 concurrency permits vanished mid-launch: {err}");
                    break;
                }
            };

            let code = listing.location_code.clone();
            let worker = DetailWorker::new(
                self.api.clone(),
                listing,
                self.tx.clone(),
                permit,
                self.progress.clone(),
            );
            handles.push((code, worker.start()));
            summary.launched += 1;
        }
        debug!("🚀 launched {} detail workers, waiting on stragglers", summary.launched);

        for (code, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    summary.failed += 1;
                    warn!("⚠️ station {}: {:#}", code, err);
                }
                Err(join_err) => {
                    summary.failed += 1;
                    error!("💀 detail worker for station {} panicked: {}", code, join_err);
                }
            }
        }

        debug!(
            "🏁 fan-out done: {} of {} workers finished",
            self.progress.position(),
            summary.launched
        );
        self.progress.finish();
        // 🏁 self.tx drops here, the last sender goes, the aggregator sees the end
        summary
    }
}
