//! 🎬 *[a worker is born. it is handed one station code and a channel.]*
//! *[it asks the API one question. it waits. it gets an answer, or it doesn't.]*
//! *[either way, it never asks again.]*
//!
//! 🔍 The DetailWorker: one station, one detail fetch, one enriched record on the channel.
//! No retries. Freshness beats completeness, and next month there's another roster. 🦆

use anyhow::{Context, Result};
use async_channel::Sender;
use tokio::sync::OwnedSemaphorePermit;
use tokio::task::JoinHandle;
use tracing::debug;

use super::Worker;
use crate::backends::TransitApi;
use crate::common::{CompleteStation, StationListing};
use crate::progress::FanOutProgress;
use crate::transforms::enrich_station;

#[derive(Debug)]
pub(crate) struct DetailWorker {
    api: TransitApi,
    listing: StationListing,
    tx: Sender<CompleteStation>,
    /// 🎫 held for the worker's whole life; dropping it lets the launcher start another
    permit: OwnedSemaphorePermit,
    progress: FanOutProgress,
}

impl DetailWorker {
    pub(crate) fn new(
        api: TransitApi,
        listing: StationListing,
        tx: Sender<CompleteStation>,
        permit: OwnedSemaphorePermit,
        progress: FanOutProgress,
    ) -> Self {
        Self {
            api,
            listing,
            tx,
            permit,
            progress,
        }
    }

    async fn fetch_and_send(self) -> Result<()> {
        let code = self.listing.location_code.clone();
        debug!("🔍 Getting location information for station {}", code);

        let details = self
            .api
            .station_details(&code)
            .await
            .with_context(|| format!("💀 detail fetch for station {code} failed, dropping it"))?;

        let station = enrich_station(self.listing, details);

        // 🤝 blocks until the aggregator takes it
        self.tx
            .send(station)
            .await
            .with_context(|| format!("💀 the aggregator left before station {code} arrived"))?;

        drop(self.permit);
        Ok(())
    }
}

impl Worker for DetailWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            let progress = self.progress.clone();
            let result = self.fetch_and_send().await;
            progress.tick_one();
            result
        })
    }
}
