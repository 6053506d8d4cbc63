//! 🧵 Workers: the ones who actually do the work while the pipeline takes the credit.
//!
//! 🚀 The station fan-out is two kinds of worker:
//! - [`FanOutLauncher`]: the single coordinator. Waits on the rate limiter, takes a
//!   concurrency permit, launches one [`DetailWorker`] per listing, then waits for all of
//!   them before letting go of its end of the channel.
//! - [`DetailWorker`]: one per station. One GET, one enrichment, one send. Then it's gone.
//!
//! ⚠️ The channel closes when the last sender drops. The launcher holds a sender until every
//! worker has been joined, so "channel closed" means "everybody is done". 🦆

use anyhow::Result;
use tokio::task::JoinHandle;

mod detail_worker;
mod launcher;

pub(crate) use detail_worker::DetailWorker;
pub(crate) use launcher::{FanOutLauncher, LaunchSummary};

/// 🏗️ A background worker, that does work. duh.
pub(crate) trait Worker {
    /// 🚀 Spawn it. The handle says how it went.
    fn start(self) -> JoinHandle<Result<()>>;
}
