//! 🗺️ The snapshot publisher: where is every moving bus, right now?
//!
//! 🎬 *[the map is wiped clean. every dot disappears at once.]*
//! *[then, one by one, the buses that are still moving reappear.]*
//! *[the parked ones do not. nobody mourns them. they'll be back tomorrow.]*
//!
//! 🧠 Knowledge graph:
//! - Per-trip position keys get a TTL, so a trip that stops reporting ages out on its own.
//! - The geo index is deleted and repopulated every run. Never patched. A trip absent
//!   from this run is absent from the map.
//! - Position keys and the index are separate failure domains: either can fail, the other
//!   still runs. Both failures are logged and show up in the outcome.

use std::time::Duration;

use tracing::{debug, error, info};

use crate::backends::PositionStore;
use crate::common::{GeoMember, PositionEntry};

/// 📋 How the publish went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotOutcome {
    pub positions_written: usize,
    /// 🗺️ the old index is gone and the new members are in
    pub index_rebuilt: bool,
}

/// 🚀 Write every position key, then rebuild the geo index from the same set.
pub async fn publish_snapshot<S>(
    store: &S,
    entries: &[PositionEntry],
    index_key: &str,
    ttl: Duration,
) -> SnapshotOutcome
where
    S: PositionStore + ?Sized,
{
    let mut outcome = SnapshotOutcome::default();

    // 📍 failure domain one: per-trip position keys
    match store.put_positions(entries, ttl).await {
        Ok(()) => {
            outcome.positions_written = entries.len();
            debug!("📍 {} position keys written (ttl {:?})", entries.len(), ttl);
        }
        Err(err) => error!("💀 Error updating position keys: {err:#}"),
    }

    // 🗺️ failure domain two: the geo index, delete then repopulate
    let deleted = match store.delete_index(index_key).await {
        Ok(()) => true,
        Err(err) => {
            // ⚠️ the add still runs; stale members linger until the next successful delete
            error!("💀 Error deleting geo index {index_key}: {err:#}");
            false
        }
    };

    let members: Vec<GeoMember> = entries.iter().map(|entry| entry.member.clone()).collect();
    let added = if members.is_empty() {
        // 💤 GEOADD with no members is a Redis error; the index just stays deleted
        true
    } else {
        match store.add_to_index(index_key, &members).await {
            Ok(()) => true,
            Err(err) => {
                error!("💀 Unable to update geo index {index_key}: {err:#}");
                false
            }
        }
    };

    outcome.index_rebuilt = deleted && added;
    if outcome.index_rebuilt {
        info!(
            "🗺️ Geo index {} rebuilt with {} live trips",
            index_key,
            members.len()
        );
    }
    outcome
}
