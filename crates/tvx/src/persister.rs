//! 🐘 The batch persister: one batch, one trip to the database, one honest count.
//!
//! 🎬 *[the aggregator hands over a clipboard with 4,000 rows on it.]*
//! *["all of these?" asks the persister. "all of these," says the aggregator.]*
//! *[the persister sends them. three come back angry. 3,997 rows were successfully inserted.]*
//!
//! 🧠 Knowledge graph:
//! - [`UpsertBatch`]: ordered list of upserts, one per transformed record. Never padded,
//!   never substituted: if a record failed to transform, it simply isn't here.
//! - [`BatchOutcome`]: `submitted - failed` is the only success signal.
//! - [`persist`]: hands the batch to a [`RecordStore`] and turns whatever happens into
//!   a log line and an outcome. It does not retry. Freshness beats completeness. 🦆

use tracing::{error, info};

use crate::backends::RecordStore;
use crate::common::{CompleteStation, TripRecord};

/// 📝 One parameterized upsert, waiting for its turn.
#[derive(Debug, Clone, PartialEq)]
pub enum Upsert {
    Station(CompleteStation),
    Trip(TripRecord),
}

impl Upsert {
    /// 🔑 The natural key this row conflicts on, as text (for logs and failure injection).
    pub fn natural_key(&self) -> String {
        match self {
            Upsert::Station(station) => station.location_code.clone(),
            Upsert::Trip(trip) => trip.trip_id.to_string(),
        }
    }
}

/// 📦 An ordered sequence of upserts bound to one persistence round trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertBatch {
    statements: Vec<Upsert>,
}

impl UpsertBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self, upsert: Upsert) {
        self.statements.push(upsert);
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Upsert> {
        self.statements.iter()
    }
}

/// 📊 How the batch went, row by row, summed up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub submitted: usize,
    pub failed: usize,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.submitted.saturating_sub(self.failed)
    }
}

/// 🚀 Send the whole batch and report. Never returns an error: a batch that couldn't be
/// sent at all is logged and counted as every row failed.
pub async fn persist<S>(store: &S, batch: UpsertBatch, table: &str) -> BatchOutcome
where
    S: RecordStore + ?Sized,
{
    let submitted = batch.len();
    if submitted == 0 {
        info!("💤 Nothing to upsert into {{{table}}} this run");
        return BatchOutcome::default();
    }

    match store.execute(batch).await {
        Ok(outcome) => {
            info!(
                "✅ {} rows were successfully inserted/updated into {{{}}} ({} failed)",
                outcome.succeeded(),
                table,
                outcome.failed
            );
            outcome
        }
        Err(err) => {
            error!("💀 Could not send the {{{table}}} batch at all: {err:#}");
            BatchOutcome {
                submitted,
                failed: submitted,
            }
        }
    }
}
