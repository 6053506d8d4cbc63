//! # Previously, on tvx...
//!
//! 🎬 The buses were moving. The database was asleep. Someone needed a place to put
//! rows that wasn't Postgres and positions that wasn't Redis. Somewhere that lives
//! entirely in RAM, gone the moment you blink.
//!
//! `in_mem` provides [`InMemoryRecordStore`] and [`InMemoryPositionStore`] for dry runs
//! and tests. Both keep their state behind an `Arc<Mutex<...>>` so callers can clone a
//! handle, hand the original to a pipeline, and inspect what arrived afterwards.
//!
//! ⚠️ The record store mirrors the SQL conflict rules on purpose: stations are fully
//! replaced, trips only refresh `prev_stop` and `delay`. If the SQL changes, this
//! changes with it.
//!
//! 🦆

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backends::{PositionStore, RecordStore};
use crate::common::{CompleteStation, GeoMember, PositionEntry, TripRecord};
use crate::persister::{BatchOutcome, Upsert, UpsertBatch};

// ============================================================
//  🐘 InMemoryRecordStore
// ============================================================

/// 📋 The "tables". Keyed by natural key, so upserts really are upserts.
#[derive(Debug, Clone, Default)]
pub struct RecordTables {
    pub stations: BTreeMap<String, CompleteStation>,
    pub trips: BTreeMap<i32, TripRecord>,
    /// how many batches were executed (one per `execute`)
    pub round_trips: usize,
}

/// 🐘 A relational store that is actually two `BTreeMap`s in a trench coat.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    tables: Arc<Mutex<RecordTables>>,
    /// 💣 natural keys whose rows "fail": for exercising per-row isolation
    failing_keys: Arc<HashSet<String>>,
    unreachable: bool,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 💣 Rows with these natural keys fail, their siblings don't.
    pub fn with_failing_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.failing_keys = Arc::new(keys.into_iter().map(Into::into).collect());
        self
    }

    /// 🔌 Every batch fails before a single row is sent.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub async fn tables(&self) -> RecordTables {
        self.tables.lock().await.clone()
    }
}

fn apply_upsert(tables: &mut RecordTables, upsert: &Upsert) {
    match upsert {
        // 🔄 stations: every descriptive field is replaced
        Upsert::Station(station) => {
            tables
                .stations
                .insert(station.location_code.clone(), station.clone());
        }
        // 🔄 trips: history stays, only prev_stop and delay move
        Upsert::Trip(trip) => match tables.trips.get_mut(&trip.trip_id) {
            Some(existing) => {
                existing.prev_stop = trip.prev_stop;
                existing.delay = trip.delay;
            }
            None => {
                tables.trips.insert(trip.trip_id, trip.clone());
            }
        },
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn execute(&self, batch: UpsertBatch) -> Result<BatchOutcome> {
        if self.unreachable {
            bail!("💀 in-memory record store is configured as unreachable");
        }

        let mut tables = self.tables.lock().await;
        tables.round_trips += 1;

        let mut outcome = BatchOutcome {
            submitted: batch.len(),
            failed: 0,
        };
        for upsert in batch.iter() {
            if self.failing_keys.contains(&upsert.natural_key()) {
                outcome.failed += 1;
                continue;
            }
            apply_upsert(&mut tables, upsert);
        }
        Ok(outcome)
    }
}

// ============================================================
//  🧲 InMemoryPositionStore
// ============================================================

/// 📍 One stored position key: the serialized blob and the TTL it was written with.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPosition {
    pub blob: String,
    pub ttl: Duration,
}

/// 🗺️ Keys and geo indexes, Redis-shaped.
#[derive(Debug, Clone, Default)]
pub struct PositionTables {
    pub positions: BTreeMap<String, StoredPosition>,
    pub indexes: BTreeMap<String, BTreeMap<String, GeoMember>>,
}

impl PositionTables {
    /// 🔍 The geo query every reader actually runs: "is this trip on the map?"
    pub fn index_member(&self, index_key: &str, name: &str) -> Option<&GeoMember> {
        self.indexes.get(index_key).and_then(|index| index.get(name))
    }

    pub fn index_len(&self, index_key: &str) -> usize {
        self.indexes.get(index_key).map_or(0, BTreeMap::len)
    }
}

/// 🧲 A key/geo store that never forgets (until the process exits).
#[derive(Debug, Clone, Default)]
pub struct InMemoryPositionStore {
    tables: Arc<Mutex<PositionTables>>,
    fail_positions: bool,
    fail_delete: bool,
    fail_add: bool,
}

impl InMemoryPositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_positions(mut self) -> Self {
        self.fail_positions = true;
        self
    }

    pub fn failing_index_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn failing_index_add(mut self) -> Self {
        self.fail_add = true;
        self
    }

    pub async fn tables(&self) -> PositionTables {
        self.tables.lock().await.clone()
    }
}

#[async_trait]
impl PositionStore for InMemoryPositionStore {
    async fn put_positions(&self, entries: &[PositionEntry], ttl: Duration) -> Result<()> {
        if self.fail_positions {
            bail!("💀 in-memory position writes are configured to fail");
        }
        let mut tables = self.tables.lock().await;
        for entry in entries {
            let blob = serde_json::to_string(&entry.position)
                .context("💀 a position refused to become JSON")?;
            tables
                .positions
                .insert(entry.key.clone(), StoredPosition { blob, ttl });
        }
        Ok(())
    }

    async fn delete_index(&self, index_key: &str) -> Result<()> {
        if self.fail_delete {
            bail!("💀 in-memory index delete is configured to fail");
        }
        self.tables.lock().await.indexes.remove(index_key);
        Ok(())
    }

    async fn add_to_index(&self, index_key: &str, members: &[GeoMember]) -> Result<()> {
        if self.fail_add {
            bail!("💀 in-memory index add is configured to fail");
        }
        let mut tables = self.tables.lock().await;
        let index = tables.indexes.entry(index_key.to_string()).or_default();
        for member in members {
            index.insert(member.name.clone(), member.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{BusType, StationType};

    fn trip(trip_id: i32, first_stop: i32, prev_stop: i32, delay: i32) -> TripRecord {
        TripRecord {
            trip_id,
            route_number: "19".to_string(),
            start_time: "06:15".to_string(),
            end_time: "07:40".to_string(),
            bus_type: BusType::Coach,
            first_stop,
            prev_stop,
            last_stop: 150,
            delay,
            timestamp: 1_705_332_645,
        }
    }

    fn station(name: &str, lat: f64) -> CompleteStation {
        CompleteStation {
            location_code: "UN".to_string(),
            station_name: name.to_string(),
            station_type: StationType::TrainBusStation,
            lat,
            lng: -79.38,
            city: "Toronto".to_string(),
            zone_code: 2,
        }
    }

    #[tokio::test]
    async fn the_one_where_the_same_stations_twice_change_nothing() -> Result<()> {
        let store = InMemoryRecordStore::new();
        let mut batch = UpsertBatch::new();
        batch.queue(Upsert::Station(station("Union", 43.64)));

        store.execute(batch.clone()).await?;
        let after_first = store.tables().await;
        store.execute(batch).await?;
        let after_second = store.tables().await;

        assert_eq!(after_first.stations.len(), 1);
        assert_eq!(after_first.stations, after_second.stations);
        assert_eq!(after_second.round_trips, 2);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_stations_are_fully_replaced_on_conflict() -> Result<()> {
        let store = InMemoryRecordStore::new();
        let mut first = UpsertBatch::new();
        first.queue(Upsert::Station(station("Union", 43.64)));
        store.execute(first).await?;

        let mut renamed = UpsertBatch::new();
        renamed.queue(Upsert::Station(station("Union Station", 43.645)));
        store.execute(renamed).await?;

        let tables = store.tables().await;
        assert_eq!(tables.stations["UN"].station_name, "Union Station");
        assert_eq!(tables.stations["UN"].lat, 43.645);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_trips_keep_their_history_on_conflict() -> Result<()> {
        let store = InMemoryRecordStore::new();
        let mut first = UpsertBatch::new();
        first.queue(Upsert::Trip(trip(7131, 100, -1, 0)));
        store.execute(first).await?;

        let mut later = UpsertBatch::new();
        later.queue(Upsert::Trip(trip(7131, 999, 105, 120)));
        store.execute(later).await?;

        let stored = &store.tables().await.trips[&7131];
        assert_eq!(stored.first_stop, 100, "first stop is history, it must not move");
        assert_eq!(stored.prev_stop, 105);
        assert_eq!(stored.delay, 120);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_deleting_the_index_really_deletes_it() -> Result<()> {
        let store = InMemoryPositionStore::new();
        let member = GeoMember {
            name: "7131".to_string(),
            lat: 43.7,
            lng: -79.4,
        };
        store.add_to_index("locates", &[member]).await?;
        assert_eq!(store.tables().await.index_len("locates"), 1);

        store.delete_index("locates").await?;
        assert_eq!(store.tables().await.index_len("locates"), 0);
        Ok(())
    }
}
