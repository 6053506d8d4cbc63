//! 🔌 Backends: where the real I/O happens.
//!
//! 🚰 The transit API pours data in. Postgres and Redis slurp it up.
//! And in between, we panic! (kidding, we use anyhow)
//!
//! 🎭 This module is the casting agency:
//! - [`TransitApi`]: the one and only source, a reqwest client with an API key.
//! - [`RecordStore`]: the durable destination (trips and stations history).
//! - [`PositionStore`]: the fast destination (where is bus 7131 *right now*?).
//!
//! Each store is trait → concrete impls → backend enum, so the pipelines never
//! need to know whether they're talking to a real cluster or a `BTreeMap` in a test.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::app_config::{AppConfig, PositionStoreKind, RecordStoreKind};
use crate::common::{GeoMember, PositionEntry};
use crate::persister::{BatchOutcome, UpsertBatch};

pub(crate) mod in_mem;
pub(crate) mod postgres;
pub(crate) mod redis_store;
pub(crate) mod transit_api;

pub use in_mem::{InMemoryPositionStore, InMemoryRecordStore, PositionTables, RecordTables};
pub use postgres::{PostgresConfig, PostgresStore};
pub use redis_store::{RedisConfig, RedisStore};
pub use transit_api::{TransitApi, TransitApiConfig};

// ===== Record store: the relational destination =====

/// 🐘 A store that takes one batch of upserts and reports how each row went.
///
/// # Contract 📜
/// - One call == one batch. Rows are applied in submission order.
/// - A failing row is counted, never fatal to its siblings. No cross-row atomicity.
/// - `Err` means the batch couldn't be sent at all (no connection, pool closed).
#[async_trait]
pub trait RecordStore: std::fmt::Debug + Send + Sync {
    async fn execute(&self, batch: UpsertBatch) -> Result<BatchOutcome>;
}

/// 🎭 The many faces of a RecordStore.
#[derive(Debug)]
pub enum RecordStoreBackend {
    Postgres(PostgresStore),
    InMemory(InMemoryRecordStore),
}

#[async_trait]
impl RecordStore for RecordStoreBackend {
    async fn execute(&self, batch: UpsertBatch) -> Result<BatchOutcome> {
        match self {
            RecordStoreBackend::Postgres(store) => store.execute(batch).await,
            RecordStoreBackend::InMemory(store) => store.execute(batch).await,
        }
    }
}

// ===== Position store: the key/geo destination =====

/// 🧲 A store for per-trip position blobs and a geospatial index of live trips.
///
/// # Contract 📜
/// - `put_positions` writes every entry under its own key with `ttl`.
/// - `delete_index` removes the whole index key.
/// - `add_to_index` adds members (name, lat, lng) to the index.
/// - The three are independent: callers decide the order and isolate the failures.
#[async_trait]
pub trait PositionStore: std::fmt::Debug + Send + Sync {
    async fn put_positions(&self, entries: &[PositionEntry], ttl: Duration) -> Result<()>;
    async fn delete_index(&self, index_key: &str) -> Result<()>;
    async fn add_to_index(&self, index_key: &str, members: &[GeoMember]) -> Result<()>;
}

/// 🎭 The many faces of a PositionStore.
#[derive(Debug)]
pub enum PositionStoreBackend {
    Redis(RedisStore),
    InMemory(InMemoryPositionStore),
}

#[async_trait]
impl PositionStore for PositionStoreBackend {
    async fn put_positions(&self, entries: &[PositionEntry], ttl: Duration) -> Result<()> {
        match self {
            PositionStoreBackend::Redis(store) => store.put_positions(entries, ttl).await,
            PositionStoreBackend::InMemory(store) => store.put_positions(entries, ttl).await,
        }
    }

    async fn delete_index(&self, index_key: &str) -> Result<()> {
        match self {
            PositionStoreBackend::Redis(store) => store.delete_index(index_key).await,
            PositionStoreBackend::InMemory(store) => store.delete_index(index_key).await,
        }
    }

    async fn add_to_index(&self, index_key: &str, members: &[GeoMember]) -> Result<()> {
        match self {
            PositionStoreBackend::Redis(store) => store.add_to_index(index_key, members).await,
            PositionStoreBackend::InMemory(store) => store.add_to_index(index_key, members).await,
        }
    }
}

// ===== Stores: the explicitly constructed handle bundle =====

/// 📦 Both destinations, constructed once by `main` and passed by reference into every run.
///
/// No global singletons here. Whoever builds a `Stores` owns it, and calls
/// [`Stores::close`] on the way out.
#[derive(Debug)]
pub struct Stores {
    pub records: RecordStoreBackend,
    pub positions: PositionStoreBackend,
}

impl Stores {
    /// 🚀 Connect whichever backends the config asks for.
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let records = match config.stores.record_store {
            RecordStoreKind::Postgres => {
                RecordStoreBackend::Postgres(PostgresStore::connect(&config.postgres).await?)
            }
            RecordStoreKind::InMemory => {
                info!("🧪 Record store is in-memory: nothing will reach Postgres this session");
                RecordStoreBackend::InMemory(InMemoryRecordStore::new())
            }
        };

        let positions = match config.stores.position_store {
            PositionStoreKind::Redis => {
                PositionStoreBackend::Redis(RedisStore::connect(&config.redis).await?)
            }
            PositionStoreKind::InMemory => {
                info!("🧪 Position store is in-memory: nothing will reach Redis this session");
                PositionStoreBackend::InMemory(InMemoryPositionStore::new())
            }
        };

        Ok(Self { records, positions })
    }

    /// 🗑️ The shutdown hook. Drains the Postgres pool; Redis connections drop with `self`.
    pub async fn close(&self) {
        if let RecordStoreBackend::Postgres(store) = &self.records {
            store.close().await;
        }
        info!("🗑️ Stores closed: the elephant has left the building");
    }
}
