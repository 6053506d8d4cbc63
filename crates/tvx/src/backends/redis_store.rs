use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Cmd, Pipeline};
use serde::Deserialize;
use tracing::{debug, info};

use crate::backends::PositionStore;
use crate::common::{GeoMember, PositionEntry};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    /// 📡 `redis://host:6379`. Required when the position store is redis.
    #[serde(default)]
    pub url: String,
}

/// 🧲 The key/geo destination: one multiplexed, self-reconnecting connection.
///
/// `ConnectionManager` is cheap to clone and every clone shares the same socket,
/// so each call clones it instead of fighting over a `&mut`.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // 🔧 ConnectionManager keeps its thoughts to itself
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// 🚀 Open the client, get a connection manager, and PING once so a bad URL fails at startup.
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())
            .context("💀 redis.url is not a Redis URL. It might be a wish.")?;
        let mut conn = client
            .get_connection_manager()
            .await
            .context("💀 Could not connect to Redis. The mayflies have nowhere to live.")?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .context("💀 Redis accepted the connection and then ignored our PING")?;

        info!("🧲 Redis connection ready");
        Ok(Self { conn })
    }
}

/// 📦 One `SET key blob EX ttl` per entry, all in a single pipeline.
pub(crate) fn positions_pipeline(entries: &[PositionEntry], ttl: Duration) -> Result<Pipeline> {
    let mut pipe = redis::pipe();
    for entry in entries {
        let blob = serde_json::to_string(&entry.position)
            .context("💀 a position refused to become JSON")?;
        pipe.cmd("SET")
            .arg(&entry.key)
            .arg(blob)
            .arg("EX")
            .arg(ttl.as_secs())
            .ignore();
    }
    Ok(pipe)
}

pub(crate) fn delete_index_command(index_key: &str) -> Cmd {
    let mut cmd = redis::cmd("DEL");
    cmd.arg(index_key);
    cmd
}

/// 🗺️ `GEOADD key lng lat name [lng lat name ...]`. Longitude first, always.
pub(crate) fn geoadd_command(index_key: &str, members: &[GeoMember]) -> Cmd {
    let mut cmd = redis::cmd("GEOADD");
    cmd.arg(index_key);
    for member in members {
        cmd.arg(member.lng).arg(member.lat).arg(&member.name);
    }
    cmd
}

#[async_trait]
impl PositionStore for RedisStore {
    async fn put_positions(&self, entries: &[PositionEntry], ttl: Duration) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let pipe = positions_pipeline(entries, ttl)?;
        let mut conn = self.conn.clone();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .context("💀 The position pipeline didn't make it through Redis")?;
        debug!("🧲 wrote {} position keys", entries.len());
        Ok(())
    }

    async fn delete_index(&self, index_key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = delete_index_command(index_key)
            .query_async(&mut conn)
            .await
            .with_context(|| format!("💀 DEL {index_key} failed"))?;
        Ok(())
    }

    async fn add_to_index(&self, index_key: &str, members: &[GeoMember]) -> Result<()> {
        let mut conn = self.conn.clone();
        let added: i64 = geoadd_command(index_key, members)
            .query_async(&mut conn)
            .await
            .with_context(|| format!("💀 GEOADD {index_key} failed"))?;
        debug!("🗺️ GEOADD {} added {} members", index_key, added);
        Ok(())
    }
}
