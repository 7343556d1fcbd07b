//! Redis-backed tier 2

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

use super::RemoteStore;
use crate::clock::duration_millis;
use crate::error::Result;

/// Reconnect attempts after a dropped connection
const RECONNECT_RETRIES: usize = 1;

/// Redis connection shared by every clone of the manager
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to `endpoint`. A bare `host:port` is treated as `redis://host:port`.
    pub async fn connect(endpoint: &str) -> Result<Self> {
        let url = redis_url(endpoint);
        let client = redis::Client::open(url.as_str())?;
        let mut conn = ConnectionManager::new_with_backoff(client, 2, 100, RECONNECT_RETRIES).await?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!(url = %url, "Redis answered PING");
        Ok(Self { conn })
    }
}

pub(crate) fn redis_url(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("redis://{}", endpoint)
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get_value(&mut self, key: &str) -> Result<Option<String>> {
        let value: Option<String> = self.conn.get(key).await?;
        Ok(value)
    }

    /// `SET key value PX ttl`; PX rejects 0, so the floor is 1 ms
    async fn set_value(&mut self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(duration_millis(ttl).max(1))
            .query_async(&mut self.conn)
            .await?;
        Ok(())
    }

    async fn delete(&mut self, key: &str) -> Result<bool> {
        let removed: i64 = self.conn.del(key).await?;
        Ok(removed > 0)
    }
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}
