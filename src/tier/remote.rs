//! Tier 2: shared remote store
//!
//! String-keyed get/set with a millisecond expiry. Values are JSON strings.
//! The tier is "configured" when an endpoint is set and "available" once a
//! connection is held. Endpoints are Redis URLs.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

use super::RedisStore;
use crate::error::Result;

/// Connection to a shared key/value store
#[async_trait]
pub trait RemoteStore: Send {
    /// Fetch the stored string, `None` if absent or expired
    async fn get_value(&mut self, key: &str) -> Result<Option<String>>;

    /// Store `value` with a millisecond-precision expiry
    async fn set_value(&mut self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    async fn delete(&mut self, key: &str) -> Result<bool>;

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Tier-2 wrapper around an optional live connection
pub struct RemoteTier {
    endpoint: Option<String>,
    configured: bool,
    conn: Mutex<Option<Box<dyn RemoteStore>>>,
}

impl RemoteTier {
    /// Tier that dials `endpoint` on [`connect`](Self::connect)
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            configured: endpoint.is_some(),
            endpoint,
            conn: Mutex::new(None),
        }
    }

    /// Tier backed by an already-open store
    pub fn with_store(store: Box<dyn RemoteStore>) -> Self {
        Self {
            endpoint: None,
            configured: true,
            conn: Mutex::new(Some(store)),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.configured
    }

    pub async fn is_available(&self) -> bool {
        self.conn.lock().await.is_some()
    }

    /// Open the connection unless one is held or no endpoint is configured
    pub async fn connect(&self) -> Result<()> {
        let mut conn = self.conn.lock().await;
        if conn.is_some() {
            return Ok(());
        }
        if let Some(endpoint) = &self.endpoint {
            let store = RedisStore::connect(endpoint).await?;
            info!(endpoint = %endpoint, "Remote tier connected");
            *conn = Some(Box::new(store));
        }
        Ok(())
    }

    /// Unavailable tier reads as a miss
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        match self.conn.lock().await.as_mut() {
            Some(store) => store.get_value(key).await,
            None => Ok(None),
        }
    }

    /// Unavailable tier makes this a no-op
    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        match self.conn.lock().await.as_mut() {
            Some(store) => store.set_value(key, value, ttl).await,
            None => Ok(()),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<bool> {
        match self.conn.lock().await.as_mut() {
            Some(store) => store.delete(key).await,
            None => Ok(false),
        }
    }

    /// Drop the connection; the tier is unavailable until the next `connect`
    pub async fn close(&self) -> Result<()> {
        let store = self.conn.lock().await.take();
        match store {
            Some(mut store) => store.close().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for RemoteTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteTier")
            .field("endpoint", &self.endpoint)
            .field("configured", &self.configured)
            .finish_non_exhaustive()
    }
}
