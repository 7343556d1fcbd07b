//! In-process tier 2
//!
//! A TTL map that several caches in one process can share. Clones see the
//! same data, and expiry is read through the injected clock.

use async_trait::async_trait;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

use super::RemoteStore;
use crate::clock::{ClockType, SystemClock};
use crate::error::Result;

#[derive(Debug, Clone)]
struct SharedEntry {
    value: String,
    expires_at_ms: u64,
}

/// Shared string store with per-key millisecond expiry
#[derive(Debug, Clone)]
pub struct SharedStore {
    inner: Arc<RwLock<HashMap<String, SharedEntry>>>,
    clock: ClockType,
}

impl Default for SharedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedStore {
    pub fn new() -> Self {
        Self::with_clock(SystemClock::shared())
    }

    pub fn with_clock(clock: ClockType) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Live value for `key`
    pub fn get(&self, key: &str) -> Option<String> {
        let map = self.inner.read();
        map.get(key)
            .filter(|entry| !self.clock.has_expired(entry.expires_at_ms))
            .map(|entry| entry.value.clone())
    }

    pub fn set(&self, key: &str, value: &str, ttl: Duration) {
        let entry = SharedEntry {
            value: value.to_string(),
            expires_at_ms: self.clock.expiry_after(ttl),
        };
        self.inner.write().insert(key.to_string(), entry);
    }

    /// True if a live key was removed
    pub fn del(&self, key: &str) -> bool {
        match self.inner.write().remove(key) {
            Some(entry) => !self.clock.has_expired(entry.expires_at_ms),
            None => false,
        }
    }

    /// Number of keys, expired ones included until purged
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired keys, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let mut map = self.inner.write();
        let before = map.len();
        map.retain(|_, entry| now < entry.expires_at_ms);
        before - map.len()
    }
}

#[async_trait]
impl RemoteStore for SharedStore {
    async fn get_value(&mut self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    async fn set_value(&mut self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.set(key, value, ttl);
        Ok(())
    }

    async fn delete(&mut self, key: &str) -> Result<bool> {
        Ok(self.del(key))
    }
}
