//! Tier 1: in-process memory
//!
//! Instance-owned map from key to (value, expiry). Cannot fail; a lookup is
//! either a live hit, an expired entry (evicted on read) or absent.

use hashbrown::HashMap;
use parking_lot::Mutex;
use std::time::Duration;

use crate::clock::ClockType;

#[derive(Debug, Clone)]
struct MemoryEntry<T> {
    value: T,
    expiry_ms: u64,
}

/// Tier-1 store
#[derive(Debug)]
pub struct MemoryTier<T> {
    entries: Mutex<HashMap<String, MemoryEntry<T>>>,
    clock: ClockType,
    max_entries: usize,
}

impl<T: Clone> MemoryTier<T> {
    /// Create an empty tier; `max_entries == 0` means unbounded
    pub fn new(clock: ClockType, max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            max_entries,
        }
    }

    /// Live value for `key`. An expired entry is removed and reported absent.
    pub fn get(&self, key: &str) -> Option<T> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if !self.clock.has_expired(entry.expiry_ms) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Live value together with its absolute expiry in ms
    pub fn peek(&self, key: &str) -> Option<(T, u64)> {
        let entries = self.entries.lock();
        entries
            .get(key)
            .filter(|e| !self.clock.has_expired(e.expiry_ms))
            .map(|e| (e.value.clone(), e.expiry_ms))
    }

    pub fn set(&self, key: &str, value: T, ttl: Duration) {
        let expiry_ms = self.clock.expiry_after(ttl);
        let mut entries = self.entries.lock();

        if self.max_entries > 0
            && !entries.contains_key(key)
            && entries.len() >= self.max_entries
        {
            let now = self.clock.now_millis();
            entries.retain(|_, e| now < e.expiry_ms);

            if entries.len() >= self.max_entries {
                let victim = entries
                    .iter()
                    .min_by_key(|(_, e)| e.expiry_ms)
                    .map(|(k, _)| k.clone());
                if let Some(victim) = victim {
                    entries.remove(&victim);
                }
            }
        }

        entries.insert(key.to_string(), MemoryEntry { value, expiry_ms });
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Number of stored entries (including expired ones not yet evicted)
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
