//! Cache Statistics
//!
//! Hit, miss, promotion and swallowed-error counters.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::tier::Tier;

/// Live counters, updated with relaxed atomics
#[derive(Debug, Default)]
pub struct CacheStats {
    memory_hits: AtomicU64,
    remote_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    promotions: AtomicU64,
    remote_errors: AtomicU64,
    disk_errors: AtomicU64,
}

/// Point-in-time copy of [`CacheStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub memory_hits: u64,
    pub remote_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    /// Writes into faster tiers caused by slower-tier hits
    pub promotions: u64,
    pub remote_errors: u64,
    pub disk_errors: u64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self, tier: Tier) {
        let counter = match tier {
            Tier::Memory => &self.memory_hits,
            Tier::Remote => &self.remote_hits,
            Tier::Disk => &self.disk_hits,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_promotion(&self) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
    }

    /// Memory cannot fail, so only remote and disk errors are counted
    pub fn record_error(&self, tier: Tier) {
        match tier {
            Tier::Remote => self.remote_errors.fetch_add(1, Ordering::Relaxed),
            Tier::Disk => self.disk_errors.fetch_add(1, Ordering::Relaxed),
            Tier::Memory => 0,
        };
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            remote_hits: self.remote_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            remote_errors: self.remote_errors.load(Ordering::Relaxed),
            disk_errors: self.disk_errors.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    pub fn hits(&self) -> u64 {
        self.memory_hits + self.remote_hits + self.disk_hits
    }

    /// Fraction of lookups answered by any tier
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits() + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits() as f64 / total as f64
        }
    }
}
