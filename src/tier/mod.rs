//! Cache Tiers
//!
//! Storage backends ordered by ascending latency and durability:
//! memory (tier 1), shared remote store (tier 2), disk (tier 3).
//! Tier 2 is Redis, or a [`SharedStore`] for caches in one process.

mod disk;
mod memory;
mod redis_store;
mod remote;
mod shared;

pub use disk::{DiskRecord, DiskTier, SweepReport};
pub use memory::MemoryTier;
pub use redis_store::RedisStore;
pub use remote::{RemoteStore, RemoteTier};
pub use shared::SharedStore;

/// Tier identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Memory,
    Remote,
    Disk,
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tier::Memory => write!(f, "memory"),
            Tier::Remote => write!(f, "remote"),
            Tier::Disk => write!(f, "disk"),
        }
    }
}

/// Configured vs available state of the fallible tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierStatus {
    pub remote_configured: bool,
    pub remote_available: bool,
    pub disk_configured: bool,
    pub disk_available: bool,
}
