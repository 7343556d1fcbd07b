//! tiercache - Multi-Tier Cache
//!
//! Memoizes expensive, idempotent computations behind three storage tiers:
//! in-process memory, a shared remote store, and durable on-disk records.
//! Each tier has its own TTL; reads promote hits into faster tiers and
//! writes fan out to all of them.
//!
//! Tier 2 is a Redis server, or a [`SharedStore`] when the caches sharing it
//! live in one process.

pub mod cache;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod stats;
pub mod tier;

pub use cache::TieredCache;
pub use clock::{Clock, ClockType, ManualClock, SystemClock};
pub use codec::{JsonCodec, ValueCodec};
pub use config::CacheConfig;
pub use error::{CodecError, TierError};
pub use stats::StatsSnapshot;
pub use tier::{RedisStore, RemoteStore, SharedStore, Tier, TierStatus};
