//! Clock
//!
//! Time source for expiry calculations. Every tier reads time through a
//! [`Clock`] so tests can move time forward without sleeping.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Shared handle to a clock
pub type ClockType = Arc<dyn Clock>;

/// Whole milliseconds in `d`, saturating at `u64::MAX`
pub fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Source of wall-clock time in milliseconds since the Unix epoch
pub trait Clock: Send + Sync + std::fmt::Debug {
    fn now_millis(&self) -> u64;

    /// Absolute expiry for an entry written now with the given TTL
    fn expiry_after(&self, ttl: Duration) -> u64 {
        self.now_millis().saturating_add(duration_millis(ttl))
    }

    /// An entry is visible iff `now < expiry`
    fn has_expired(&self, expiry_ms: u64) -> bool {
        self.now_millis() >= expiry_ms
    }
}

/// Clock backed by the system wall clock
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        SystemClock
    }

    pub fn shared() -> ClockType {
        Arc::new(SystemClock)
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Manually driven clock.
///
/// Clones share the same instant, so a clock handed to a cache can be
/// advanced from the outside.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now_ms: Arc<Mutex<u64>>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(Mutex::new(start_ms)),
        }
    }

    /// Start at the current system time
    pub fn starting_now() -> Self {
        Self::new(SystemClock.now_millis())
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now_ms.lock();
        *now = now.saturating_add(duration_millis(by));
    }

    pub fn set(&self, now_ms: u64) {
        *self.now_ms.lock() = now_ms;
    }

    pub fn shared(&self) -> ClockType {
        Arc::new(self.clone())
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        *self.now_ms.lock()
    }
}
