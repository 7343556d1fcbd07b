//! Cache Configuration

use std::path::PathBuf;
use std::time::Duration;

/// Tier-1 default TTL: 5 minutes
pub const DEFAULT_MEMORY_TTL: Duration = Duration::from_millis(300_000);

/// Tier-2 default TTL: 1 hour
pub const DEFAULT_REMOTE_TTL: Duration = Duration::from_millis(3_600_000);

/// Tier-3 default TTL: 24 hours
pub const DEFAULT_DISK_TTL: Duration = Duration::from_millis(86_400_000);

/// Tiered cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Default TTL for the in-process tier
    pub memory_ttl: Duration,

    /// Default TTL for the remote shared store
    pub remote_ttl: Duration,

    /// Default TTL for on-disk records
    pub disk_ttl: Duration,

    /// Redis URL, or a bare `host:port`; `None` disables tier 2
    pub remote_endpoint: Option<String>,

    /// Directory for on-disk records; `None` disables tier 3
    pub disk_dir: Option<PathBuf>,

    /// Maximum tier-1 entries (0 = unbounded)
    pub memory_max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_ttl: DEFAULT_MEMORY_TTL,
            remote_ttl: DEFAULT_REMOTE_TTL,
            disk_ttl: DEFAULT_DISK_TTL,
            remote_endpoint: None,
            disk_dir: Some(PathBuf::from("./cache")),
            memory_max_entries: 0,
        }
    }
}

impl CacheConfig {
    pub fn with_memory_ttl(mut self, ttl: Duration) -> Self {
        self.memory_ttl = ttl;
        self
    }

    pub fn with_remote_ttl(mut self, ttl: Duration) -> Self {
        self.remote_ttl = ttl;
        self
    }

    pub fn with_disk_ttl(mut self, ttl: Duration) -> Self {
        self.disk_ttl = ttl;
        self
    }

    /// Enable tier 2 against the given Redis endpoint
    pub fn with_remote_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.remote_endpoint = Some(endpoint.into());
        self
    }

    pub fn with_disk_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.disk_dir = Some(dir.into());
        self
    }

    /// Disable tier 3
    pub fn without_disk(mut self) -> Self {
        self.disk_dir = None;
        self
    }

    pub fn with_memory_max_entries(mut self, max: usize) -> Self {
        self.memory_max_entries = max;
        self
    }

    /// Per-tier TTLs for a write; an explicit `ttl` overrides all three
    pub(crate) fn ttls(&self, ttl: Option<Duration>) -> (Duration, Duration, Duration) {
        match ttl {
            Some(t) => (t, t, t),
            None => (self.memory_ttl, self.remote_ttl, self.disk_ttl),
        }
    }
}
