//! Tiered Cache Engine
//!
//! Unified get/set/cleanup over three tiers. Reads check memory, remote and
//! disk in order and promote a hit into every faster tier. Writes fan out to
//! all tiers and wait for each to settle. Remote and disk failures are
//! logged, counted and treated as a miss or no-op; they never reach the
//! caller.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::{ClockType, SystemClock};
use crate::codec::{JsonCodec, ValueCodec};
use crate::config::CacheConfig;
use crate::error::{Result, TierError};
use crate::stats::{CacheStats, StatsSnapshot};
use crate::tier::{DiskTier, MemoryTier, RemoteStore, RemoteTier, Tier, TierStatus};

/// Memory → remote → disk cache for values of type `T`
pub struct TieredCache<T, C = JsonCodec<T>> {
    config: CacheConfig,
    codec: C,
    memory: MemoryTier<T>,
    remote: RemoteTier,
    disk: DiskTier,
    stats: CacheStats,
    initialized: Mutex<bool>,
}

impl<T> TieredCache<T, JsonCodec<T>>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Cache storing `T` as JSON in tiers 2 and 3
    pub fn new(config: CacheConfig) -> Self {
        Self::with_codec(config, JsonCodec::new())
    }
}

impl<T, C> TieredCache<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: ValueCodec<T>,
{
    pub fn with_codec(config: CacheConfig, codec: C) -> Self {
        let clock = SystemClock::shared();
        Self {
            memory: MemoryTier::new(clock.clone(), config.memory_max_entries),
            remote: RemoteTier::new(config.remote_endpoint.clone()),
            disk: DiskTier::new(config.disk_dir.clone(), clock),
            codec,
            config,
            stats: CacheStats::new(),
            initialized: Mutex::new(false),
        }
    }

    /// Replace the time source used for every expiry decision
    pub fn with_clock(mut self, clock: ClockType) -> Self {
        self.memory = MemoryTier::new(clock.clone(), self.config.memory_max_entries);
        self.disk = DiskTier::new(self.config.disk_dir.clone(), clock);
        self
    }

    /// Use an already-open store as tier 2 instead of dialing the endpoint
    pub fn with_remote_store<S: RemoteStore + 'static>(mut self, store: S) -> Self {
        self.remote = RemoteTier::with_store(Box::new(store));
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Connect tier 2 and prepare tier 3.
    ///
    /// Idempotent. A tier that fails to come up is left unavailable for the
    /// session and the cache runs without it.
    pub async fn init(&self) {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return;
        }

        if self.remote.is_configured() {
            if let Err(e) = self.remote.connect().await {
                warn!(endpoint = ?self.config.remote_endpoint, error = %e, "Remote tier unavailable, continuing without it");
            }
        }
        if self.disk.is_configured() {
            if let Err(e) = self.disk.init().await {
                warn!(dir = ?self.disk.dir(), error = %e, "Disk tier unavailable, continuing without it");
            }
        }

        *initialized = true;
        let remote_available = self.remote.is_available().await;
        info!(
            remote = remote_available,
            disk = self.disk.is_available(),
            "Tiered cache initialized"
        );
    }

    /// Look up `key`, probing faster tiers first. `None` means the caller
    /// must compute the value.
    pub async fn get(&self, key: &str) -> Option<T> {
        if let Some(value) = self.memory.get(key) {
            self.stats.record_hit(Tier::Memory);
            return Some(value);
        }

        match self.fetch_remote(key).await {
            Ok(Some(value)) => {
                self.memory.set(key, value.clone(), self.config.memory_ttl);
                self.stats.record_hit(Tier::Remote);
                self.stats.record_promotion();
                debug!(key = %key, "Remote hit promoted to memory");
                return Some(value);
            }
            Ok(None) => {}
            Err(e) => self.report(Tier::Remote, "get", key, &e),
        }

        match self.fetch_disk(key).await {
            Ok(Some(value)) => {
                self.memory.set(key, value.clone(), self.config.memory_ttl);
                if let Err(e) = self.write_remote(key, &value, self.config.remote_ttl).await {
                    self.report(Tier::Remote, "promote", key, &e);
                }
                self.stats.record_hit(Tier::Disk);
                self.stats.record_promotion();
                debug!(key = %key, "Disk hit promoted to memory and remote");
                return Some(value);
            }
            Ok(None) => {}
            Err(e) => self.report(Tier::Disk, "get", key, &e),
        }

        self.stats.record_miss();
        None
    }

    /// Write `value` to every tier. `ttl` overrides all three default TTLs.
    pub async fn set(&self, key: &str, value: T, ttl: Option<Duration>) {
        let (memory_ttl, remote_ttl, disk_ttl) = self.config.ttls(ttl);

        self.memory.set(key, value.clone(), memory_ttl);
        let (remote, disk) = tokio::join!(
            self.write_remote(key, &value, remote_ttl),
            self.write_disk(key, &value, disk_ttl),
        );

        if let Err(e) = remote {
            self.report(Tier::Remote, "set", key, &e);
        }
        if let Err(e) = disk {
            self.report(Tier::Disk, "set", key, &e);
        }
    }

    /// Return the cached value, or compute, cache and return it.
    ///
    /// A failed computation is returned as-is and nothing is cached.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &str, compute: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }
        let value = compute().await?;
        self.set(key, value.clone(), None).await;
        Ok(value)
    }

    /// Delete `key` from every tier; true if any tier held it
    pub async fn remove(&self, key: &str) -> bool {
        let in_memory = self.memory.remove(key);
        let (remote, disk) = tokio::join!(self.remote.delete(key), self.disk.remove(key));

        let mut removed = in_memory;
        match remote {
            Ok(r) => removed |= r,
            Err(e) => self.report(Tier::Remote, "remove", key, &e),
        }
        match disk {
            Ok(r) => removed |= r,
            Err(e) => self.report(Tier::Disk, "remove", key, &e),
        }
        removed
    }

    /// Clear memory, close the remote connection and sweep expired disk
    /// records. A later [`init`](Self::init) reconnects.
    pub async fn cleanup(&self) {
        let mut initialized = self.initialized.lock().await;

        self.memory.clear();

        if let Err(e) = self.remote.close().await {
            self.stats.record_error(Tier::Remote);
            warn!(error = %e, "Failed to close remote tier");
        }

        match self.disk.sweep().await {
            Ok(report) => info!(
                expired = report.expired,
                corrupt = report.corrupt,
                kept = report.kept,
                "Disk tier swept"
            ),
            Err(e) => {
                self.stats.record_error(Tier::Disk);
                warn!(error = %e, "Disk tier sweep failed");
            }
        }

        *initialized = false;
    }

    /// Tier-1 value and its absolute expiry (ms), without touching other tiers
    pub fn peek_memory(&self, key: &str) -> Option<(T, u64)> {
        self.memory.peek(key)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub async fn tier_status(&self) -> TierStatus {
        TierStatus {
            remote_configured: self.remote.is_configured(),
            remote_available: self.remote.is_available().await,
            disk_configured: self.disk.is_configured(),
            disk_available: self.disk.is_available(),
        }
    }

    async fn fetch_remote(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.remote.get(key).await? else {
            return Ok(None);
        };
        let stored: Value = serde_json::from_str(&raw)?;
        Ok(Some(self.codec.decode(stored)?))
    }

    async fn fetch_disk(&self, key: &str) -> Result<Option<T>> {
        let Some(stored) = self.disk.get(key).await? else {
            return Ok(None);
        };
        Ok(Some(self.codec.decode(stored)?))
    }

    async fn write_remote(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let stored = self.codec.encode(value)?;
        self.remote.set(key, &stored.to_string(), ttl).await
    }

    async fn write_disk(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        let stored = self.codec.encode(value)?;
        self.disk.set(key, stored, ttl).await
    }

    fn report(&self, tier: Tier, op: &str, key: &str, error: &TierError) {
        self.stats.record_error(tier);
        warn!(tier = %tier, op, key = %key, error = %error, "Cache tier operation failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{DEFAULT_DISK_TTL, DEFAULT_MEMORY_TTL, DEFAULT_REMOTE_TTL};
    use crate::error::CodecError;
    use crate::tier::{DiskRecord, SharedStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::{tempdir, TempDir};

    const START_MS: u64 = 1_700_000_000_000;

    struct Fixture {
        cache: TieredCache<Value>,
        clock: ManualClock,
        remote: SharedStore,
        dir: TempDir,
    }

    async fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let clock = ManualClock::new(START_MS);
        let remote = SharedStore::with_clock(clock.shared());
        let cache = TieredCache::new(CacheConfig::default().with_disk_dir(dir.path()))
            .with_clock(clock.shared())
            .with_remote_store(remote.clone());
        cache.init().await;
        Fixture {
            cache,
            clock,
            remote,
            dir,
        }
    }

    fn write_record(dir: &Path, key: &str, value: Value, expiry: u64) {
        let record = DiskRecord { value, expiry };
        std::fs::write(
            dir.join(format!("{}.json", key)),
            serde_json::to_string(&record).unwrap(),
        )
        .unwrap();
    }

    fn remote_raw(store: &SharedStore, key: &str) -> Option<String> {
        store.get(key)
    }

    /// Remote store whose every call fails
    struct BrokenStore;

    #[async_trait]
    impl RemoteStore for BrokenStore {
        async fn get_value(&mut self, _key: &str) -> Result<Option<String>> {
            Err(TierError::ConnectionClosed)
        }

        async fn set_value(&mut self, _key: &str, _value: &str, _ttl: Duration) -> Result<()> {
            Err(TierError::ConnectionClosed)
        }

        async fn delete(&mut self, _key: &str) -> Result<bool> {
            Err(TierError::ConnectionClosed)
        }
    }

    #[tokio::test]
    async fn test_read_after_write_then_expiry() {
        let f = fixture().await;

        f.cache
            .set("q1", json!({"data": 1}), Some(Duration::from_millis(1000)))
            .await;
        assert_eq!(f.cache.get("q1").await, Some(json!({"data": 1})));

        f.clock.advance(Duration::from_millis(1001));
        assert_eq!(f.cache.get("q1").await, None);
        assert_eq!(f.cache.get("q1").await, None);
        assert!(!f.dir.path().join("q1.json").exists());
    }

    #[tokio::test]
    async fn test_set_writes_every_tier() {
        let f = fixture().await;

        f.cache.set("q2", json!([1, 2, 3]), None).await;

        let (_, memory_expiry) = f.cache.peek_memory("q2").unwrap();
        assert_eq!(memory_expiry, START_MS + DEFAULT_MEMORY_TTL.as_millis() as u64);
        assert_eq!(remote_raw(&f.remote, "q2").as_deref(), Some("[1,2,3]"));

        let raw = std::fs::read_to_string(f.dir.path().join("q2.json")).unwrap();
        let record: DiskRecord = serde_json::from_str(&raw).unwrap();
        assert_eq!(record.value, json!([1, 2, 3]));
        assert_eq!(record.expiry, START_MS + DEFAULT_DISK_TTL.as_millis() as u64);
    }

    #[tokio::test]
    async fn test_disk_hit_promotes_to_memory_and_remote() {
        let f = fixture().await;
        write_record(f.dir.path(), "only-disk", json!({"intent": "fees"}), START_MS + 50_000);

        assert_eq!(f.cache.get("only-disk").await, Some(json!({"intent": "fees"})));

        let (value, expiry) = f.cache.peek_memory("only-disk").unwrap();
        assert_eq!(value, json!({"intent": "fees"}));
        assert_eq!(expiry, START_MS + DEFAULT_MEMORY_TTL.as_millis() as u64);
        assert_eq!(
            remote_raw(&f.remote, "only-disk").as_deref(),
            Some(r#"{"intent":"fees"}"#)
        );

        let stats = f.cache.stats();
        assert_eq!(stats.disk_hits, 1);
        assert_eq!(stats.promotions, 1);
    }

    #[tokio::test]
    async fn test_remote_hit_promotes_to_memory_only() {
        let f = fixture().await;
        f.remote
            .set("shared", r#"{"data":2}"#, Duration::from_millis(10_000));

        assert_eq!(f.cache.get("shared").await, Some(json!({"data": 2})));
        let (_, expiry) = f.cache.peek_memory("shared").unwrap();
        assert_eq!(expiry, START_MS + DEFAULT_MEMORY_TTL.as_millis() as u64);
        assert!(!f.dir.path().join("shared.json").exists());
        assert_eq!(f.cache.stats().remote_hits, 1);
    }

    #[tokio::test]
    async fn test_default_ttls_fall_through_tiers() {
        let f = fixture().await;
        f.cache.set("k", json!("v"), None).await;

        f.clock.advance(DEFAULT_MEMORY_TTL);
        assert_eq!(f.cache.get("k").await, Some(json!("v")));
        assert_eq!(f.cache.stats().remote_hits, 1);

        f.clock.advance(DEFAULT_REMOTE_TTL);
        assert_eq!(f.cache.get("k").await, Some(json!("v")));
        assert_eq!(f.cache.stats().disk_hits, 1);

        f.clock.advance(DEFAULT_DISK_TTL);
        assert_eq!(f.cache.get("k").await, None);
        assert_eq!(f.cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_stale_disk_record_is_removed() {
        let f = fixture().await;
        write_record(f.dir.path(), "stale", json!(1), START_MS - 1);

        assert_eq!(f.cache.get("stale").await, None);
        assert!(!f.dir.path().join("stale.json").exists());
        assert!(f.cache.peek_memory("stale").is_none());
    }

    #[tokio::test]
    async fn test_cleanup_sweeps_only_expired_records() {
        let f = fixture().await;
        write_record(f.dir.path(), "expired", json!(1), START_MS - 10);
        write_record(f.dir.path(), "valid", json!(2), START_MS + 60_000);
        f.cache.set("in-memory", json!(3), None).await;

        f.cache.cleanup().await;

        assert!(!f.dir.path().join("expired.json").exists());
        assert!(f.dir.path().join("valid.json").exists());
        assert!(f.cache.peek_memory("in-memory").is_none());
        assert!(!f.cache.tier_status().await.remote_available);
        assert_eq!(f.cache.get("valid").await, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_repeated_set_only_refreshes_expiry() {
        let f = fixture().await;
        f.cache.set("k", json!({"a": 1}), None).await;
        f.clock.advance(Duration::from_millis(100));
        f.cache.set("k", json!({"a": 1}), None).await;

        let (value, expiry) = f.cache.peek_memory("k").unwrap();
        assert_eq!(value, json!({"a": 1}));
        assert_eq!(expiry, START_MS + 100 + DEFAULT_MEMORY_TTL.as_millis() as u64);
        assert_eq!(f.cache.get("k").await, Some(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_degraded_tiers_fall_back_to_memory() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let dead_addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let clock = ManualClock::new(START_MS);
        let cache: TieredCache<Value> = TieredCache::new(
            CacheConfig::default()
                .with_remote_endpoint(dead_addr)
                .with_disk_dir(blocker.join("cache")),
        )
        .with_clock(clock.shared());
        cache.init().await;

        let status = cache.tier_status().await;
        assert!(status.remote_configured && !status.remote_available);
        assert!(status.disk_configured && !status.disk_available);

        cache
            .set("q1", json!({"data": 1}), Some(Duration::from_millis(1000)))
            .await;
        assert_eq!(cache.get("q1").await, Some(json!({"data": 1})));

        clock.advance(Duration::from_millis(1001));
        assert_eq!(cache.get("q1").await, None);
    }

    #[tokio::test]
    async fn test_failing_remote_is_swallowed() {
        let dir = tempdir().unwrap();
        let cache: TieredCache<Value> =
            TieredCache::new(CacheConfig::default().with_disk_dir(dir.path()))
                .with_remote_store(BrokenStore);
        cache.init().await;

        cache.set("k", json!(1), None).await;
        assert_eq!(cache.stats().remote_errors, 1);

        // Memory hit never reaches the remote tier
        assert_eq!(cache.get("k").await, Some(json!(1)));
        assert_eq!(cache.stats().remote_errors, 1);

        cache.cleanup().await;
        cache.init().await;
        assert_eq!(cache.get("k").await, Some(json!(1)));
        assert_eq!(cache.stats().disk_hits, 1);
    }

    #[tokio::test]
    async fn test_get_or_compute_runs_once() {
        let f = fixture().await;
        let counter = AtomicUsize::new(0);
        let calls = &counter;

        for _ in 0..2 {
            let value = f
                .cache
                .get_or_compute("analysis", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::io::Error>(json!({"tokens": 4}))
                })
                .await
                .unwrap();
            assert_eq!(value, json!({"tokens": 4}));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_compute_error_is_not_cached() {
        let f = fixture().await;

        let result = f
            .cache
            .get_or_compute("broken", || async { Err::<Value, _>("nlp failed") })
            .await;
        assert_eq!(result, Err("nlp failed"));
        assert_eq!(f.cache.get("broken").await, None);
    }

    #[tokio::test]
    async fn test_remove_clears_all_tiers() {
        let f = fixture().await;
        f.cache.set("k", json!(1), None).await;

        assert!(f.cache.remove("k").await);
        assert!(f.cache.peek_memory("k").is_none());
        assert!(remote_raw(&f.remote, "k").is_none());
        assert!(!f.dir.path().join("k.json").exists());
        assert!(!f.cache.remove("k").await);
    }

    #[tokio::test]
    async fn test_unsafe_key_skips_disk_only() {
        let f = fixture().await;
        f.cache.set("a/b", json!(1), None).await;

        assert_eq!(f.cache.stats().disk_errors, 1);
        assert_eq!(f.cache.get("a/b").await, Some(json!(1)));
        assert_eq!(remote_raw(&f.remote, "a/b").as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_trailing_ellipsis_key_reaches_disk() {
        let f = fixture().await;
        f.cache.set("what are the fees...", json!({"intent": "fees"}), None).await;

        assert_eq!(f.cache.stats().disk_errors, 0);
        assert!(f.dir.path().join("what are the fees....json").exists());
    }

    /// Codec that refuses to encode
    struct RejectingCodec;

    impl ValueCodec<u32> for RejectingCodec {
        fn encode(&self, _value: &u32) -> std::result::Result<Value, CodecError> {
            Err(CodecError::Custom("not serializable".into()))
        }

        fn decode(&self, stored: Value) -> std::result::Result<u32, CodecError> {
            Ok(serde_json::from_value(stored)?)
        }
    }

    #[tokio::test]
    async fn test_encode_failure_only_fails_slow_tiers() {
        let dir = tempdir().unwrap();
        let cache: TieredCache<u32, RejectingCodec> = TieredCache::with_codec(
            CacheConfig::default().with_disk_dir(dir.path()),
            RejectingCodec,
        )
        .with_remote_store(SharedStore::new());
        cache.init().await;

        cache.set("n", 7, None).await;

        assert_eq!(cache.get("n").await, Some(7));
        let stats = cache.stats();
        assert_eq!(stats.remote_errors, 1);
        assert_eq!(stats.disk_errors, 1);
        assert!(!dir.path().join("n.json").exists());
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let f = fixture().await;
        f.cache.set("k", json!(1), None).await;
        f.cache.init().await;

        assert_eq!(f.cache.get("k").await, Some(json!(1)));
        let status = f.cache.tier_status().await;
        assert!(status.remote_available && status.disk_available);
    }
}
