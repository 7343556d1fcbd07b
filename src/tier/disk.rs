//! Tier 3: durable on-disk records
//!
//! One file per key, `<dir>/<key>.json`, holding
//! `{"value": <stored JSON>, "expiry": <ms since epoch>}`.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, warn};

use crate::clock::ClockType;
use crate::error::{Result, TierError};

const RECORD_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Minimum age before `sweep` treats a temp file as abandoned
const TEMP_GRACE: Duration = Duration::from_secs(60);

/// On-disk record format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskRecord {
    pub value: Value,
    pub expiry: u64,
}

/// Outcome of a [`DiskTier::sweep`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Expired records deleted
    pub expired: usize,
    /// Unreadable or unparseable records deleted
    pub corrupt: usize,
    /// Live records left in place
    pub kept: usize,
    /// Abandoned temp files deleted
    pub temp_files: usize,
}

/// Tier-3 store
#[derive(Debug)]
pub struct DiskTier {
    dir: Option<PathBuf>,
    available: AtomicBool,
    next_write: AtomicU64,
    clock: ClockType,
}

impl DiskTier {
    pub fn new(dir: Option<PathBuf>, clock: ClockType) -> Self {
        Self {
            dir,
            available: AtomicBool::new(false),
            next_write: AtomicU64::new(0),
            clock,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.dir.is_some()
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Ensure the storage directory exists and mark the tier available
    pub async fn init(&self) -> Result<()> {
        if let Some(dir) = &self.dir {
            fs::create_dir_all(dir).await?;
            self.available.store(true, Ordering::Release);
        }
        Ok(())
    }

    fn path_for(&self, key: &str) -> Result<Option<PathBuf>> {
        if !self.is_available() {
            return Ok(None);
        }
        // The record suffix keeps "." and ".." from naming a directory
        if key.is_empty() || key.contains(|c: char| matches!(c, '/' | '\\' | '\0')) {
            return Err(TierError::InvalidKey(key.to_string()));
        }
        Ok(self
            .dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.{}", key, RECORD_EXTENSION))))
    }

    /// Stored JSON for `key`. An expired record is deleted and reads as a miss.
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        let Some(path) = self.path_for(key)? else {
            return Ok(None);
        };

        let data = match fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record: DiskRecord = serde_json::from_str(&data)?;

        if self.clock.has_expired(record.expiry) {
            debug!(key = %key, "Removing expired disk record");
            remove_if_present(&path).await?;
            return Ok(None);
        }
        Ok(Some(record.value))
    }

    pub async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let Some(path) = self.path_for(key)? else {
            return Ok(());
        };
        let record = DiskRecord {
            value,
            expiry: self.clock.expiry_after(ttl),
        };
        let data = serde_json::to_vec(&record)?;

        // Write then rename so readers never see a partial record. Each write
        // gets its own temp file; the last rename wins.
        let tmp = self.temp_path(&path);
        fs::write(&tmp, data).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    fn temp_path(&self, path: &Path) -> PathBuf {
        let seq = self.next_write.fetch_add(1, Ordering::Relaxed);
        let mut name = path.as_os_str().to_os_string();
        name.push(format!(".{}.{}.{}", std::process::id(), seq, TEMP_EXTENSION));
        PathBuf::from(name)
    }

    pub async fn remove(&self, key: &str) -> Result<bool> {
        match self.path_for(key)? {
            Some(path) => remove_if_present(&path).await,
            None => Ok(false),
        }
    }

    /// Delete every expired or unparseable record, and temp files left
    /// behind by interrupted writes
    pub async fn sweep(&self) -> Result<SweepReport> {
        let Some(dir) = self.dir.as_ref().filter(|_| self.is_available()) else {
            return Ok(SweepReport::default());
        };

        let mut records = Vec::new();
        let mut temps = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some(RECORD_EXTENSION) => records.push(path),
                Some(TEMP_EXTENSION) => temps.push(path),
                _ => {}
            }
        }

        let (outcomes, temp_outcomes) = tokio::join!(
            join_all(records.iter().map(|path| self.sweep_one(path))),
            join_all(temps.iter().map(|path| self.sweep_temp(path))),
        );

        let mut report = SweepReport::default();
        for (path, outcome) in records.iter().zip(outcomes) {
            match outcome {
                Ok(SweepOutcome::Expired) => report.expired += 1,
                Ok(SweepOutcome::Corrupt) => report.corrupt += 1,
                Ok(SweepOutcome::Kept) => report.kept += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to sweep cache file"),
            }
        }
        for (path, outcome) in temps.iter().zip(temp_outcomes) {
            match outcome {
                Ok(true) => report.temp_files += 1,
                Ok(false) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to sweep temp file"),
            }
        }
        Ok(report)
    }

    /// Temp files younger than [`TEMP_GRACE`] may belong to a write in flight
    async fn sweep_temp(&self, path: &Path) -> Result<bool> {
        let modified = match fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let age = modified.elapsed().unwrap_or_default();
        if age < TEMP_GRACE {
            return Ok(false);
        }
        debug!(path = %path.display(), "Removing abandoned temp file");
        remove_if_present(path).await
    }

    async fn sweep_one(&self, path: &Path) -> Result<SweepOutcome> {
        let record = match fs::read_to_string(path).await {
            Ok(data) => serde_json::from_str::<DiskRecord>(&data).ok(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SweepOutcome::Kept),
            Err(_) => None,
        };

        match record {
            Some(record) if !self.clock.has_expired(record.expiry) => Ok(SweepOutcome::Kept),
            Some(_) => {
                remove_if_present(path).await?;
                Ok(SweepOutcome::Expired)
            }
            None => {
                remove_if_present(path).await?;
                Ok(SweepOutcome::Corrupt)
            }
        }
    }
}

enum SweepOutcome {
    Expired,
    Corrupt,
    Kept,
}

async fn remove_if_present(path: &Path) -> Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
