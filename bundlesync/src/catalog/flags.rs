//! Persisted, profile-scoped download flags.
//!
//! The only flag today is "initial download completed". It is written after
//! a fully validated pass and lets later launches skip network work when the
//! catalog reports no update.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};

/// Persisted state for one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRecord {
    pub completed: bool,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Profile-scoped key-value store for download flags.
pub trait FlagStore: Send + Sync {
    /// Whether a validated download has completed for `profile`.
    fn initial_download_completed(&self, profile: &str) -> SyncResult<bool>;

    /// Record a validated download for `profile`.
    fn mark_initial_download_completed(&self, profile: &str) -> SyncResult<()>;

    /// Forget the flag for `profile`.
    fn clear(&self, profile: &str) -> SyncResult<()>;

    /// All stored records, ordered by profile name.
    fn records(&self) -> SyncResult<Vec<(String, FlagRecord)>>;
}

/// Flag store backed by a JSON file.
///
/// ```json
/// { "Deployment": { "completed": true, "completed_at": "2024-05-01T10:00:00Z" } }
/// ```
#[derive(Debug)]
pub struct JsonFlagStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFlagStore {
    /// Create a store at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records to rewrite. A file that no longer parses is replaced.
    fn read_for_update(&self) -> SyncResult<BTreeMap<String, FlagRecord>> {
        match self.read() {
            Err(SyncError::FlagStore { reason, .. }) => {
                warn!(
                    path = %self.path.display(),
                    reason = %reason,
                    "Discarding unreadable flag file"
                );
                Ok(BTreeMap::new())
            }
            other => other,
        }
    }

    fn read(&self) -> SyncResult<BTreeMap<String, FlagRecord>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| SyncError::ReadFailed {
            path: self.path.clone(),
            source: e,
        })?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| SyncError::FlagStore {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn write(&self, records: &BTreeMap<String, FlagRecord>) -> SyncResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| SyncError::CreateDirFailed {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let json = serde_json::to_string_pretty(records).map_err(|e| SyncError::FlagStore {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;

        // Replaced via rename, never written in place
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|e| SyncError::WriteFailed {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &self.path).map_err(|e| SyncError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })
    }
}

impl FlagStore for JsonFlagStore {
    fn initial_download_completed(&self, profile: &str) -> SyncResult<bool> {
        let _guard = self.lock.lock();
        Ok(self
            .read()?
            .get(profile)
            .map(|record| record.completed)
            .unwrap_or(false))
    }

    fn mark_initial_download_completed(&self, profile: &str) -> SyncResult<()> {
        let _guard = self.lock.lock();
        let mut records = self.read_for_update()?;
        records.insert(
            profile.to_string(),
            FlagRecord {
                completed: true,
                completed_at: Some(Utc::now()),
            },
        );
        self.write(&records)?;
        debug!(profile, path = %self.path.display(), "Marked initial download completed");
        Ok(())
    }

    fn clear(&self, profile: &str) -> SyncResult<()> {
        let _guard = self.lock.lock();
        let mut records = self.read_for_update()?;
        if records.remove(profile).is_some() {
            self.write(&records)?;
        }
        Ok(())
    }

    fn records(&self) -> SyncResult<Vec<(String, FlagRecord)>> {
        let _guard = self.lock.lock();
        Ok(self.read()?.into_iter().collect())
    }
}

/// In-memory flag store.
#[derive(Debug, Default)]
pub struct MemoryFlagStore {
    records: Mutex<BTreeMap<String, FlagRecord>>,
}

impl MemoryFlagStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store with `profile` already marked completed.
    pub fn completed(profile: &str) -> Self {
        let store = Self::new();
        store.records.lock().insert(
            profile.to_string(),
            FlagRecord {
                completed: true,
                completed_at: Some(Utc::now()),
            },
        );
        store
    }
}

impl FlagStore for MemoryFlagStore {
    fn initial_download_completed(&self, profile: &str) -> SyncResult<bool> {
        Ok(self
            .records
            .lock()
            .get(profile)
            .map(|r| r.completed)
            .unwrap_or(false))
    }

    fn mark_initial_download_completed(&self, profile: &str) -> SyncResult<()> {
        self.records.lock().insert(
            profile.to_string(),
            FlagRecord {
                completed: true,
                completed_at: Some(Utc::now()),
            },
        );
        Ok(())
    }

    fn clear(&self, profile: &str) -> SyncResult<()> {
        self.records.lock().remove(profile);
        Ok(())
    }

    fn records(&self) -> SyncResult<Vec<(String, FlagRecord)>> {
        Ok(self
            .records
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}
