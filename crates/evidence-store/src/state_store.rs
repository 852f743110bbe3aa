//! State store
//!
//! Single owner of the task-state cache. Reads share the lock; writes are
//! exclusive. The cache is derived data, so an unreadable file on disk is
//! logged and replaced rather than treated as fatal.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use evidence_core::{
    AutomationCapability, EngineConfig, EvidenceTaskState, LocalEvidenceState, Result, StateCache,
};
use tracing::{debug, warn};

use crate::fs::{read_json, write_json};

pub const STATE_FILE: &str = "evidence_state.json";

pub struct StateStore {
    path: PathBuf,
    cache: RwLock<StateCache>,
}

impl StateStore {
    /// Open the cache at `path`, starting empty when it is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = match read_json::<StateCache>(&path, "state cache") {
            Ok(cache) => cache,
            Err(err) if err.is_not_found() => StateCache::default(),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "discarding unreadable state cache");
                StateCache::default()
            }
        };
        debug!(path = %path.display(), tasks = cache.tasks.len(), "opened state cache");
        Self {
            path,
            cache: RwLock::new(cache),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::open(config.state_root().join(STATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, StateCache> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StateCache> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, task_ref: &str) -> Option<EvidenceTaskState> {
        self.read().get_task(task_ref).cloned()
    }

    /// Insert or replace; the local state is recomputed from the windows first.
    pub fn upsert(&self, state: EvidenceTaskState) {
        self.write().set_task(state);
    }

    /// Replace the whole cache with the result of a full scan.
    pub fn replace_all(&self, states: BTreeMap<String, EvidenceTaskState>) {
        let mut cache = self.write();
        cache.tasks.clear();
        for state in states.into_values() {
            cache.set_task(state);
        }
        cache.last_scan = Utc::now();
    }

    pub fn remove(&self, task_ref: &str) -> Option<EvidenceTaskState> {
        self.write().tasks.remove(task_ref)
    }

    pub fn len(&self) -> usize {
        self.read().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_scan(&self) -> DateTime<Utc> {
        self.read().last_scan
    }

    pub fn snapshot(&self) -> StateCache {
        self.read().clone()
    }

    pub fn tasks_by_state(&self, state: LocalEvidenceState) -> Vec<EvidenceTaskState> {
        self.read().tasks_by_state(state).into_iter().cloned().collect()
    }

    pub fn tasks_by_automation(&self, level: AutomationCapability) -> Vec<EvidenceTaskState> {
        self.read().tasks_by_automation(level).into_iter().cloned().collect()
    }

    pub fn state_summary(&self) -> HashMap<LocalEvidenceState, usize> {
        self.read().state_summary()
    }

    pub fn automation_summary(&self) -> HashMap<AutomationCapability, usize> {
        self.read().automation_summary()
    }

    /// Persist as pretty JSON. The snapshot is taken under the read lock and
    /// written after it is released.
    pub fn save(&self) -> Result<()> {
        let snapshot = self.snapshot();
        write_json(&self.path, &snapshot, "state cache")?;
        debug!(path = %self.path.display(), tasks = snapshot.tasks.len(), "saved state cache");
        Ok(())
    }
}
