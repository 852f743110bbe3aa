//! Resolution of task and window directories under the data root

use std::path::{Component, Path, PathBuf};

use evidence_core::naming::matches_task_ref;
use evidence_core::{EngineConfig, EvidenceError, Result};

use crate::fs::read_dir_or_empty;
use crate::layout::Stage;

/// Roots derived from [`EngineConfig`]; resolution reads directory names but
/// never creates anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    data_root: PathBuf,
    evidence_root: PathBuf,
    batches_root: PathBuf,
    state_root: PathBuf,
}

impl StorePaths {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            data_root: config.data_root.clone(),
            evidence_root: config.evidence_root(),
            batches_root: config.batches_root(),
            state_root: config.state_root(),
        }
    }

    /// Default directory names under `data_root`
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self::from_config(&EngineConfig::default().with_data_root(data_root))
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn evidence_root(&self) -> &Path {
        &self.evidence_root
    }

    pub fn batches_root(&self) -> &Path {
        &self.batches_root
    }

    pub fn state_root(&self) -> &Path {
        &self.state_root
    }

    /// First directory under the evidence root whose name matches `task_ref`.
    pub fn find_task_dir(&self, task_ref: &str) -> Result<Option<PathBuf>> {
        for entry in read_dir_or_empty(&self.evidence_root)? {
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if matches_task_ref(name, task_ref) {
                    return Ok(Some(entry.path()));
                }
            }
        }
        Ok(None)
    }

    /// Window directory for a task, falling back to `<evidence>/<task_ref>/<window>`
    /// when no task directory matches or the evidence root cannot be read.
    pub fn window_dir(&self, task_ref: &str, window: &str) -> PathBuf {
        match self.find_task_dir(task_ref) {
            Ok(Some(task_dir)) => task_dir.join(window),
            _ => self.evidence_root.join(task_ref).join(window),
        }
    }

    pub fn stage_dir(&self, task_ref: &str, window: &str, stage: Stage) -> PathBuf {
        stage.path_in(&self.window_dir(task_ref, window))
    }

    pub fn batch_dir(&self, batch_id: &str) -> PathBuf {
        self.batches_root.join(batch_id)
    }

    pub fn batch_manifest(&self, batch_id: &str) -> PathBuf {
        self.batch_dir(batch_id).join("manifest.yaml")
    }

    /// Path relative to the data root, or the path itself when it lies outside.
    pub fn relative_to_data_root(&self, path: &Path) -> String {
        path.strip_prefix(&self.data_root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

/// Reject empty or path-like identifiers before they are joined into paths.
pub(crate) fn check_component(kind: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(EvidenceError::InvalidInput(format!("{kind} must not be empty")));
    }
    if value.contains('/') || value.contains('\\') || value == "." || value == ".." {
        return Err(EvidenceError::InvalidInput(format!(
            "{kind} must be a single path component: {value}"
        )));
    }
    Ok(())
}

/// A stored path that stays below whatever root it is joined to: relative,
/// and made only of normal components.
pub(crate) fn is_safe_relative(path: &str) -> bool {
    let path = Path::new(path);
    path.components().next().is_some()
        && path.components().all(|c| matches!(c, Component::Normal(_)))
}
