//! Legacy window cleanup
//!
//! Migrates windows written before stage folders existed. A flat window whose
//! submission record says submitted or accepted moves its files and `.submission/` +
//! `.generation/` into `archive/`; every other flat window keeps its files in
//! the root, which is the working stage.

use std::collections::BTreeMap;
use std::path::Path;

use evidence_core::{EngineConfig, EvidenceError, EvidenceSubmission, Result, ScanContext};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::fs::{ensure_dir, move_path, read_dir_or_empty, read_yaml};
use crate::layout::{
    Stage, GENERATION_META_DIR, NON_EVIDENCE_FILES, SUBMISSION_FILE, SUBMISSION_META_DIR,
};
use crate::paths::StorePaths;
use crate::scanner::EvidenceScanner;

/// Pre-stage folder names that also mark a window as already organized
const LEGACY_STAGE_DIRS: &[&str] = &["wip", "ready", "submitted"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupResult {
    pub task_ref: String,
    pub window: String,
    pub was_flat_structure: bool,
    /// Stage folder to number of files moved there
    pub files_organized: BTreeMap<String, usize>,
    pub metadata_moved: Vec<String>,
    pub errors: Vec<String>,
}

impl CleanupResult {
    pub fn total_files_organized(&self) -> usize {
        self.files_organized.values().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupSummary {
    pub total_tasks: usize,
    pub total_windows: usize,
    pub windows_cleaned: usize,
    pub files_organized: usize,
    pub results: Vec<CleanupResult>,
    pub errors: Vec<String>,
}

pub struct EvidenceCleaner {
    paths: StorePaths,
}

impl EvidenceCleaner {
    pub fn new(paths: StorePaths) -> Self {
        Self { paths }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(StorePaths::from_config(config))
    }

    /// Organize one window. With `dry_run` nothing moves, but the result
    /// reports what would have.
    pub fn organize_window(&self, ctx: &ScanContext, task_ref: &str, window: &str, dry_run: bool) -> Result<CleanupResult> {
        let task_dir = self.paths.find_task_dir(task_ref)?.ok_or_else(|| {
            EvidenceError::not_found("task directory", self.paths.evidence_root().join(task_ref))
        })?;
        let window_dir = task_dir.join(window);
        if !window_dir.is_dir() {
            return Err(EvidenceError::not_found("window directory", window_dir));
        }

        let mut result = CleanupResult {
            task_ref: task_ref.to_string(),
            window: window.to_string(),
            ..CleanupResult::default()
        };
        result.was_flat_structure = is_flat_structure(&window_dir)?;
        if !result.was_flat_structure {
            debug!(task_ref, window, "window already organized");
            return Ok(result);
        }

        let record_path = window_dir.join(SUBMISSION_META_DIR).join(SUBMISSION_FILE);
        let submitted = match read_yaml::<EvidenceSubmission>(&record_path, "submission") {
            Ok(record) => record.is_submitted(),
            Err(err) if err.is_not_found() => false,
            Err(err) => {
                warn!(task_ref, window, error = %err, "unreadable submission record");
                result.errors.push(format!("unreadable submission record: {err}"));
                false
            }
        };
        if !submitted {
            debug!(task_ref, window, "files stay in the working root");
            return Ok(result);
        }

        let archive = Stage::Archive;
        let target = archive.path_in(&window_dir);
        if !dry_run {
            ensure_dir(&target)?;
        }

        for entry in read_dir_or_empty(&window_dir)? {
            ctx.check()?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let carries = if is_dir {
                name == SUBMISSION_META_DIR || name == GENERATION_META_DIR
            } else {
                !NON_EVIDENCE_FILES.contains(&name.as_str())
            };
            if !carries {
                continue;
            }

            if !dry_run {
                if let Err(err) = move_path(&entry.path(), &target.join(&name)) {
                    warn!(task_ref, window, entry = %name, error = %err, "cleanup move failed");
                    result.errors.push(format!("failed to move {name}: {err}"));
                    continue;
                }
            }
            if is_dir {
                result.metadata_moved.push(name);
            } else {
                *result.files_organized.entry(archive.to_string()).or_insert(0) += 1;
            }
        }

        info!(
            task_ref,
            window,
            dry_run,
            files = result.total_files_organized(),
            "window organized"
        );
        Ok(result)
    }

    /// Organize every window the scanner finds. Per-window failures are
    /// collected into the summary.
    pub fn organize_all(&self, ctx: &ScanContext, scanner: &EvidenceScanner, dry_run: bool) -> Result<CleanupSummary> {
        let states = scanner.scan_all(ctx)?;
        let mut summary = CleanupSummary {
            total_tasks: states.len(),
            ..CleanupSummary::default()
        };

        for (task_ref, state) in &states {
            for window in state.windows.keys() {
                ctx.check()?;
                summary.total_windows += 1;
                match self.organize_window(ctx, task_ref, window, dry_run) {
                    Ok(result) => {
                        if result.was_flat_structure {
                            summary.windows_cleaned += 1;
                            summary.files_organized += result.total_files_organized();
                        }
                        summary.results.push(result);
                    }
                    Err(EvidenceError::Cancelled) => return Err(EvidenceError::Cancelled),
                    Err(err) => {
                        warn!(task_ref = %task_ref, window = %window, error = %err, "cleanup failed");
                        summary
                            .errors
                            .push(format!("failed to clean up {task_ref}/{window}: {err}"));
                    }
                }
            }
        }
        Ok(summary)
    }
}

/// Flat means no stage folders (current or legacy) and at least one evidence
/// file directly in the window root.
fn is_flat_structure(window_dir: &Path) -> Result<bool> {
    let staged = Stage::ALL
        .iter()
        .filter_map(|s| s.dir_name())
        .chain(LEGACY_STAGE_DIRS.iter().copied())
        .any(|name| window_dir.join(name).is_dir());
    if staged {
        return Ok(false);
    }
    Ok(read_dir_or_empty(window_dir)?.iter().any(|entry| {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        is_file && !NON_EVIDENCE_FILES.contains(&name.as_str())
    }))
}
