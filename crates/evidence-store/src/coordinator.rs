//! Submission Coordinator
//!
//! Owns the staging record, validation result, and history of every
//! task/window, and moves evidence between stages. Calls for different
//! task/window pairs touch disjoint directories; calls for the same pair must
//! be serialized by the caller.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use evidence_core::{
    sha256_file, verify_file, ChecksumVerdict, EngineConfig, EvidenceError, EvidenceFileRef,
    EvidenceSubmission, LayoutMode, Result, SubmissionHistory, SubmissionHistoryEntry,
    ValidationResult,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::fs::{ensure_dir, is_hidden, move_path, read_dir_or_empty, read_yaml, write_yaml};
use crate::layout::{
    EvidenceFolderStructure, Stage, GENERATION_META_DIR, SUBMISSION_META_DIR, VALIDATION_FILE,
    VALIDATION_META_DIR,
};
use crate::paths::{check_component, is_safe_relative, StorePaths};
use crate::render::{render_markdown_in, DocumentRenderer};
use crate::scanner::{collect_evidence_files, has_visible_files};

/// Integrity of one submitted file as found on disk now
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum FileVerdict {
    Verified,
    Mismatch { expected: String, actual: String },
    /// No usable checksum was recorded
    Unverified,
    /// File is no longer reachable
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileVerification {
    pub filename: String,
    pub relative_path: String,
    #[serde(flatten)]
    pub verdict: FileVerdict,
}

/// What a stage move did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageMove {
    pub moved: Vec<String>,
    /// Left in place because the destination already had an entry of that name
    pub skipped: Vec<String>,
    /// Markdown files rendered on entry to `ready/`
    pub rendered: Vec<String>,
}

pub struct SubmissionCoordinator {
    paths: StorePaths,
    layout: LayoutMode,
    renderer: Option<Arc<dyn DocumentRenderer>>,
    convert_markdown: bool,
}

impl SubmissionCoordinator {
    pub fn new(paths: StorePaths) -> Self {
        Self {
            paths,
            layout: LayoutMode::default(),
            renderer: None,
            convert_markdown: true,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        let mut coordinator = Self::new(StorePaths::from_config(config)).with_layout(config.layout);
        coordinator.convert_markdown = config.convert_markdown_on_ready;
        coordinator
    }

    pub fn with_layout(mut self, layout: LayoutMode) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    pub fn window_dir(&self, task_ref: &str, window: &str) -> PathBuf {
        self.paths.window_dir(task_ref, window)
    }

    /// Folder layout of the window root
    pub fn folder_structure(&self, task_ref: &str, window: &str) -> EvidenceFolderStructure {
        EvidenceFolderStructure::new(self.window_dir(task_ref, window), self.layout)
    }

    /// Stage subfolders always keep their metadata in a hidden `.submission/`.
    fn stage_structure(&self, task_ref: &str, window: &str, stage: Stage) -> EvidenceFolderStructure {
        match stage {
            Stage::Root => self.folder_structure(task_ref, window),
            other => EvidenceFolderStructure::new(
                self.paths.stage_dir(task_ref, window, other),
                LayoutMode::Flat,
            ),
        }
    }

    // =========================================================================
    // Submission records
    // =========================================================================

    /// Create the metadata directory and a default `draft` record if none exists.
    pub fn initialize_submission_metadata(&self, task_ref: &str, window: &str) -> Result<()> {
        check_component("task_ref", task_ref)?;
        check_component("window", window)?;
        let layout = self.folder_structure(task_ref, window);
        ensure_dir(&layout.metadata_dir())?;
        if !layout.submission_path().exists() {
            self.save_submission(&EvidenceSubmission::draft(task_ref, window))?;
            debug!(task_ref, window, "initialized submission metadata");
        }
        Ok(())
    }

    pub fn save_submission(&self, submission: &EvidenceSubmission) -> Result<()> {
        self.save_submission_to_stage(submission, Stage::Root)
    }

    pub fn save_submission_to_stage(&self, submission: &EvidenceSubmission, stage: Stage) -> Result<()> {
        check_component("task_ref", &submission.task_ref)?;
        check_component("window", &submission.window)?;
        let layout = self.stage_structure(&submission.task_ref, &submission.window, stage);
        write_yaml(&layout.submission_path(), submission, "submission")?;
        debug!(
            task_ref = %submission.task_ref,
            window = %submission.window,
            stage = %stage,
            status = %submission.status,
            "saved submission"
        );
        Ok(())
    }

    /// `NotFound` when no record exists; callers must not assume a default.
    pub fn load_submission(&self, task_ref: &str, window: &str) -> Result<EvidenceSubmission> {
        self.load_submission_from_stage(task_ref, window, Stage::Root)
    }

    pub fn load_submission_from_stage(
        &self,
        task_ref: &str,
        window: &str,
        stage: Stage,
    ) -> Result<EvidenceSubmission> {
        let layout = self.stage_structure(task_ref, window, stage);
        read_yaml(&layout.submission_path(), "submission")
    }

    pub fn submission_exists(&self, task_ref: &str, window: &str) -> bool {
        self.folder_structure(task_ref, window).submission_path().is_file()
    }

    // =========================================================================
    // Validation results
    // =========================================================================

    /// Overwrites any earlier result for the window.
    pub fn save_validation_result(&self, task_ref: &str, window: &str, result: &ValidationResult) -> Result<()> {
        check_component("task_ref", task_ref)?;
        check_component("window", window)?;
        let path = self.folder_structure(task_ref, window).validation_path();
        write_yaml(&path, result, "validation result")
    }

    /// Stage-scoped results live in `<stage>/.validation/` beside generation metadata.
    pub fn save_validation_result_to_stage(
        &self,
        task_ref: &str,
        window: &str,
        result: &ValidationResult,
        stage: Stage,
    ) -> Result<()> {
        check_component("task_ref", task_ref)?;
        check_component("window", window)?;
        let path = self.stage_validation_path(task_ref, window, stage);
        write_yaml(&path, result, "validation result")
    }

    pub fn load_validation_result(&self, task_ref: &str, window: &str) -> Result<ValidationResult> {
        let path = self.folder_structure(task_ref, window).validation_path();
        read_yaml(&path, "validation result")
    }

    pub fn load_validation_result_from_stage(
        &self,
        task_ref: &str,
        window: &str,
        stage: Stage,
    ) -> Result<ValidationResult> {
        read_yaml(&self.stage_validation_path(task_ref, window, stage), "validation result")
    }

    fn stage_validation_path(&self, task_ref: &str, window: &str, stage: Stage) -> PathBuf {
        match stage {
            Stage::Root => self.folder_structure(task_ref, window).validation_path(),
            other => self
                .paths
                .stage_dir(task_ref, window, other)
                .join(VALIDATION_META_DIR)
                .join(VALIDATION_FILE),
        }
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Load-or-create, append, re-sort most recent first, rewrite in full.
    pub fn add_submission_history(&self, task_ref: &str, window: &str, entry: SubmissionHistoryEntry) -> Result<()> {
        self.add_submission_history_to_stage(task_ref, window, entry, Stage::Root)
    }

    pub fn add_submission_history_to_stage(
        &self,
        task_ref: &str,
        window: &str,
        entry: SubmissionHistoryEntry,
        stage: Stage,
    ) -> Result<()> {
        let mut history = match self.load_history_at(task_ref, window, stage) {
            Ok(history) => history,
            Err(err) if err.is_not_found() => SubmissionHistory::new(task_ref, window),
            Err(err) => return Err(err),
        };
        history.push(entry);
        self.save_submission_history_to_stage(&history, stage)
    }

    pub fn save_submission_history(&self, history: &SubmissionHistory) -> Result<()> {
        self.save_submission_history_to_stage(history, Stage::Root)
    }

    pub fn save_submission_history_to_stage(&self, history: &SubmissionHistory, stage: Stage) -> Result<()> {
        check_component("task_ref", &history.task_ref)?;
        check_component("window", &history.window)?;
        let mut sorted = history.clone();
        sorted.sort_entries();
        let path = self
            .stage_structure(&history.task_ref, &history.window, stage)
            .history_path();
        write_yaml(&path, &sorted, "submission history")
    }

    /// Entries are returned most recent first regardless of how the file was written.
    pub fn load_submission_history(&self, task_ref: &str, window: &str) -> Result<SubmissionHistory> {
        self.load_history_at(task_ref, window, Stage::Root)
    }

    fn load_history_at(&self, task_ref: &str, window: &str, stage: Stage) -> Result<SubmissionHistory> {
        let path = self.stage_structure(task_ref, window, stage).history_path();
        let mut history: SubmissionHistory = read_yaml(&path, "submission history")?;
        history.sort_entries();
        Ok(history)
    }

    // =========================================================================
    // Evidence files and integrity
    // =========================================================================

    pub fn calculate_file_checksum(&self, path: impl AsRef<Path>) -> Result<String> {
        sha256_file(path)
    }

    /// Compare a recorded checksum against the file now on disk.
    pub fn verify_file_checksum(&self, path: impl AsRef<Path>, recorded: &str) -> Result<ChecksumVerdict> {
        verify_file(path, recorded)
    }

    /// Evidence in the window's evidence directory. `NotFound` if the window does not exist.
    pub fn evidence_files(&self, task_ref: &str, window: &str) -> Result<Vec<EvidenceFileRef>> {
        let dir = self.folder_structure(task_ref, window).evidence_dir();
        if !dir.is_dir() {
            return Err(EvidenceError::not_found("evidence directory", dir));
        }
        collect_evidence_files(&self.paths, &dir)
    }

    /// Evidence in one stage subfolder; empty when the subfolder does not exist yet.
    pub fn evidence_files_in_stage(&self, task_ref: &str, window: &str, stage: Stage) -> Result<Vec<EvidenceFileRef>> {
        if stage == Stage::Root {
            return self.evidence_files(task_ref, window);
        }
        let dir = self.paths.stage_dir(task_ref, window, stage);
        collect_evidence_files(&self.paths, &dir)
    }

    /// Recompute every file of the stored submission against its recorded digest.
    pub fn verify_submission_files(&self, task_ref: &str, window: &str) -> Result<Vec<FileVerification>> {
        let submission = self.load_submission(task_ref, window)?;
        let window_dir = self.window_dir(task_ref, window);
        let submitted_dir = Stage::Submitted.path_in(&window_dir);

        let mut results = Vec::with_capacity(submission.evidence_files.len());
        for file in &submission.evidence_files {
            check_file_ref(file)?;
            let candidates = [
                self.paths.data_root().join(&file.relative_path),
                window_dir.join(&file.filename),
                submitted_dir.join(&file.filename),
            ];
            let verdict = match candidates.iter().find(|p| p.is_file()) {
                None => FileVerdict::Missing,
                Some(path) => match verify_file(path, &file.checksum_sha256) {
                    Ok(ChecksumVerdict::Verified) => FileVerdict::Verified,
                    Ok(ChecksumVerdict::Unverified) => FileVerdict::Unverified,
                    Ok(ChecksumVerdict::Mismatch { expected, actual }) => {
                        warn!(task_ref, window, file = %file.filename, "checksum mismatch");
                        FileVerdict::Mismatch { expected, actual }
                    }
                    Err(err) if err.is_not_found() => FileVerdict::Missing,
                    Err(err) => return Err(err),
                },
            };
            results.push(FileVerification {
                filename: file.filename.clone(),
                relative_path: file.relative_path.clone(),
                verdict,
            });
        }
        Ok(results)
    }

    // =========================================================================
    // Staging
    // =========================================================================

    /// True only when `.submitted/` exists and holds at least one non-hidden file.
    pub fn check_already_submitted(&self, task_ref: &str, window: &str) -> bool {
        has_visible_files(&self.paths.stage_dir(task_ref, window, Stage::Submitted))
    }

    /// Resubmission guard: refuse rather than overwrite. Either evidence in
    /// `.submitted/` or a stored record in submitted/accepted status blocks.
    pub fn ensure_not_submitted(&self, task_ref: &str, window: &str) -> Result<()> {
        let already = EvidenceError::AlreadySubmitted {
            task_ref: task_ref.to_string(),
            window: window.to_string(),
        };
        if self.check_already_submitted(task_ref, window) {
            return Err(already);
        }
        match self.load_submission(task_ref, window) {
            Ok(record) if record.is_submitted() => Err(already),
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Move the listed files into `.submitted/`, then carry `.generation/` and
    /// `.validation/` along. Missing sources are skipped; a prior partial run
    /// may already have moved them. Returns how many files moved.
    pub fn move_evidence_files_to_submitted(
        &self,
        task_ref: &str,
        window: &str,
        files: &[EvidenceFileRef],
    ) -> Result<usize> {
        for file in files {
            check_file_ref(file)?;
        }
        let window_dir = self.window_dir(task_ref, window);
        let submitted_dir = Stage::Submitted.path_in(&window_dir);
        ensure_dir(&submitted_dir)?;

        let mut moved = 0;
        let mut source_dirs = BTreeSet::new();
        for file in files {
            let by_relative = self.paths.data_root().join(&file.relative_path);
            let source = if !file.relative_path.is_empty() && by_relative.is_file() {
                by_relative
            } else {
                window_dir.join(&file.filename)
            };
            if !source.is_file() {
                debug!(task_ref, window, file = %file.filename, "source missing, skipping");
                continue;
            }
            if source.parent() == Some(submitted_dir.as_path()) {
                continue;
            }
            if let Some(parent) = source.parent() {
                source_dirs.insert(parent.to_path_buf());
            }
            move_path(&source, &submitted_dir.join(&file.filename))?;
            moved += 1;
        }

        for dir in source_dirs {
            for meta in [GENERATION_META_DIR, VALIDATION_META_DIR] {
                let from = dir.join(meta);
                let to = submitted_dir.join(meta);
                if !from.is_dir() {
                    continue;
                }
                if to.exists() {
                    debug!(task_ref, window, dir = meta, "submitted metadata already present");
                    continue;
                }
                if let Err(err) = move_path(&from, &to) {
                    warn!(task_ref, window, dir = meta, error = %err, "failed to relocate metadata");
                }
            }
        }

        info!(task_ref, window, moved, "moved evidence to submitted");
        Ok(moved)
    }

    /// Where evidence of `stage` lives: `evidence/` for the root of a
    /// structured window, the stage folder otherwise.
    fn stage_evidence_dir(&self, task_ref: &str, window: &str, stage: Stage) -> PathBuf {
        match stage {
            Stage::Root => self.folder_structure(task_ref, window).evidence_dir(),
            other => self.paths.stage_dir(task_ref, window, other),
        }
    }

    /// Move every entry of one stage into another. Entering `ready/` renders
    /// markdown through the configured renderer, best-effort.
    pub fn move_stage(&self, task_ref: &str, window: &str, from: Stage, to: Stage) -> Result<StageMove> {
        check_component("task_ref", task_ref)?;
        check_component("window", window)?;
        if from == to {
            return Err(EvidenceError::InvalidInput(format!(
                "source and destination stage are both {from}"
            )));
        }

        let from_dir = self.stage_evidence_dir(task_ref, window, from);
        let to_dir = self.stage_evidence_dir(task_ref, window, to);
        if !from_dir.is_dir() {
            return Err(EvidenceError::not_found("stage directory", from_dir));
        }
        ensure_dir(&to_dir)?;

        let window_dir = self.window_dir(task_ref, window);
        let mut outcome = StageMove::default();
        for entry in read_dir_or_empty(&from_dir)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            // a flat window root also holds the stage folders and its own record
            if from_dir == window_dir && is_window_scaffolding(&name) {
                continue;
            }
            let dest = to_dir.join(&name);
            if dest.exists() {
                warn!(task_ref, window, entry = %name, to = %to, "destination exists, not overwriting");
                outcome.skipped.push(name);
                continue;
            }
            move_path(&entry.path(), &dest)?;
            if !is_hidden(&name) {
                outcome.moved.push(name);
            }
        }

        if to == Stage::Ready && self.convert_markdown {
            if let Some(renderer) = &self.renderer {
                outcome.rendered = render_markdown_in(renderer.as_ref(), &to_dir, task_ref, window);
            }
        }

        info!(
            task_ref,
            window,
            from = %from,
            to = %to,
            moved = outcome.moved.len(),
            "moved stage"
        );
        Ok(outcome)
    }
}

/// Entries of a window root that belong to the layout, not to any stage
fn is_window_scaffolding(name: &str) -> bool {
    Stage::from_dir_name(name).is_some()
        || name == SUBMISSION_META_DIR
        || matches!(name, "evidence" | "sources" | "metadata" | "README.md")
}

/// File references come from stored records; keep them inside the data root.
fn check_file_ref(file: &EvidenceFileRef) -> Result<()> {
    check_component("filename", &file.filename)?;
    if !file.relative_path.is_empty() && !is_safe_relative(&file.relative_path) {
        return Err(EvidenceError::InvalidInput(format!(
            "relative_path escapes the data root: {}",
            file.relative_path
        )));
    }
    Ok(())
}
