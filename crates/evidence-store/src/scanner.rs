//! Collection/window scanner
//!
//! Walks the evidence tree and reports what is on disk: per-window file
//! inventories, generation provenance, and submission status. Scans never
//! write. Unreadable entries and malformed metadata are logged and skipped so
//! one bad window cannot hide the rest of a task.

use std::collections::{BTreeMap, HashMap};
use std::fs::DirEntry;
use std::path::Path;

use chrono::{DateTime, Utc};
use evidence_core::naming::{is_window_dir, parse_task_dir, task_id_from_ref};
use evidence_core::{
    sha256_file, AutomationPolicy, EngineConfig, EvidenceError, EvidenceFileRef, EvidenceSubmission,
    EvidenceTaskState, FileState, GenerationMetadata, LayoutMode, Result, ScanContext, SubmissionStatus,
    ValidationResult, WindowState,
};
use tracing::{debug, info, warn};

use crate::fs::{is_hidden, read_dir_or_empty, read_yaml};
use crate::layout::{
    EvidenceFolderStructure, Stage, GENERATION_FILE, GENERATION_META_DIR, NON_EVIDENCE_FILES, SUBMISSION_FILE,
    SUBMISSION_META_DIR, VALIDATION_FILE, VALIDATION_META_DIR,
};
use crate::paths::StorePaths;

/// Stages probed for metadata, in precedence order.
const METADATA_STAGES: [Stage; 4] = [Stage::Root, Stage::Ready, Stage::Wip, Stage::Archive];

pub struct EvidenceScanner {
    paths: StorePaths,
    layout: LayoutMode,
    policy: AutomationPolicy,
    /// Task reference to free-text description, used for tool detection
    descriptions: HashMap<String, String>,
}

impl EvidenceScanner {
    pub fn new(paths: StorePaths) -> Self {
        Self {
            paths,
            layout: LayoutMode::default(),
            policy: AutomationPolicy::default(),
            descriptions: HashMap::new(),
        }
    }

    /// Scanner configured from the engine config: roots, layout, overrides.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(StorePaths::from_config(config))
            .with_layout(config.layout)
            .with_policy(config.automation_policy())
    }

    pub fn with_layout(mut self, layout: LayoutMode) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_policy(mut self, policy: AutomationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_description(mut self, task_ref: impl Into<String>, description: impl Into<String>) -> Self {
        self.descriptions.insert(task_ref.into(), description.into());
        self
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    /// State for every recognizable task directory. Tasks that fail to scan
    /// are logged and left out.
    pub fn scan_all(&self, ctx: &ScanContext) -> Result<BTreeMap<String, EvidenceTaskState>> {
        let root = self.paths.evidence_root();
        info!(directory = %root.display(), trace_id = %ctx.trace_id, "scanning evidence directory");

        let mut states = BTreeMap::new();
        for entry in read_dir_or_empty(root)? {
            ctx.check()?;
            if !is_dir(&entry) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(parsed) = parse_task_dir(&name) else {
                continue;
            };
            if states.contains_key(&parsed.task_ref) {
                debug!(task_ref = %parsed.task_ref, directory = %name, "duplicate task directory ignored");
                continue;
            }
            match self.scan_task(ctx, &parsed.task_ref) {
                Ok(state) => {
                    states.insert(parsed.task_ref, state);
                }
                Err(EvidenceError::Cancelled) => return Err(EvidenceError::Cancelled),
                Err(err) => {
                    warn!(task_ref = %parsed.task_ref, error = %err, "failed to scan task");
                }
            }
        }

        info!(tasks_found = states.len(), "evidence scan complete");
        Ok(states)
    }

    /// State for one task; an empty `no_evidence` state when it has no directory.
    pub fn scan_task(&self, ctx: &ScanContext, task_ref: &str) -> Result<EvidenceTaskState> {
        ctx.check()?;
        let task_id = task_id_from_ref(task_ref).unwrap_or(0);
        let Some(task_dir) = self.paths.find_task_dir(task_ref)? else {
            debug!(task_ref, "task directory not found");
            return Ok(EvidenceTaskState::new(task_ref, task_id, ""));
        };

        let dir_name = task_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let task_name = parse_task_dir(&dir_name).map(|p| p.name).unwrap_or_default();
        let mut state = EvidenceTaskState::new(task_ref, task_id, task_name);

        for entry in read_dir_or_empty(&task_dir)? {
            ctx.check()?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_dir(&entry) || is_hidden(&name) || !is_window_dir(&name) {
                continue;
            }
            match self.scan_window_dir(ctx, &entry.path(), &name) {
                Ok(window) => {
                    state.windows.insert(name, window);
                }
                Err(EvidenceError::Cancelled) => return Err(EvidenceError::Cancelled),
                Err(err) => warn!(task_ref, window = %name, error = %err, "failed to scan window"),
            }
        }

        let text = match self.descriptions.get(task_ref) {
            Some(description) => format!("{} {}", state.task_name, description),
            None => state.task_name.clone(),
        };
        state.applicable_tools = evidence_core::detect_applicable_tools(Some(&text), &state.windows);
        state.automation_level = self
            .policy
            .resolve(task_ref, &state.applicable_tools, &text);
        state.refresh_derived();

        debug!(
            task_ref,
            windows = state.windows.len(),
            local_state = %state.local_state,
            "task scan complete"
        );
        Ok(state)
    }

    /// State for one window. Missing task or window directories are `NotFound`.
    pub fn scan_window(&self, ctx: &ScanContext, task_ref: &str, window: &str) -> Result<WindowState> {
        let task_dir = self
            .paths
            .find_task_dir(task_ref)?
            .ok_or_else(|| EvidenceError::not_found("task directory", self.paths.evidence_root().join(task_ref)))?;
        let window_dir = task_dir.join(window);
        if !window_dir.is_dir() {
            return Err(EvidenceError::not_found("window directory", window_dir));
        }
        self.scan_window_dir(ctx, &window_dir, window)
    }

    fn scan_window_dir(&self, ctx: &ScanContext, window_dir: &Path, window: &str) -> Result<WindowState> {
        let mut state = WindowState::new(window);
        let layout = EvidenceFolderStructure::new(window_dir, self.layout);

        let generation = METADATA_STAGES
            .iter()
            .find_map(|stage| read_generation(&stage.path_in(window_dir)));

        for stage in Stage::ALL.into_iter().filter(|s| s.is_scanned()) {
            let dir = match stage {
                Stage::Root => layout.evidence_dir(),
                other => other.path_in(window_dir),
            };
            for file in scan_files(ctx, &dir)? {
                state.push_file(file);
            }
        }

        if let Some(meta) = &generation {
            state.has_generation_meta = true;
            state.generation_method = non_empty(&meta.generation_method);
            state.generated_by = non_empty(&meta.generated_by);
            state.generated_at = Some(meta.generated_at);
            state.tools_used = meta.tools_used.clone();
            for file in &mut state.files {
                if let Some(recorded) = meta.file(&file.filename) {
                    file.is_generated = true;
                    if !recorded.checksum.is_empty() {
                        file.checksum = Some(recorded.checksum.clone());
                    }
                }
            }
        }

        let submitted_dir = Stage::Submitted.path_in(window_dir);
        let submission = read_optional(&layout.submission_path(), "submission").or_else(|| {
            [Stage::Ready, Stage::Submitted]
                .iter()
                .find_map(|stage| read_submission(&stage.path_in(window_dir)))
        });

        if let Some(record) = submission {
            state.has_submission_meta = true;
            state.submission_status = Some(record.status);
            state.submitted_at = record.submitted_at;
            state.submission_id = record.submission_id;
        } else if has_visible_files(&submitted_dir) {
            state.submission_status = Some(SubmissionStatus::Submitted);
        } else if read_validation(&Stage::Ready.path_in(window_dir)).is_some() {
            state.submission_status = Some(SubmissionStatus::Validated);
        }

        Ok(state)
    }
}

/// Evidence files directly inside `dir`: hidden entries, subdirectories, and
/// planning files are skipped. Unreadable checksums are left empty.
pub(crate) fn collect_evidence_files(paths: &StorePaths, dir: &Path) -> Result<Vec<EvidenceFileRef>> {
    let mut files = Vec::new();
    for entry in read_dir_or_empty(dir)? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_dir(&entry) || is_hidden(&name) || NON_EVIDENCE_FILES.contains(&name.as_str()) {
            continue;
        }
        let size = match entry.metadata() {
            Ok(meta) => Some(meta.len()),
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "file metadata unavailable");
                None
            }
        };
        files.push(evidence_file_ref(paths, &entry.path(), name, size));
    }
    Ok(files)
}

/// Listing entry for one evidence file. A missing size reads as 0 and an
/// unreadable checksum stays empty, so the file is still listed.
fn evidence_file_ref(paths: &StorePaths, path: &Path, name: String, size: Option<u64>) -> EvidenceFileRef {
    let checksum = match sha256_file(path) {
        Ok(sum) => sum,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "checksum unavailable");
            String::new()
        }
    };
    EvidenceFileRef {
        filename: name.clone(),
        relative_path: paths.relative_to_data_root(path),
        title: name,
        source: String::new(),
        size_bytes: size.unwrap_or(0),
        checksum_sha256: checksum,
        controls_satisfied: Vec::new(),
    }
}

fn scan_files(ctx: &ScanContext, dir: &Path) -> Result<Vec<FileState>> {
    let mut files = Vec::new();
    for entry in read_dir_or_empty(dir)? {
        ctx.check()?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_dir(&entry) || is_hidden(&name) || NON_EVIDENCE_FILES.contains(&name.as_str()) {
            continue;
        }
        let (size_bytes, modified_at) = match entry.metadata() {
            Ok(meta) => (meta.len(), meta.modified().ok().map(DateTime::<Utc>::from)),
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "file metadata unavailable");
                (0, None)
            }
        };
        files.push(FileState {
            filename: name,
            size_bytes,
            checksum: None,
            modified_at,
            is_generated: false,
        });
    }
    Ok(files)
}

pub(crate) fn has_visible_files(dir: &Path) -> bool {
    read_dir_or_empty(dir)
        .map(|entries| {
            entries.iter().any(|e| {
                !is_dir(e) && !is_hidden(&e.file_name().to_string_lossy())
            })
        })
        .unwrap_or(false)
}

fn is_dir(entry: &DirEntry) -> bool {
    entry.file_type().map(|t| t.is_dir()).unwrap_or(false)
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn read_optional<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Option<T> {
    match read_yaml(path, what) {
        Ok(value) => Some(value),
        Err(err) if err.is_not_found() => None,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "skipping unreadable metadata");
            None
        }
    }
}

fn read_generation(dir: &Path) -> Option<GenerationMetadata> {
    read_optional(&dir.join(GENERATION_META_DIR).join(GENERATION_FILE), "generation metadata")
}

fn read_submission(dir: &Path) -> Option<EvidenceSubmission> {
    read_optional(&dir.join(SUBMISSION_META_DIR).join(SUBMISSION_FILE), "submission")
}

fn read_validation(dir: &Path) -> Option<ValidationResult> {
    read_optional(&dir.join(VALIDATION_META_DIR).join(VALIDATION_FILE), "validation result")
}

#[cfg(test)]
mod tests {
    use super::*;
    use evidence_core::LocalEvidenceState;
    use std::fs;

    fn setup() -> (tempfile::TempDir, EvidenceScanner) {
        let tmp = tempfile::tempdir().unwrap();
        let scanner = EvidenceScanner::new(StorePaths::new(tmp.path()));
        (tmp, scanner)
    }

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_scan_window_counts_stages_but_not_submitted() {
        let (tmp, scanner) = setup();
        let window = tmp.path().join("evidence/ET-0001_Access_Review/2025-Q4");
        write(&window.join("users.csv"), "a,b\n1,2\n");
        write(&window.join("wip/draft.md"), "# draft");
        write(&window.join("ready/final.md"), "# final");
        write(&window.join(".submitted/old.md"), "# old");
        write(&window.join(".hidden"), "x");

        let state = scanner
            .scan_window(&ScanContext::new(), "ET-0001", "2025-Q4")
            .unwrap();
        assert_eq!(state.file_count, 3);
        let mut names: Vec<_> = state.files.iter().map(|f| f.filename.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["draft.md", "final.md", "users.csv"]);
        assert!(state.oldest_file.is_some());
    }

    #[test]
    fn test_generation_metadata_marks_files() {
        let (tmp, scanner) = setup();
        let window = tmp.path().join("evidence/ET-0002/2025");
        write(&window.join("report.json"), "{}");
        write(&window.join("manual.pdf"), "pdf");
        write(
            &window.join(".generation/metadata.yaml"),
            "generated_at: 2025-10-01T12:00:00Z\n\
             generated_by: grctool-cli\n\
             generation_method: tool_coordination\n\
             tools_used: [github-permissions]\n\
             files_generated:\n  \
             - path: report.json\n    \
               checksum: sha256:abc\n    \
               size_bytes: 2\n    \
               generated_at: 2025-10-01T12:00:00Z\n",
        );

        let state = scanner.scan_window(&ScanContext::new(), "ET-0002", "2025").unwrap();
        assert!(state.has_generation_meta);
        assert_eq!(state.generated_by.as_deref(), Some("grctool-cli"));
        assert_eq!(state.tools_used, vec!["github-permissions".to_string()]);
        let report = state.files.iter().find(|f| f.filename == "report.json").unwrap();
        assert!(report.is_generated);
        assert_eq!(report.checksum.as_deref(), Some("sha256:abc"));
        let manual = state.files.iter().find(|f| f.filename == "manual.pdf").unwrap();
        assert!(!manual.is_generated);
    }

    #[test]
    fn test_submitted_folder_without_status_reports_submitted() {
        let (tmp, scanner) = setup();
        let window = tmp.path().join("evidence/ET-0003/2025-Q1");
        write(&window.join(".submitted/evidence.csv"), "x");
        let state = scanner.scan_window(&ScanContext::new(), "ET-0003", "2025-Q1").unwrap();
        assert_eq!(state.file_count, 0);
        assert_eq!(state.submission_status, Some(SubmissionStatus::Submitted));
        assert!(!state.has_submission_meta);
    }

    #[test]
    fn test_malformed_submission_is_skipped() {
        let (tmp, scanner) = setup();
        let window = tmp.path().join("evidence/ET-0004/2025");
        write(&window.join("a.csv"), "x");
        write(&window.join(".submission/submission.yaml"), "status: [");
        let state = scanner.scan_window(&ScanContext::new(), "ET-0004", "2025").unwrap();
        assert_eq!(state.file_count, 1);
        assert_eq!(state.submission_status, None);
    }

    #[test]
    fn test_structured_layout_reads_evidence_and_metadata_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let scanner = EvidenceScanner::new(StorePaths::new(tmp.path())).with_layout(LayoutMode::Structured);
        let window = tmp.path().join("evidence/ET-0005/2025-Q2");
        write(&window.join("README.md"), "# layout");
        write(&window.join("evidence/policy.md"), "# policy");
        write(
            &window.join("metadata/submission.yaml"),
            "task_ref: ET-0005\nwindow: 2025-Q2\nstatus: validated\ncreated_at: 2025-06-01T00:00:00Z\n",
        );

        let state = scanner.scan_window(&ScanContext::new(), "ET-0005", "2025-Q2").unwrap();
        assert_eq!(state.file_count, 1);
        assert_eq!(state.files[0].filename, "policy.md");
        assert_eq!(state.submission_status, Some(SubmissionStatus::Validated));
    }

    #[test]
    fn test_window_with_only_collection_plan_has_no_evidence() {
        let (tmp, scanner) = setup();
        let window = tmp.path().join("evidence/ET-0006/2025-Q3");
        write(&window.join("collection_plan.md"), "# plan");
        write(&window.join("collection_plan_metadata.yaml"), "tasks: []");

        let state = scanner.scan_window(&ScanContext::new(), "ET-0006", "2025-Q3").unwrap();
        assert_eq!(state.file_count, 0);
        assert!(state.files.is_empty());
        let listed = collect_evidence_files(scanner.paths(), &window).unwrap();
        assert!(listed.is_empty());

        let task = scanner.scan_task(&ScanContext::new(), "ET-0006").unwrap();
        assert_eq!(task.local_state, LocalEvidenceState::NoEvidence);
    }

    #[test]
    fn test_unreadable_file_is_still_listed() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = StorePaths::new(tmp.path());
        let path = tmp.path().join("evidence/ET-0007/2025/vanished.csv");

        let listed = evidence_file_ref(&paths, &path, "vanished.csv".to_string(), None);
        assert_eq!(listed.filename, "vanished.csv");
        assert_eq!(listed.relative_path, "evidence/ET-0007/2025/vanished.csv");
        assert_eq!(listed.size_bytes, 0);
        assert!(listed.checksum_sha256.is_empty());
        assert!(!listed.is_verified());
    }

    #[test]
    fn test_scan_task_missing_is_empty() {
        let (_tmp, scanner) = setup();
        let state = scanner.scan_task(&ScanContext::new(), "ET-0099").unwrap();
        assert_eq!(state.task_id, 99);
        assert_eq!(state.local_state, LocalEvidenceState::NoEvidence);
        assert!(state.windows.is_empty());
    }

    #[test]
    fn test_scan_window_missing_is_not_found() {
        let (_tmp, scanner) = setup();
        let err = scanner
            .scan_window(&ScanContext::new(), "ET-0099", "2025")
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_scan_all_skips_non_task_dirs_and_honors_cancel() {
        let (tmp, scanner) = setup();
        write(&tmp.path().join("evidence/ET-0001_Github_Access/2025-Q4/a.csv"), "x");
        write(&tmp.path().join("evidence/ET-0002/2025/b.csv"), "y");
        write(&tmp.path().join("evidence/notes/2025/c.csv"), "z");

        let states = scanner.scan_all(&ScanContext::new()).unwrap();
        assert_eq!(states.len(), 2);
        let first = &states["ET-0001"];
        assert_eq!(first.task_name, "Github Access");
        assert_eq!(first.local_state, LocalEvidenceState::Generated);
        assert!(first
            .applicable_tools
            .contains(&"github-permissions".to_string()));

        let ctx = ScanContext::new();
        ctx.cancel();
        assert!(matches!(scanner.scan_all(&ctx), Err(EvidenceError::Cancelled)));
    }

    #[test]
    fn test_collect_evidence_files_skips_planning_files() {
        let (tmp, scanner) = setup();
        let window = tmp.path().join("evidence/ET-0001/2025-Q4");
        write(&window.join("a.csv"), "test");
        write(&window.join("collection_plan.md"), "plan");
        write(&window.join(".submission/submission.yaml"), "x: 1");

        let files = collect_evidence_files(scanner.paths(), &window).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].relative_path, "evidence/ET-0001/2025-Q4/a.csv");
        assert_eq!(
            files[0].checksum_sha256,
            "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
        );
    }
}
