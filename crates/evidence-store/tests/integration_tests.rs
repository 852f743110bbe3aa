//! Integration tests for evidence-store.
//!
//! Each test builds a data root in a temp directory and drives the public
//! components the way an embedding CLI would.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};
use evidence_core::{
    BatchStatus, BatchSubmissionResult, BatchTaskStatus, EngineConfig, EvidenceError,
    EvidenceFileRef, EvidenceSubmission, LayoutMode, LocalEvidenceState, Metadata,
    PlatformAcknowledgement, Result, ScanContext, SubmissionBatch, SubmissionHistoryEntry,
    SubmissionStatus,
};
use evidence_store::{
    new_batch_id, BatchManager, BatchRunner, DocumentRenderer, EvidenceCleaner, EvidenceScanner,
    EvidenceStore, FileVerdict, PlatformClient, Stage, StorePaths, SubmissionCoordinator,
    SubmissionPayload, SubmissionRequest, SubmissionWorkflow,
};
use tempfile::TempDir;

fn init() {
    evidence_core::telemetry::init_tracing("evidence_store=debug");
}

fn window_dir(root: &Path, task_dir: &str, window: &str) -> PathBuf {
    let dir = root.join("evidence").join(task_dir).join(window);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn seed(root: &Path, task_dir: &str, window: &str, files: &[(&str, &str)]) -> PathBuf {
    let dir = window_dir(root, task_dir, window);
    for (name, content) in files {
        fs::write(dir.join(name), content).unwrap();
    }
    dir
}

fn file_ref(name: &str, size: u64) -> EvidenceFileRef {
    EvidenceFileRef {
        filename: name.to_string(),
        relative_path: format!("evidence/ET-0001_Access_Review/2025-Q4/{name}"),
        title: name.to_string(),
        source: "github-permissions".to_string(),
        size_bytes: size,
        checksum_sha256: String::new(),
        controls_satisfied: vec!["CC6.1".to_string()],
    }
}

/// Acknowledges every payload, failing for the task refs it is told to.
struct ScriptedClient {
    fail_for: Vec<&'static str>,
    seen: Mutex<Vec<String>>,
}

impl ScriptedClient {
    fn new(fail_for: Vec<&'static str>) -> Self {
        Self {
            fail_for,
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl PlatformClient for ScriptedClient {
    fn submit(&self, payload: &SubmissionPayload) -> Result<PlatformAcknowledgement> {
        self.seen.lock().unwrap().push(payload.task_ref.clone());
        if self.fail_for.contains(&payload.task_ref.as_str()) {
            return Err(EvidenceError::InvalidInput("platform rejected upload".into()));
        }
        Ok(PlatformAcknowledgement {
            submission_id: format!("sub-{}", payload.task_ref),
            status: "received".to_string(),
            message: Some("queued for review".to_string()),
            received_at: Utc::now(),
            metadata: Metadata::new(),
        })
    }
}

/// Writes a stub PDF next to each markdown file.
struct StubPdfRenderer;

impl DocumentRenderer for StubPdfRenderer {
    fn extension(&self) -> &str {
        "pdf"
    }

    fn render(&self, _input: &Path, output: &Path, title: &str, _subject: &str) -> Result<()> {
        fs::write(output, format!("%PDF {title}")).map_err(|e| EvidenceError::io("write", output, e))
    }
}

// =============================================================================
// Submission Records
// =============================================================================

#[test]
fn test_initialize_then_save_loads_draft() {
    let tmp = TempDir::new().unwrap();
    window_dir(tmp.path(), "ET-0001_Access_Review", "2025-Q4");
    let coordinator = SubmissionCoordinator::new(StorePaths::new(tmp.path()));

    coordinator
        .initialize_submission_metadata("ET-0001", "2025-Q4")
        .unwrap();
    let mut submission =
        EvidenceSubmission::draft("ET-0001", "2025-Q4").with_submitter("test@example.com");
    submission.set_files(vec![
        file_ref("01_github_access.md", 4_096),
        file_ref("02_team_membership.csv", 8_000),
        file_ref("03_admin_list.json", 362),
    ]);
    coordinator.save_submission(&submission).unwrap();

    let loaded = coordinator.load_submission("ET-0001", "2025-Q4").unwrap();
    assert_eq!(loaded.status, SubmissionStatus::Draft);
    assert_eq!(loaded.total_file_count, 3);
    assert_eq!(loaded.total_size_bytes, 12_458);
    assert_eq!(loaded.submitted_by, "test@example.com");
    assert_eq!(loaded, submission);
    assert!(coordinator
        .load_submission_history("ET-0001", "2025-Q4")
        .unwrap_err()
        .is_not_found());

    // initializing again leaves the saved record alone
    coordinator
        .initialize_submission_metadata("ET-0001", "2025-Q4")
        .unwrap();
    assert_eq!(
        coordinator.load_submission("ET-0001", "2025-Q4").unwrap(),
        submission
    );
}

#[test]
fn test_history_is_most_recent_first() {
    let tmp = TempDir::new().unwrap();
    window_dir(tmp.path(), "ET-0001", "2025-Q4");
    let coordinator = SubmissionCoordinator::new(StorePaths::new(tmp.path()));
    let t0 = Utc::now() - Duration::days(1);

    let entry = |id: &str, at| SubmissionHistoryEntry {
        submission_id: id.to_string(),
        submitted_at: at,
        submitted_by: "test@example.com".to_string(),
        status: SubmissionStatus::Submitted,
        file_count: 3,
        notes: String::new(),
        batch_id: None,
    };
    coordinator
        .add_submission_history("ET-0001", "2025-Q4", entry("sub-001", t0))
        .unwrap();
    coordinator
        .add_submission_history("ET-0001", "2025-Q4", entry("sub-002", t0 + Duration::hours(1)))
        .unwrap();

    let history = coordinator
        .load_submission_history("ET-0001", "2025-Q4")
        .unwrap();
    let ids: Vec<&str> = history
        .entries
        .iter()
        .map(|e| e.submission_id.as_str())
        .collect();
    assert_eq!(ids, vec!["sub-002", "sub-001"]);
}

#[test]
fn test_missing_and_corrupt_records_are_distinct() {
    let tmp = TempDir::new().unwrap();
    let dir = window_dir(tmp.path(), "ET-0005", "2025");
    let coordinator = SubmissionCoordinator::new(StorePaths::new(tmp.path()));

    let missing = coordinator.load_submission("ET-0005", "2025").unwrap_err();
    assert!(missing.is_not_found());
    assert!(!coordinator.submission_exists("ET-0005", "2025"));

    fs::create_dir_all(dir.join(".submission")).unwrap();
    fs::write(dir.join(".submission/submission.yaml"), "status: [broken").unwrap();
    let corrupt = coordinator.load_submission("ET-0005", "2025").unwrap_err();
    assert!(corrupt.is_malformed());
    assert!(!corrupt.is_not_found());
}

// =============================================================================
// Resubmission Guard
// =============================================================================

#[test]
fn test_check_already_submitted_transitions() {
    let tmp = TempDir::new().unwrap();
    let dir = seed(tmp.path(), "ET-0001", "2025-Q4", &[("users.csv", "id\n1\n")]);
    let coordinator = SubmissionCoordinator::new(StorePaths::new(tmp.path()));

    assert!(!coordinator.check_already_submitted("ET-0001", "2025-Q4"));

    fs::create_dir_all(dir.join(".submitted")).unwrap();
    assert!(!coordinator.check_already_submitted("ET-0001", "2025-Q4"));

    fs::write(dir.join(".submitted/.keep"), "").unwrap();
    assert!(!coordinator.check_already_submitted("ET-0001", "2025-Q4"));

    let files = coordinator.evidence_files("ET-0001", "2025-Q4").unwrap();
    let moved = coordinator
        .move_evidence_files_to_submitted("ET-0001", "2025-Q4", &files)
        .unwrap();
    assert_eq!(moved, 1);
    assert!(coordinator.check_already_submitted("ET-0001", "2025-Q4"));
    assert!(matches!(
        coordinator.ensure_not_submitted("ET-0001", "2025-Q4"),
        Err(EvidenceError::AlreadySubmitted { .. })
    ));
}

#[test]
fn test_workflow_refuses_resubmission_and_verifies_files() {
    init();
    let tmp = TempDir::new().unwrap();
    seed(
        tmp.path(),
        "ET-0001_Access_Review",
        "2025-Q4",
        &[("users.csv", "id,name\n1,ana\n"), ("policy.md", "# Access policy\n")],
    );
    let coordinator = SubmissionCoordinator::new(StorePaths::new(tmp.path()));
    let workflow = SubmissionWorkflow::new(&coordinator);
    let client = ScriptedClient::new(vec![]);
    let request = SubmissionRequest::new("ET-0001", "2025-Q4").with_submitter("test@example.com");

    let outcome = workflow.submit(&request, &client).unwrap();
    assert_eq!(outcome.submission_id(), Some("sub-ET-0001"));

    let verified = coordinator
        .verify_submission_files("ET-0001", "2025-Q4")
        .unwrap();
    assert_eq!(verified.len(), 2);
    assert!(verified.iter().all(|v| v.verdict == FileVerdict::Verified));

    let submitted = tmp
        .path()
        .join("evidence/ET-0001_Access_Review/2025-Q4/.submitted/users.csv");
    fs::write(&submitted, "tampered").unwrap();
    let after = coordinator
        .verify_submission_files("ET-0001", "2025-Q4")
        .unwrap();
    let users = after.iter().find(|v| v.filename == "users.csv").unwrap();
    assert!(matches!(users.verdict, FileVerdict::Mismatch { .. }));

    let refused = workflow.submit(&request, &client).unwrap_err();
    assert!(matches!(refused, EvidenceError::AlreadySubmitted { .. }));
    assert_eq!(client.seen.lock().unwrap().len(), 1);
}

#[test]
fn test_failed_move_after_acknowledgement_still_blocks_resubmission() {
    init();
    let tmp = TempDir::new().unwrap();
    let dir = seed(
        tmp.path(),
        "ET-0001_Access_Review",
        "2025-Q4",
        &[("users.csv", "id,name\n1,ana\n"), ("policy.md", "# Access policy\n")],
    );
    // a regular file where `.submitted/` should go makes the move fail
    fs::write(dir.join(".submitted"), "").unwrap();
    let coordinator = SubmissionCoordinator::new(StorePaths::new(tmp.path()));
    let workflow = SubmissionWorkflow::new(&coordinator);
    let client = ScriptedClient::new(vec![]);
    let request = SubmissionRequest::new("ET-0001", "2025-Q4").with_submitter("test@example.com");

    assert!(workflow.submit(&request, &client).is_err());
    let stored = coordinator.load_submission("ET-0001", "2025-Q4").unwrap();
    assert_eq!(stored.status, SubmissionStatus::Submitted);
    assert_eq!(stored.submission_id.as_deref(), Some("sub-ET-0001"));
    assert!(!coordinator.check_already_submitted("ET-0001", "2025-Q4"));
    assert!(dir.join("users.csv").is_file());

    let refused = workflow.submit(&request, &client).unwrap_err();
    assert!(matches!(refused, EvidenceError::AlreadySubmitted { .. }));
    assert_eq!(client.seen.lock().unwrap().len(), 1);
}

// =============================================================================
// Batches
// =============================================================================

#[test]
fn test_batch_continue_on_error_records_both_outcomes() {
    init();
    let tmp = TempDir::new().unwrap();
    seed(tmp.path(), "ET-0001", "2025-Q4", &[("a.csv", "a\n"), ("b.md", "# b\n")]);
    seed(tmp.path(), "ET-0002", "2025-Q4", &[("c.csv", "c\n"), ("d.md", "# d\n")]);
    let paths = StorePaths::new(tmp.path());
    let coordinator = SubmissionCoordinator::new(paths.clone());
    let workflow = SubmissionWorkflow::new(&coordinator);
    let manager = BatchManager::new(paths);
    let runner = BatchRunner::new(&workflow, &manager, "2025-Q4");
    let client = ScriptedClient::new(vec!["ET-0002"]);

    let batch = SubmissionBatch::new(new_batch_id(), vec!["ET-0001".into(), "ET-0002".into()])
        .with_name("Q4 access reviews")
        .with_continue_on_error(true);
    let done = runner.run(&ScanContext::new(), batch, &client).unwrap();
    assert_eq!(done.status, BatchStatus::Completed);
    assert!(done.started_at.is_some() && done.completed_at.is_some());

    let listed = manager.list_batches(&ScanContext::new()).unwrap();
    assert_eq!(listed.len(), 1);
    let batch = &listed[0];
    assert_eq!(batch.total_tasks, 2);
    assert_eq!(batch.submitted_tasks + batch.failed_tasks, batch.total_tasks);
    let status_of = |task: &str| {
        batch
            .submissions
            .iter()
            .find(|r| r.task_ref == task)
            .map(|r| r.status)
    };
    assert_eq!(status_of("ET-0001"), Some(BatchTaskStatus::Submitted));
    assert_eq!(status_of("ET-0002"), Some(BatchTaskStatus::Failed));
    assert!(coordinator.check_already_submitted("ET-0001", "2025-Q4"));
    assert!(!coordinator.check_already_submitted("ET-0002", "2025-Q4"));
}

#[test]
fn test_list_batches_skips_corrupt_and_sorts_newest_first() {
    let tmp = TempDir::new().unwrap();
    let manager = BatchManager::new(StorePaths::new(tmp.path()));

    let mut older = SubmissionBatch::new("batch-older", vec!["ET-0001".into()]);
    older.created_at = Utc::now() - Duration::hours(2);
    older.record_result(BatchSubmissionResult::submitted("ET-0001", "sub-1"));
    let newer = SubmissionBatch::new("batch-newer", vec!["ET-0002".into()]);
    manager.save_batch(&older).unwrap();
    manager.save_batch(&newer).unwrap();

    let corrupt = tmp.path().join("submissions/batch-corrupt");
    fs::create_dir_all(&corrupt).unwrap();
    fs::write(corrupt.join("manifest.yaml"), "batch_id: [").unwrap();

    let listed = manager.list_batches(&ScanContext::new()).unwrap();
    let ids: Vec<&str> = listed.iter().map(|b| b.batch_id.as_str()).collect();
    assert_eq!(ids, vec!["batch-newer", "batch-older"]);
    assert!(manager.load_batch("batch-corrupt").unwrap_err().is_malformed());
    assert!(manager.load_batch("batch-absent").unwrap_err().is_not_found());
}

// =============================================================================
// Scanning and State
// =============================================================================

#[test]
fn test_store_scan_reflects_lifecycle() {
    init();
    let tmp = TempDir::new().unwrap();
    seed(
        tmp.path(),
        "ET-0001_Access_Review",
        "2025-Q4",
        &[("users.csv", "id\n1\n"), ("policy.md", "# p\n")],
    );
    seed(tmp.path(), "ET-0002_Change_Management", "2025", &[]);
    let store = EvidenceStore::new(EngineConfig::default().with_data_root(tmp.path()));
    let ctx = ScanContext::new();

    store.refresh_state(&ctx).unwrap();
    assert_eq!(store.state().len(), 2);
    assert_eq!(
        store.state().get("ET-0001").unwrap().local_state,
        LocalEvidenceState::Generated
    );
    assert_eq!(
        store.state().get("ET-0002").unwrap().local_state,
        LocalEvidenceState::NoEvidence
    );

    let outcome = store
        .workflow()
        .submit(&SubmissionRequest::new("ET-0001", "2025-Q4"), &ScriptedClient::new(vec![]))
        .unwrap();
    assert!(outcome.is_submitted());

    store.refresh_state(&ctx).unwrap();
    let task = store.state().get("ET-0001").unwrap();
    assert_eq!(task.local_state, LocalEvidenceState::Submitted);
    let window = &task.windows["2025-Q4"];
    assert_eq!(window.file_count, 0);
    assert_eq!(window.submission_id.as_deref(), Some("sub-ET-0001"));
    assert_eq!(store.state().tasks_by_state(LocalEvidenceState::Submitted).len(), 1);

    let reopened = EvidenceStore::new(EngineConfig::default().with_data_root(tmp.path()));
    assert_eq!(reopened.state().len(), 2);
}

#[test]
fn test_structured_layout_scan() {
    let tmp = TempDir::new().unwrap();
    let dir = window_dir(tmp.path(), "ET-0007", "2025-H1");
    fs::create_dir_all(dir.join("evidence")).unwrap();
    fs::write(dir.join("evidence/report.json"), "{}").unwrap();

    let scanner = EvidenceScanner::new(StorePaths::new(tmp.path())).with_layout(LayoutMode::Structured);
    let window = scanner
        .scan_window(&ScanContext::new(), "ET-0007", "2025-H1")
        .unwrap();
    assert_eq!(window.file_count, 1);
    assert!(scanner
        .scan_window(&ScanContext::new(), "ET-0007", "2024")
        .unwrap_err()
        .is_not_found());
}

// =============================================================================
// Staging and Cleanup
// =============================================================================

#[test]
fn test_stage_moves_render_on_ready() {
    let tmp = TempDir::new().unwrap();
    let dir = seed(
        tmp.path(),
        "ET-0003",
        "2025-10",
        &[("summary.md", "# Summary\n"), ("data.csv", "x\n")],
    );
    let coordinator = SubmissionCoordinator::new(StorePaths::new(tmp.path()))
        .with_renderer(Arc::new(StubPdfRenderer));

    let to_wip = coordinator
        .move_stage("ET-0003", "2025-10", Stage::Root, Stage::Wip)
        .unwrap();
    assert_eq!(to_wip.moved.len(), 2);
    assert!(to_wip.rendered.is_empty());

    let to_ready = coordinator
        .move_stage("ET-0003", "2025-10", Stage::Wip, Stage::Ready)
        .unwrap();
    assert_eq!(to_ready.rendered, vec!["summary.md".to_string()]);
    assert!(dir.join("ready/summary.pdf").is_file());
    assert!(dir.join("ready/summary.md").is_file());

    let ready_files = coordinator
        .evidence_files_in_stage("ET-0003", "2025-10", Stage::Ready)
        .unwrap();
    assert_eq!(ready_files.len(), 3);
    assert!(coordinator
        .move_stage("ET-0003", "2025-10", Stage::Ready, Stage::Ready)
        .is_err());
}

#[test]
fn test_cleanup_archives_submitted_flat_windows() {
    let tmp = TempDir::new().unwrap();
    let done = seed(tmp.path(), "ET-0008", "2024-Q4", &[("old.csv", "x\n")]);
    fs::create_dir_all(done.join(".submission")).unwrap();
    let mut record = EvidenceSubmission::draft("ET-0008", "2024-Q4");
    record.status = SubmissionStatus::Submitted;
    fs::write(
        done.join(".submission/submission.yaml"),
        serde_yaml::to_string(&record).unwrap(),
    )
    .unwrap();
    let open = seed(tmp.path(), "ET-0009", "2025-Q1", &[("new.csv", "y\n")]);
    // a draft record alone does not mean the evidence went out
    fs::create_dir_all(open.join(".submission")).unwrap();
    fs::write(
        open.join(".submission/submission.yaml"),
        serde_yaml::to_string(&EvidenceSubmission::draft("ET-0009", "2025-Q1")).unwrap(),
    )
    .unwrap();

    let paths = StorePaths::new(tmp.path());
    let cleaner = EvidenceCleaner::new(paths.clone());
    let summary = cleaner
        .organize_all(&ScanContext::new(), &EvidenceScanner::new(paths), false)
        .unwrap();

    assert_eq!(summary.total_windows, 2);
    assert_eq!(summary.windows_cleaned, 2);
    assert_eq!(summary.files_organized, 1);
    assert!(summary.errors.is_empty());
    assert!(done.join("archive/old.csv").is_file());
    assert!(done.join("archive/.submission/submission.yaml").is_file());
    assert!(open.join("new.csv").is_file());
    assert!(!open.join("archive").exists());
}
