//! Submission workflow
//!
//! Drives one task/window from inventory to platform acknowledgement:
//! resubmission guard, readiness validation, payload assembly, the platform
//! call, then record keeping and staging. [`BatchRunner`] applies the same
//! flow to every task of a [`SubmissionBatch`].

use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::Utc;
use evidence_core::{
    BatchStatus, BatchSubmissionResult, EvidenceError, EvidenceSubmission, Metadata,
    PlatformAcknowledgement, Result, ScanContext, SubmissionBatch, SubmissionHistoryEntry,
    ValidationMode, ValidationResult,
};
use evidence_quality::{ValidationEngine, ValidationProfile};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::batch::BatchManager;
use crate::coordinator::SubmissionCoordinator;

/// Compliance platform endpoint. The HTTP client lives outside this crate.
pub trait PlatformClient: Send + Sync {
    fn submit(&self, payload: &SubmissionPayload) -> Result<PlatformAcknowledgement>;
}

/// MIME type inferred from a file extension
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = std::path::Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "pdf" => "application/pdf",
        "png" => "image/png",
        "gif" => "image/gif",
        "jpg" | "jpeg" => "image/jpeg",
        "md" => "text/markdown",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "odt" => "application/vnd.oasis.opendocument.text",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayloadFile {
    pub filename: String,
    /// Absolute location on disk
    pub path: PathBuf,
    pub content_type: String,
    pub size_bytes: u64,
    pub checksum_sha256: String,
}

/// Everything the platform receives for one task/window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub task_ref: String,
    pub window: String,
    pub files: Vec<PayloadFile>,
    /// Deduplicated, sorted
    pub controls_covered: Vec<String>,
    /// Tools that produced the files; deduplicated, sorted
    pub sources: Vec<String>,
    pub submitted_by: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    /// Markdown summary of the submission
    pub summary: String,
}

impl SubmissionPayload {
    pub fn build(submission: &EvidenceSubmission, data_root: &std::path::Path) -> Self {
        let controls: BTreeSet<String> = submission
            .evidence_files
            .iter()
            .flat_map(|f| f.controls_satisfied.iter().cloned())
            .collect();
        let sources: BTreeSet<String> = submission
            .evidence_files
            .iter()
            .filter(|f| !f.source.is_empty())
            .map(|f| f.source.clone())
            .collect();
        let files = submission
            .evidence_files
            .iter()
            .map(|f| PayloadFile {
                filename: f.filename.clone(),
                path: data_root.join(&f.relative_path),
                content_type: content_type_for(&f.filename).to_string(),
                size_bytes: f.size_bytes,
                checksum_sha256: f.checksum_sha256.clone(),
            })
            .collect();

        Self {
            task_ref: submission.task_ref.clone(),
            window: submission.window.clone(),
            files,
            controls_covered: controls.into_iter().collect(),
            sources: sources.into_iter().collect(),
            submitted_by: submission.submitted_by.clone(),
            notes: submission.notes.clone(),
            summary: summary(submission),
        }
    }
}

fn summary(submission: &EvidenceSubmission) -> String {
    let mut out = format!(
        "# Evidence Submission: {}\n\n**Collection Window**: {}\n\n**Files Submitted**: {}\n\n",
        submission.task_ref,
        submission.window,
        submission.evidence_files.len()
    );
    for file in &submission.evidence_files {
        out.push_str(&format!("- {} ({} bytes)\n", file.filename, file.size_bytes));
    }
    if !submission.notes.is_empty() {
        out.push_str(&format!("\n## Notes\n\n{}\n", submission.notes));
    }
    out
}

/// `local-<unix secs>-<6 hex>`, used when the platform returns no id
pub fn local_submission_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("local-{}-{}", Utc::now().timestamp(), &suffix[..6])
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionRequest {
    pub task_ref: String,
    pub window: String,
    pub notes: String,
    pub submitted_by: String,
    pub validation_mode: ValidationMode,
    pub batch_id: Option<String>,
    pub batch_name: Option<String>,
}

impl SubmissionRequest {
    pub fn new(task_ref: impl Into<String>, window: impl Into<String>) -> Self {
        Self {
            task_ref: task_ref.into(),
            window: window.into(),
            notes: String::new(),
            submitted_by: String::new(),
            validation_mode: ValidationMode::default(),
            batch_id: None,
            batch_name: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_submitter(mut self, submitted_by: impl Into<String>) -> Self {
        self.submitted_by = submitted_by.into();
        self
    }

    pub fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.validation_mode = mode;
        self
    }

    pub fn in_batch(mut self, batch_id: impl Into<String>, batch_name: Option<String>) -> Self {
        self.batch_id = Some(batch_id.into());
        self.batch_name = batch_name;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Submitted {
        submission: Box<EvidenceSubmission>,
        validation: Option<ValidationResult>,
    },
    /// Evidence was not ready; the platform was not contacted.
    ValidationFailed { validation: ValidationResult },
}

impl SubmissionOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted { .. })
    }

    pub fn submission_id(&self) -> Option<&str> {
        match self {
            Self::Submitted { submission, .. } => submission.submission_id.as_deref(),
            Self::ValidationFailed { .. } => None,
        }
    }

    /// "submitted", "accepted" or "validation_failed"
    pub fn status(&self) -> &'static str {
        match self {
            Self::Submitted { submission, .. } => submission.status.as_str(),
            Self::ValidationFailed { .. } => "validation_failed",
        }
    }
}

pub struct SubmissionWorkflow<'a> {
    coordinator: &'a SubmissionCoordinator,
    profile: ValidationProfile,
}

impl<'a> SubmissionWorkflow<'a> {
    pub fn new(coordinator: &'a SubmissionCoordinator) -> Self {
        Self {
            coordinator,
            profile: ValidationProfile::default(),
        }
    }

    /// Thresholds and limits for every run; the mode comes from each request.
    pub fn with_profile(mut self, profile: ValidationProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn coordinator(&self) -> &SubmissionCoordinator {
        self.coordinator
    }

    pub fn submit(&self, request: &SubmissionRequest, client: &dyn PlatformClient) -> Result<SubmissionOutcome> {
        let task_ref = request.task_ref.as_str();
        let window = request.window.as_str();
        let coordinator = self.coordinator;

        coordinator.ensure_not_submitted(task_ref, window)?;
        let files = coordinator.evidence_files(task_ref, window)?;

        let validation = if request.validation_mode == ValidationMode::Skip {
            None
        } else {
            let engine = ValidationEngine::new(self.profile.clone().with_mode(request.validation_mode));
            let result = engine.validate(task_ref, window, files.clone(), Some(coordinator.paths().data_root()));
            coordinator.save_validation_result(task_ref, window, &result)?;
            if !result.ready_for_submission {
                info!(
                    task_ref,
                    window,
                    failed_checks = result.failed_checks,
                    "evidence not ready, submission withheld"
                );
                return Ok(SubmissionOutcome::ValidationFailed { validation: result });
            }
            Some(result)
        };

        let mut submission = match coordinator.load_submission(task_ref, window) {
            Ok(existing) => existing,
            Err(err) if err.is_not_found() => EvidenceSubmission::draft(task_ref, window),
            Err(err) => return Err(err),
        };
        submission.set_files(files);
        submission.submitted_by = request.submitted_by.clone();
        submission.notes = request.notes.clone();
        submission.batch_id = request.batch_id.clone();
        submission.batch_name = request.batch_name.clone();
        if let Some(result) = &validation {
            submission.apply_validation(result);
        }

        let payload = SubmissionPayload::build(&submission, coordinator.paths().data_root());
        let mut ack = match client.submit(&payload) {
            Ok(ack) => ack,
            Err(err) => {
                error!(task_ref, window, error = %err, "platform submission failed");
                submission.platform_response = Some(PlatformAcknowledgement {
                    submission_id: String::new(),
                    status: "failed".to_string(),
                    message: Some(err.to_string()),
                    received_at: Utc::now(),
                    metadata: Metadata::new(),
                });
                coordinator.save_submission(&submission)?;
                return Err(err);
            }
        };
        if ack.submission_id.is_empty() {
            ack.submission_id = local_submission_id();
        }

        submission.mark_submitted(ack);
        coordinator.save_submission(&submission)?;
        coordinator.move_evidence_files_to_submitted(task_ref, window, &submission.evidence_files)?;

        let entry = SubmissionHistoryEntry::from_submission(&submission);
        if let Err(err) = coordinator.add_submission_history(task_ref, window, entry) {
            warn!(task_ref, window, error = %err, "failed to record submission history");
        }

        info!(
            task_ref,
            window,
            submission_id = submission.submission_id.as_deref().unwrap_or_default(),
            files = submission.total_file_count,
            "evidence submitted"
        );
        Ok(SubmissionOutcome::Submitted {
            submission: Box::new(submission),
            validation,
        })
    }
}

/// Runs a batch through the workflow, one window per task.
pub struct BatchRunner<'a> {
    workflow: &'a SubmissionWorkflow<'a>,
    batches: &'a BatchManager,
    window: String,
}

impl<'a> BatchRunner<'a> {
    pub fn new(workflow: &'a SubmissionWorkflow<'a>, batches: &'a BatchManager, window: impl Into<String>) -> Self {
        Self {
            workflow,
            batches,
            window: window.into(),
        }
    }

    /// Submit every task of the batch. The manifest is saved after each task;
    /// without `continue_on_error` the first failure marks the remaining
    /// tasks skipped and fails the batch.
    pub fn run(
        &self,
        ctx: &ScanContext,
        mut batch: SubmissionBatch,
        client: &dyn PlatformClient,
    ) -> Result<SubmissionBatch> {
        batch.status = BatchStatus::Submitting;
        batch.started_at = Some(Utc::now());
        batch.recount();
        self.batches.save_batch(&batch)?;
        info!(batch_id = %batch.batch_id, tasks = batch.total_tasks, "batch started");

        let task_refs = batch.task_refs.clone();
        let mut aborted = false;
        for (index, task_ref) in task_refs.iter().enumerate() {
            if let Err(err) = ctx.check() {
                self.finish(&mut batch, BatchStatus::Failed)?;
                return Err(err);
            }

            let result = self.run_task(&batch, task_ref, client);
            let failed = result.status == evidence_core::BatchTaskStatus::Failed;
            batch.record_result(result);
            self.batches.save_batch(&batch)?;

            if failed && !batch.continue_on_error {
                warn!(batch_id = %batch.batch_id, task_ref = %task_ref, "stopping batch after failure");
                for remaining in &task_refs[index + 1..] {
                    batch.record_result(BatchSubmissionResult::skipped(
                        remaining.clone(),
                        format!("batch stopped after {task_ref} failed"),
                    ));
                }
                aborted = true;
                break;
            }
        }

        let status = if aborted || (batch.total_tasks > 0 && batch.submitted_tasks == 0) {
            BatchStatus::Failed
        } else {
            BatchStatus::Completed
        };
        self.finish(&mut batch, status)?;
        Ok(batch)
    }

    fn run_task(&self, batch: &SubmissionBatch, task_ref: &str, client: &dyn PlatformClient) -> BatchSubmissionResult {
        let request = SubmissionRequest::new(task_ref, self.window.clone())
            .with_submitter(batch.created_by.clone())
            .with_notes(batch.notes.clone())
            .with_validation_mode(batch.validation_mode)
            .in_batch(batch.batch_id.clone(), batch.batch_name.clone());

        match self.workflow.submit(&request, client) {
            Ok(SubmissionOutcome::Submitted { submission, .. }) => {
                let mut result = BatchSubmissionResult::submitted(
                    task_ref,
                    submission.submission_id.clone().unwrap_or_default(),
                );
                result.submitted_at = submission.submitted_at;
                result
            }
            Ok(SubmissionOutcome::ValidationFailed { validation }) => BatchSubmissionResult::failed(
                task_ref,
                format!(
                    "validation failed: {} error(s), {} warning(s)",
                    validation.errors.len(),
                    validation.warnings_list.len()
                ),
            ),
            Err(EvidenceError::AlreadySubmitted { .. }) => {
                BatchSubmissionResult::skipped(task_ref, "already submitted")
            }
            Err(err) => BatchSubmissionResult::failed(task_ref, err.to_string()),
        }
    }

    fn finish(&self, batch: &mut SubmissionBatch, status: BatchStatus) -> Result<()> {
        batch.status = status;
        batch.completed_at = Some(Utc::now());
        self.batches.save_batch(batch)?;
        info!(
            batch_id = %batch.batch_id,
            status = ?batch.status,
            submitted = batch.submitted_tasks,
            failed = batch.failed_tasks,
            "batch finished"
        );
        Ok(())
    }
}
