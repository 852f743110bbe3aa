//! Submission batches
//!
//! A batch groups several task submissions. The manifest only records what
//! happened; whether to stop at the first failure is the runner's call,
//! driven by `continue_on_error`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::ValidationMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    #[default]
    Draft,
    Validating,
    Submitting,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchTaskStatus {
    #[default]
    Pending,
    Submitted,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSubmissionResult {
    pub task_ref: String,
    pub status: BatchTaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,
}

impl BatchSubmissionResult {
    pub fn submitted(task_ref: impl Into<String>, submission_id: impl Into<String>) -> Self {
        Self {
            task_ref: task_ref.into(),
            status: BatchTaskStatus::Submitted,
            submission_id: Some(submission_id.into()),
            error: None,
            submitted_at: Some(Utc::now()),
        }
    }

    pub fn failed(task_ref: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            task_ref: task_ref.into(),
            status: BatchTaskStatus::Failed,
            submission_id: None,
            error: Some(error.into()),
            submitted_at: None,
        }
    }

    pub fn skipped(task_ref: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            task_ref: task_ref.into(),
            status: BatchTaskStatus::Skipped,
            submission_id: None,
            error: Some(reason.into()),
            submitted_at: None,
        }
    }
}

/// Manifest for a group of submissions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionBatch {
    // === Identity ===

    /// Time-ordered id (batch-20251022-143052-a1b2c3)
    pub batch_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_name: Option<String>,

    pub status: BatchStatus,

    // === Tasks ===

    pub task_refs: Vec<String>,
    pub total_tasks: usize,
    pub submitted_tasks: usize,
    pub failed_tasks: usize,

    // === Timestamps ===

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    // === Metadata ===

    #[serde(default)]
    pub created_by: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    // === Policy ===

    pub validation_mode: ValidationMode,

    #[serde(default)]
    pub continue_on_error: bool,

    // === Results ===

    #[serde(default)]
    pub submissions: Vec<BatchSubmissionResult>,
}

impl SubmissionBatch {
    pub fn new(batch_id: impl Into<String>, task_refs: Vec<String>) -> Self {
        Self {
            batch_id: batch_id.into(),
            batch_name: None,
            status: BatchStatus::Draft,
            total_tasks: task_refs.len(),
            task_refs,
            submitted_tasks: 0,
            failed_tasks: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            created_by: String::new(),
            notes: String::new(),
            tags: Vec::new(),
            validation_mode: ValidationMode::default(),
            continue_on_error: false,
            submissions: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.batch_name = Some(name.into());
        self
    }

    pub fn with_creator(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }

    pub fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.validation_mode = mode;
        self
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    /// Record a per-task outcome, replacing any earlier outcome for the same task.
    pub fn record_result(&mut self, result: BatchSubmissionResult) {
        self.submissions.retain(|r| r.task_ref != result.task_ref);
        self.submissions.push(result);
        self.recount();
    }

    /// Recompute the counters from the recorded results.
    pub fn recount(&mut self) {
        self.total_tasks = self.task_refs.len();
        self.submitted_tasks = self
            .submissions
            .iter()
            .filter(|r| r.status == BatchTaskStatus::Submitted)
            .count();
        self.failed_tasks = self
            .submissions
            .iter()
            .filter(|r| r.status == BatchTaskStatus::Failed)
            .count();
    }

    /// `submitted + failed <= total` and `total == len(task_refs)`
    pub fn counts_consistent(&self) -> bool {
        self.total_tasks == self.task_refs.len()
            && self.submitted_tasks + self.failed_tasks <= self.total_tasks
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.status, BatchStatus::Completed | BatchStatus::Failed)
    }
}
