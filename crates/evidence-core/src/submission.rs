//! Submission records
//!
//! `EvidenceSubmission` is the authoritative staging record for one
//! task/window. `SubmissionHistory` is its append-only audit trail.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metadata::Metadata;
use crate::naming::task_id_from_ref;
use crate::validation::{ValidationFinding, ValidationResult, ValidationVerdict};

/// Lifecycle status of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Draft,
    Validated,
    Submitted,
    Accepted,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Validated => "validated",
            Self::Submitted => "submitted",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    #[default]
    Pending,
    Passed,
    Failed,
}

/// Reference to one evidence file included in a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceFileRef {
    pub filename: String,

    /// Path relative to the data root (evidence/ET-0001/2025-Q4/01_iam.md)
    pub relative_path: String,

    #[serde(default)]
    pub title: String,

    /// Tool that produced the file (terraform-scanner, github-permissions)
    #[serde(default)]
    pub source: String,

    pub size_bytes: u64,

    /// Lowercase hex SHA-256. Empty means unverified, never "verified empty".
    #[serde(default)]
    pub checksum_sha256: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls_satisfied: Vec<String>,
}

impl EvidenceFileRef {
    pub fn is_verified(&self) -> bool {
        !self.checksum_sha256.is_empty()
    }
}

/// Acknowledgement returned by the compliance platform, stored verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformAcknowledgement {
    pub submission_id: String,

    /// Platform status (accepted, pending_review, rejected)
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub received_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

/// Staging record for one (task, window)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSubmission {
    // === Identity ===

    #[serde(default)]
    pub task_id: u32,
    pub task_ref: String,
    pub window: String,

    // === Tracking ===

    pub status: SubmissionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_name: Option<String>,

    // === Timestamps ===

    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,

    // === Content ===

    #[serde(default)]
    pub evidence_files: Vec<EvidenceFileRef>,

    #[serde(default)]
    pub total_file_count: usize,

    #[serde(default)]
    pub total_size_bytes: u64,

    // === Metadata ===

    /// Submitter identity (usually an email)
    #[serde(default)]
    pub submitted_by: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    // === Validation ===

    #[serde(default)]
    pub validation_status: ValidationStatus,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_errors: Vec<ValidationFinding>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation_warnings: Vec<ValidationFinding>,

    /// Share of passed validation checks, in [0, 1]
    #[serde(default)]
    pub completeness_score: f64,

    #[serde(
        default,
        alias = "tugboat_response",
        skip_serializing_if = "Option::is_none"
    )]
    pub platform_response: Option<PlatformAcknowledgement>,
}

impl EvidenceSubmission {
    /// Default `draft` record with validation pending
    pub fn draft(task_ref: impl Into<String>, window: impl Into<String>) -> Self {
        let task_ref = task_ref.into();
        Self {
            task_id: task_id_from_ref(&task_ref).unwrap_or(0),
            task_ref,
            window: window.into(),
            status: SubmissionStatus::Draft,
            submission_id: None,
            batch_id: None,
            batch_name: None,
            created_at: Utc::now(),
            validated_at: None,
            submitted_at: None,
            accepted_at: None,
            evidence_files: Vec::new(),
            total_file_count: 0,
            total_size_bytes: 0,
            submitted_by: String::new(),
            notes: String::new(),
            tags: Vec::new(),
            validation_status: ValidationStatus::Pending,
            validation_errors: Vec::new(),
            validation_warnings: Vec::new(),
            completeness_score: 0.0,
            platform_response: None,
        }
    }

    pub fn with_submitter(mut self, submitted_by: impl Into<String>) -> Self {
        self.submitted_by = submitted_by.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Replace the file list and recompute the totals from it.
    pub fn set_files(&mut self, files: Vec<EvidenceFileRef>) {
        self.total_file_count = files.len();
        self.total_size_bytes = files.iter().map(|f| f.size_bytes).sum();
        self.evidence_files = files;
    }

    /// Fold a validation run into this record.
    pub fn apply_validation(&mut self, result: &ValidationResult) {
        self.validation_status = match result.status {
            ValidationVerdict::Failed => ValidationStatus::Failed,
            ValidationVerdict::Passed | ValidationVerdict::Warning => ValidationStatus::Passed,
        };
        self.validation_errors = result.errors.clone();
        self.validation_warnings = result.warnings_list.clone();
        self.completeness_score = result.completeness_score;
        self.validated_at = Some(result.validation_timestamp);
        if result.ready_for_submission && self.status == SubmissionStatus::Draft {
            self.status = SubmissionStatus::Validated;
        }
    }

    /// Record a successful platform submission.
    pub fn mark_submitted(&mut self, ack: PlatformAcknowledgement) {
        let now = Utc::now();
        self.status = SubmissionStatus::Submitted;
        self.submission_id = Some(ack.submission_id.clone());
        self.submitted_at = Some(now);
        if ack.status.eq_ignore_ascii_case("accepted") {
            self.status = SubmissionStatus::Accepted;
            self.accepted_at = Some(now);
        }
        self.platform_response = Some(ack);
    }

    pub fn is_submitted(&self) -> bool {
        matches!(
            self.status,
            SubmissionStatus::Submitted | SubmissionStatus::Accepted
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionHistoryEntry {
    pub submission_id: String,
    pub submitted_at: DateTime<Utc>,
    #[serde(default)]
    pub submitted_by: String,
    pub status: SubmissionStatus,
    pub file_count: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
}

impl SubmissionHistoryEntry {
    /// Entry describing the current state of a submission record
    pub fn from_submission(submission: &EvidenceSubmission) -> Self {
        Self {
            submission_id: submission.submission_id.clone().unwrap_or_default(),
            submitted_at: submission.submitted_at.unwrap_or_else(Utc::now),
            submitted_by: submission.submitted_by.clone(),
            status: submission.status,
            file_count: submission.total_file_count,
            notes: submission.notes.clone(),
            batch_id: submission.batch_id.clone(),
        }
    }
}

/// Append-only submission history, most recent first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionHistory {
    pub task_ref: String,
    pub window: String,
    #[serde(default)]
    pub entries: Vec<SubmissionHistoryEntry>,
}

impl SubmissionHistory {
    pub fn new(task_ref: impl Into<String>, window: impl Into<String>) -> Self {
        Self {
            task_ref: task_ref.into(),
            window: window.into(),
            entries: Vec::new(),
        }
    }

    /// Append an entry and restore most-recent-first order.
    pub fn push(&mut self, entry: SubmissionHistoryEntry) {
        self.entries.push(entry);
        self.sort_entries();
    }

    pub fn sort_entries(&mut self) {
        self.entries
            .sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
    }

    pub fn latest(&self) -> Option<&SubmissionHistoryEntry> {
        self.entries.first()
    }
}
