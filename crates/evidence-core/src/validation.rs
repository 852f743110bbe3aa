//! Validation records
//!
//! Output of a submission-readiness run. A stored result is replaced
//! wholesale by the next run, never merged.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::submission::EvidenceFileRef;

/// How strictly readiness is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Ready only with no errors and no warnings
    Strict,
    /// Ready with no errors
    #[default]
    Lenient,
    /// No checks run
    Skip,
}

impl ValidationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lenient => "lenient",
            Self::Skip => "skip",
        }
    }

    /// Parse a mode name; anything unrecognized falls back to lenient.
    pub fn parse(mode: &str) -> Self {
        match mode.trim().to_ascii_lowercase().as_str() {
            "strict" => Self::Strict,
            "skip" => Self::Skip,
            _ => Self::Lenient,
        }
    }
}

impl fmt::Display for ValidationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationVerdict {
    Passed,
    Failed,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passed,
    Failed,
    Warning,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingSeverity {
    Error,
    Warning,
    Info,
}

/// A single validation error or warning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFinding {
    /// Machine readable code (MISSING_FILE, FORMAT_ERROR, ...)
    pub code: String,

    pub severity: FindingSeverity,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationFinding {
    pub fn new(code: impl Into<String>, severity: FindingSeverity, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            severity,
            message: message.into(),
            field: None,
            suggestion: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Outcome of one readiness rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationCheck {
    pub code: String,
    pub name: String,
    pub status: CheckStatus,
    pub severity: FindingSeverity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub task_ref: String,
    pub window: String,
    pub status: ValidationVerdict,
    pub validation_mode: ValidationMode,

    /// Passed checks over checks not skipped, in [0, 1]
    pub completeness_score: f64,

    pub total_checks: usize,
    pub passed_checks: usize,
    pub failed_checks: usize,
    pub warnings: usize,

    #[serde(default)]
    pub errors: Vec<ValidationFinding>,

    #[serde(default)]
    pub warnings_list: Vec<ValidationFinding>,

    #[serde(default)]
    pub checks: Vec<ValidationCheck>,

    #[serde(default)]
    pub evidence_files: Vec<EvidenceFileRef>,

    pub ready_for_submission: bool,

    pub validation_timestamp: DateTime<Utc>,
}

impl ValidationResult {
    /// Fresh, empty result for a run that is about to start
    pub fn new(task_ref: impl Into<String>, window: impl Into<String>, mode: ValidationMode) -> Self {
        Self {
            task_ref: task_ref.into(),
            window: window.into(),
            status: ValidationVerdict::Passed,
            validation_mode: mode,
            completeness_score: 0.0,
            total_checks: 0,
            passed_checks: 0,
            failed_checks: 0,
            warnings: 0,
            errors: Vec::new(),
            warnings_list: Vec::new(),
            checks: Vec::new(),
            evidence_files: Vec::new(),
            ready_for_submission: false,
            validation_timestamp: Utc::now(),
        }
    }

    /// Record a check and keep the counters in step with it.
    pub fn record(&mut self, check: ValidationCheck) {
        self.total_checks += 1;
        match check.status {
            CheckStatus::Passed => self.passed_checks += 1,
            CheckStatus::Failed => self.failed_checks += 1,
            CheckStatus::Warning => self.warnings += 1,
            CheckStatus::Skipped => {}
        }
        self.checks.push(check);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings_list.is_empty()
    }
}
