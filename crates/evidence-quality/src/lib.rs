//! Evidence Quality: readiness validation and evidence scoring
//!
//! Two complementary views of a task/window's evidence:
//!
//! - [`ValidationEngine`] runs submission-readiness rules and decides whether
//!   the evidence may be submitted under a [`ValidationMode`].
//! - [`Evaluator`] scores the evidence on completeness, requirements match,
//!   quality and control alignment, and resolves pass/warning/fail.
//!
//! # Example
//!
//! ```ignore
//! use evidence_quality::{Evaluator, TaskProfile, ValidationProfile};
//!
//! let evaluator = Evaluator::new(ValidationProfile::strict());
//! let task = TaskProfile::new("GitHub Access Review").with_control("CC6.1", "Logical access");
//! let result = evaluator.evaluate("ET-0001", &task, &window_state, None);
//! println!("{:?} ({:.1})", result.overall_status, result.overall_score);
//! ```

pub mod engine;
pub mod evaluator;
pub mod profile;
pub mod rules;

pub use engine::ValidationEngine;
pub use evaluator::{
    ControlRef, DimensionScore, EvaluationIssue, EvaluationResult, EvaluationStatus, Evaluator,
    IssueSeverity, TaskProfile,
};
pub use profile::{DimensionWeights, ValidationProfile};
pub use rules::{default_rules, ReadinessRule, RuleInput, RuleOutcome};

use evidence_core::{EvidenceFileRef, ValidationMode, ValidationResult};

/// Lowercase extension with its leading dot, or empty when there is none.
pub(crate) fn extension_of(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Quick validation without checksum verification
pub fn validate(
    task_ref: &str,
    window: &str,
    files: Vec<EvidenceFileRef>,
    mode: ValidationMode,
) -> ValidationResult {
    ValidationEngine::for_mode(mode).validate(task_ref, window, files, None)
}

/// Would these files be accepted for submission under `mode`?
pub fn would_pass(task_ref: &str, window: &str, files: Vec<EvidenceFileRef>, mode: ValidationMode) -> bool {
    validate(task_ref, window, files, mode).ready_for_submission
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("report.PDF"), ".pdf");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("README"), "");
    }

    #[test]
    fn test_would_pass_skip_mode() {
        assert!(would_pass("ET-0001", "2025-Q4", vec![], ValidationMode::Skip));
        assert!(!would_pass("ET-0001", "2025-Q4", vec![], ValidationMode::Lenient));
    }
}
