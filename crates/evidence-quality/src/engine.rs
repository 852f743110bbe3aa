//! Validation engine
//!
//! Runs the readiness rules over a file inventory and folds their outcomes
//! into a [`ValidationResult`]. Reading the inventory from disk is the
//! caller's job; the engine only touches files to verify checksums.

use std::path::Path;

use evidence_core::{
    CheckStatus, EvidenceFileRef, ValidationMode, ValidationResult, ValidationVerdict,
};
use tracing::{debug, info};

use crate::profile::ValidationProfile;
use crate::rules::{default_rules, ReadinessRule, RuleInput};

pub struct ValidationEngine {
    profile: ValidationProfile,
    rules: Vec<Box<dyn ReadinessRule>>,
}

impl ValidationEngine {
    pub fn new(profile: ValidationProfile) -> Self {
        Self {
            profile,
            rules: default_rules(),
        }
    }

    pub fn for_mode(mode: ValidationMode) -> Self {
        Self::new(ValidationProfile::for_mode(mode))
    }

    /// Append a custom rule after the defaults.
    pub fn with_rule(mut self, rule: Box<dyn ReadinessRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn profile(&self) -> &ValidationProfile {
        &self.profile
    }

    /// Validate one task/window.
    ///
    /// `data_root` enables checksum integrity verification against disk.
    pub fn validate(
        &self,
        task_ref: &str,
        window: &str,
        files: Vec<EvidenceFileRef>,
        data_root: Option<&Path>,
    ) -> ValidationResult {
        let mode = self.profile.mode;
        let mut result = ValidationResult::new(task_ref, window, mode);

        if mode == ValidationMode::Skip {
            result.status = ValidationVerdict::Passed;
            result.ready_for_submission = true;
            result.completeness_score = 1.0;
            result.evidence_files = files;
            debug!(task_ref, window, "validation skipped");
            return result;
        }

        let input = RuleInput {
            task_ref,
            window,
            files: &files,
            data_root,
            profile: &self.profile,
        };
        for rule in &self.rules {
            let outcome = rule.evaluate(&input);
            debug!(
                task_ref,
                window,
                rule = rule.code(),
                status = ?outcome.check.status,
                "rule evaluated"
            );
            result.record(outcome.check);
            result.errors.extend(outcome.errors);
            result.warnings_list.extend(outcome.warnings);
        }

        // skipped checks are left out; warnings count against the score
        let skipped = result
            .checks
            .iter()
            .filter(|c| c.status == CheckStatus::Skipped)
            .count();
        let scored = result.total_checks - skipped;
        if scored > 0 {
            result.completeness_score = result.passed_checks as f64 / scored as f64;
        }

        result.status = if result.failed_checks > 0 {
            ValidationVerdict::Failed
        } else if result.warnings > 0 {
            ValidationVerdict::Warning
        } else {
            ValidationVerdict::Passed
        };

        result.ready_for_submission = match mode {
            ValidationMode::Strict => !result.has_errors() && !result.has_warnings(),
            ValidationMode::Lenient => !result.has_errors(),
            ValidationMode::Skip => true,
        };
        result.evidence_files = files;

        info!(
            task_ref,
            window,
            mode = %mode,
            status = ?result.status,
            passed = result.passed_checks,
            failed = result.failed_checks,
            warnings = result.warnings,
            ready = result.ready_for_submission,
            "validation complete"
        );
        result
    }
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self::new(ValidationProfile::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleOutcome;
    use evidence_core::{FindingSeverity, ValidationCheck};

    fn files(n: usize) -> Vec<EvidenceFileRef> {
        (0..n)
            .map(|i| EvidenceFileRef {
                filename: format!("0{i}_access_review.md"),
                relative_path: format!("evidence/ET-0001/2025-Q4/0{i}_access_review.md"),
                title: String::new(),
                source: String::new(),
                size_bytes: 2_048,
                checksum_sha256: evidence_core::checksum::sha256_bytes(&[i as u8]),
                controls_satisfied: vec![],
            })
            .collect()
    }

    #[test]
    fn test_clean_inventory_passes() {
        let engine = ValidationEngine::for_mode(ValidationMode::Strict);
        let result = engine.validate("ET-0001", "2025-Q4", files(3), None);

        assert_eq!(result.status, ValidationVerdict::Passed);
        assert!(result.ready_for_submission);
        // integrity check is skipped without a data root
        assert_eq!(result.passed_checks, result.total_checks - 1);
        assert_eq!(result.completeness_score, 1.0);
        assert_eq!(result.evidence_files.len(), 3);
    }

    #[test]
    fn test_warning_blocks_strict_not_lenient() {
        let strict = ValidationEngine::for_mode(ValidationMode::Strict)
            .validate("ET-0001", "2025-Q4", files(1), None);
        assert_eq!(strict.status, ValidationVerdict::Warning);
        assert!(!strict.ready_for_submission);
        // the warning is not a pass and the skipped integrity check is not scored
        let skipped = strict
            .checks
            .iter()
            .filter(|c| c.status == CheckStatus::Skipped)
            .count();
        assert_eq!(skipped, 1);
        let scored = (strict.total_checks - skipped) as f64;
        assert_eq!(strict.completeness_score, strict.passed_checks as f64 / scored);
        assert!(strict.completeness_score < 1.0);

        let lenient = ValidationEngine::for_mode(ValidationMode::Lenient)
            .validate("ET-0001", "2025-Q4", files(1), None);
        assert_eq!(lenient.status, ValidationVerdict::Warning);
        assert!(lenient.ready_for_submission);
    }

    #[test]
    fn test_no_files_fails() {
        let result = ValidationEngine::default().validate("ET-0001", "2025-Q4", vec![], None);
        assert_eq!(result.status, ValidationVerdict::Failed);
        assert!(!result.ready_for_submission);
        assert!(result.completeness_score < 1.0);
        assert_eq!(result.errors[0].code, "MINIMUM_FILE_COUNT");
    }

    #[test]
    fn test_skip_mode() {
        let result = ValidationEngine::for_mode(ValidationMode::Skip)
            .validate("bogus", "whenever", vec![], None);
        assert_eq!(result.status, ValidationVerdict::Passed);
        assert!(result.ready_for_submission);
        assert!(result.checks.is_empty());
        assert_eq!(result.validation_mode, ValidationMode::Skip);
    }

    struct AlwaysFails;

    impl ReadinessRule for AlwaysFails {
        fn code(&self) -> &'static str {
            "CUSTOM"
        }

        fn evaluate(&self, _input: &RuleInput<'_>) -> RuleOutcome {
            RuleOutcome {
                check: ValidationCheck {
                    code: "CUSTOM".into(),
                    name: "Custom".into(),
                    status: CheckStatus::Failed,
                    severity: FindingSeverity::Error,
                    message: "nope".into(),
                },
                errors: vec![evidence_core::ValidationFinding::new(
                    "CUSTOM",
                    FindingSeverity::Error,
                    "nope",
                )],
                warnings: vec![],
            }
        }
    }

    #[test]
    fn test_custom_rule() {
        let engine = ValidationEngine::for_mode(ValidationMode::Lenient).with_rule(Box::new(AlwaysFails));
        let result = engine.validate("ET-0001", "2025-Q4", files(2), None);
        assert_eq!(result.status, ValidationVerdict::Failed);
        assert_eq!(result.checks.last().unwrap().code, "CUSTOM");
    }
}
