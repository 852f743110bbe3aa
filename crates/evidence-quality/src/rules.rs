//! Submission-readiness rules
//!
//! Each rule inspects the file inventory for one task/window and yields a
//! single check plus any errors or warnings it raised.

use std::path::Path;

use evidence_core::checksum::{verify_file, ChecksumVerdict};
use evidence_core::naming::{is_task_ref, is_valid_window_label};
use evidence_core::{
    CheckStatus, EvidenceFileRef, FindingSeverity, ValidationCheck, ValidationFinding,
};

use crate::profile::ValidationProfile;

/// Everything a rule may look at
pub struct RuleInput<'a> {
    pub task_ref: &'a str,
    pub window: &'a str,
    pub files: &'a [EvidenceFileRef],
    /// Root that `EvidenceFileRef::relative_path` is relative to
    pub data_root: Option<&'a Path>,
    pub profile: &'a ValidationProfile,
}

#[derive(Debug, Clone)]
pub struct RuleOutcome {
    pub check: ValidationCheck,
    pub errors: Vec<ValidationFinding>,
    pub warnings: Vec<ValidationFinding>,
}

impl RuleOutcome {
    fn new(code: &str, name: &str, severity: FindingSeverity) -> Self {
        Self {
            check: ValidationCheck {
                code: code.to_string(),
                name: name.to_string(),
                status: CheckStatus::Passed,
                severity,
                message: String::new(),
            },
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn pass(mut self, message: impl Into<String>) -> Self {
        self.check.status = CheckStatus::Passed;
        self.check.message = message.into();
        self
    }

    fn fail(mut self, message: impl Into<String>) -> Self {
        self.check.status = CheckStatus::Failed;
        self.check.message = message.into();
        self
    }

    fn warn(mut self, message: impl Into<String>) -> Self {
        self.check.status = CheckStatus::Warning;
        self.check.message = message.into();
        self
    }

    fn skip(mut self, message: impl Into<String>) -> Self {
        self.check.status = CheckStatus::Skipped;
        self.check.message = message.into();
        self
    }

    fn error(&mut self, message: impl Into<String>) -> &mut ValidationFinding {
        let finding =
            ValidationFinding::new(self.check.code.clone(), FindingSeverity::Error, message);
        self.errors.push(finding);
        let last = self.errors.len() - 1;
        &mut self.errors[last]
    }

    fn warning(&mut self, message: impl Into<String>) -> &mut ValidationFinding {
        let finding =
            ValidationFinding::new(self.check.code.clone(), FindingSeverity::Warning, message);
        self.warnings.push(finding);
        let last = self.warnings.len() - 1;
        &mut self.warnings[last]
    }
}

/// A single readiness check
pub trait ReadinessRule: Send + Sync {
    fn code(&self) -> &'static str;
    fn evaluate(&self, input: &RuleInput<'_>) -> RuleOutcome;
}

/// Rules run by default, in order
pub fn default_rules() -> Vec<Box<dyn ReadinessRule>> {
    vec![
        Box::new(MinimumFileCount),
        Box::new(ValidFileExtensions),
        Box::new(FileSizeLimits),
        Box::new(NonEmptyContent),
        Box::new(ChecksumPresent),
        Box::new(ChecksumIntegrity),
        Box::new(ValidTaskRef),
        Box::new(WindowFormat),
    ]
}

pub struct MinimumFileCount;

impl ReadinessRule for MinimumFileCount {
    fn code(&self) -> &'static str {
        "MINIMUM_FILE_COUNT"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> RuleOutcome {
        let out = RuleOutcome::new(self.code(), "Minimum File Count", FindingSeverity::Error);
        let count = input.files.len();
        let recommended = input.profile.min_recommended_files;

        if count == 0 {
            let mut out = out.fail("No evidence files found");
            out.error("No evidence files found in the evidence directory")
                .suggestion = Some(format!("Generate evidence for {} first", input.task_ref));
            out
        } else if count < recommended {
            let mut out = out.warn(format!("Only {count} file(s) found (recommend {recommended}+)"));
            out.warning(format!(
                "Only {count} evidence file(s) found. Consider adding more evidence for completeness."
            ))
            .suggestion = Some("Add additional evidence files or documentation".to_string());
            out
        } else {
            out.pass(format!("Found {count} evidence files"))
        }
    }
}

pub struct ValidFileExtensions;

impl ReadinessRule for ValidFileExtensions {
    fn code(&self) -> &'static str {
        "VALID_FILE_EXTENSIONS"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> RuleOutcome {
        let out = RuleOutcome::new(self.code(), "Valid File Extensions", FindingSeverity::Warning);
        let invalid: Vec<&EvidenceFileRef> = input
            .files
            .iter()
            .filter(|f| !input.profile.is_extension_allowed(&f.filename))
            .collect();

        if invalid.is_empty() {
            return out.pass("All file extensions valid");
        }

        let mut out = out.warn(format!("{} files with unexpected extensions", invalid.len()));
        let allowed = input.profile.allowed_extensions.join(", ");
        for file in invalid {
            out.warning(format!("Unexpected file extension: {}", file.filename))
                .suggestion = Some(format!("Allowed extensions: {allowed}"));
        }
        out
    }
}

pub struct FileSizeLimits;

impl ReadinessRule for FileSizeLimits {
    fn code(&self) -> &'static str {
        "FILE_SIZE_LIMITS"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> RuleOutcome {
        let out = RuleOutcome::new(self.code(), "File Size Limits", FindingSeverity::Error);
        let limit = input.profile.max_file_size_bytes;
        let oversized: Vec<&EvidenceFileRef> =
            input.files.iter().filter(|f| f.size_bytes > limit).collect();

        if oversized.is_empty() {
            return out.pass("All files within size limits");
        }

        let mut out = out.fail(format!("{} files exceed size limit", oversized.len()));
        for file in oversized {
            out.error(format!(
                "File exceeds {} MB limit: {}",
                limit / (1024 * 1024),
                file.filename
            ))
            .suggestion = Some("Compress the file or split into smaller files".to_string());
        }
        out
    }
}

pub struct NonEmptyContent;

impl ReadinessRule for NonEmptyContent {
    fn code(&self) -> &'static str {
        "NON_EMPTY_CONTENT"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> RuleOutcome {
        let out = RuleOutcome::new(self.code(), "Non-Empty Content", FindingSeverity::Error);
        let empty: Vec<&EvidenceFileRef> =
            input.files.iter().filter(|f| f.size_bytes == 0).collect();

        if empty.is_empty() {
            return out.pass("All files have content");
        }

        let mut out = out.fail(format!("{} empty files", empty.len()));
        for file in empty {
            out.error(format!("File is empty: {}", file.filename))
                .suggestion = Some("Add content to the file or remove it".to_string());
        }
        out
    }
}

pub struct ChecksumPresent;

impl ReadinessRule for ChecksumPresent {
    fn code(&self) -> &'static str {
        "CHECKSUM_PRESENT"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> RuleOutcome {
        let out = RuleOutcome::new(self.code(), "Checksum Present", FindingSeverity::Warning);
        let missing = input.files.iter().filter(|f| !f.is_verified()).count();

        if missing == 0 {
            return out.pass("All files have checksums");
        }

        let mut out = out.warn(format!("{missing} files missing checksums"));
        out.warning(format!("{missing} files are unverified (no SHA-256 checksum)"))
            .suggestion = Some("Checksums are recomputed during submission".to_string());
        out
    }
}

/// Recorded checksums must still match the files on disk.
pub struct ChecksumIntegrity;

impl ReadinessRule for ChecksumIntegrity {
    fn code(&self) -> &'static str {
        "CHECKSUM_INTEGRITY"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> RuleOutcome {
        let out = RuleOutcome::new(self.code(), "Checksum Integrity", FindingSeverity::Error);
        let Some(root) = input.data_root.filter(|_| input.profile.verify_checksums) else {
            return out.skip("Integrity verification not requested");
        };

        let mut mismatched = Vec::new();
        let mut verified = 0usize;
        for file in input.files.iter().filter(|f| f.is_verified()) {
            let path = root.join(&file.relative_path);
            match verify_file(&path, &file.checksum_sha256) {
                Ok(ChecksumVerdict::Verified) => verified += 1,
                Ok(ChecksumVerdict::Mismatch { expected, actual }) => {
                    mismatched.push((file, format!("expected {expected}, found {actual}")));
                }
                Ok(ChecksumVerdict::Unverified) => {}
                // no longer reachable; nothing to compare against
                Err(err) if err.is_not_found() => {}
                Err(err) => mismatched.push((file, err.to_string())),
            }
        }

        if mismatched.is_empty() {
            return out.pass(format!("{verified} checksums verified"));
        }

        let mut out = out.fail(format!("{} files changed since checksum was recorded", mismatched.len()));
        for (file, detail) in mismatched {
            let finding = out.error(format!("Checksum mismatch for {}: {detail}", file.filename));
            finding.field = Some(file.relative_path.clone());
            finding.suggestion =
                Some("Re-scan the window to refresh the file inventory".to_string());
        }
        out
    }
}

pub struct ValidTaskRef;

impl ReadinessRule for ValidTaskRef {
    fn code(&self) -> &'static str {
        "VALID_TASK_REF"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> RuleOutcome {
        let out = RuleOutcome::new(self.code(), "Valid Task Reference", FindingSeverity::Error);
        if is_task_ref(input.task_ref) {
            return out.pass("Valid task reference format");
        }

        let mut out = out.fail("Invalid task reference format");
        let finding = out.error(format!(
            "Task reference '{}' does not match pattern ET-XXXX",
            input.task_ref
        ));
        finding.field = Some("task_ref".to_string());
        finding.suggestion = Some("Use proper task reference format (e.g., ET-0001)".to_string());
        out
    }
}

pub struct WindowFormat;

impl ReadinessRule for WindowFormat {
    fn code(&self) -> &'static str {
        "WINDOW_FORMAT"
    }

    fn evaluate(&self, input: &RuleInput<'_>) -> RuleOutcome {
        let out = RuleOutcome::new(self.code(), "Window Format", FindingSeverity::Warning);
        if is_valid_window_label(input.window) {
            return out.pass("Valid window format");
        }

        let mut out = out.warn("Unexpected window format");
        let finding = out.warning(format!(
            "Window '{}' does not match expected format",
            input.window
        ));
        finding.field = Some("window".to_string());
        finding.suggestion =
            Some("Use format YYYY-QX (e.g., 2025-Q4), YYYY-MM, or YYYY-MM-DD".to_string());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, size: u64, checksum: &str) -> EvidenceFileRef {
        EvidenceFileRef {
            filename: name.to_string(),
            relative_path: name.to_string(),
            title: String::new(),
            source: String::new(),
            size_bytes: size,
            checksum_sha256: checksum.to_string(),
            controls_satisfied: vec![],
        }
    }

    fn run(rule: &dyn ReadinessRule, files: &[EvidenceFileRef]) -> RuleOutcome {
        let profile = ValidationProfile::lenient();
        rule.evaluate(&RuleInput {
            task_ref: "ET-0001",
            window: "2025-Q4",
            files,
            data_root: None,
            profile: &profile,
        })
    }

    #[test]
    fn test_minimum_file_count() {
        let none = run(&MinimumFileCount, &[]);
        assert_eq!(none.check.status, CheckStatus::Failed);
        assert_eq!(none.errors.len(), 1);

        let one = run(&MinimumFileCount, &[file("a.md", 1, "")]);
        assert_eq!(one.check.status, CheckStatus::Warning);
        assert_eq!(one.warnings.len(), 1);

        let two = run(&MinimumFileCount, &[file("a.md", 1, ""), file("b.md", 1, "")]);
        assert_eq!(two.check.status, CheckStatus::Passed);
    }

    #[test]
    fn test_extension_warning_per_file() {
        let out = run(
            &ValidFileExtensions,
            &[file("a.md", 1, ""), file("b.png", 1, ""), file("c.exe", 1, "")],
        );
        assert_eq!(out.check.status, CheckStatus::Warning);
        assert_eq!(out.warnings.len(), 2);
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_size_and_empty() {
        let big = 51 * 1024 * 1024;
        let out = run(&FileSizeLimits, &[file("a.csv", big, "")]);
        assert_eq!(out.check.status, CheckStatus::Failed);
        assert!(out.errors[0].message.contains("50 MB"));

        let out = run(&NonEmptyContent, &[file("a.csv", 0, "")]);
        assert_eq!(out.check.status, CheckStatus::Failed);
    }

    #[test]
    fn test_checksum_present_treats_empty_as_unverified() {
        let out = run(&ChecksumPresent, &[file("a.md", 1, ""), file("b.md", 1, "abc")]);
        assert_eq!(out.check.status, CheckStatus::Warning);
        assert!(out.warnings[0].message.starts_with("1 files"));
    }

    #[test]
    fn test_integrity_skipped_without_root() {
        let out = run(&ChecksumIntegrity, &[file("a.md", 1, "abc")]);
        assert_eq!(out.check.status, CheckStatus::Skipped);
    }

    #[test]
    fn test_integrity_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.md"), b"original").unwrap();
        let recorded = evidence_core::checksum::sha256_bytes(b"original");
        let files = vec![file("a.md", 8, &recorded)];
        let profile = ValidationProfile::strict();
        let input = RuleInput {
            task_ref: "ET-0001",
            window: "2025-Q4",
            files: &files,
            data_root: Some(dir.path()),
            profile: &profile,
        };

        assert_eq!(ChecksumIntegrity.evaluate(&input).check.status, CheckStatus::Passed);

        std::fs::write(dir.path().join("a.md"), b"tampered").unwrap();
        let out = ChecksumIntegrity.evaluate(&input);
        assert_eq!(out.check.status, CheckStatus::Failed);
        assert_eq!(out.errors[0].field.as_deref(), Some("a.md"));
    }

    #[test]
    fn test_task_ref_and_window() {
        let profile = ValidationProfile::lenient();
        let input = RuleInput {
            task_ref: "TASK-1",
            window: "Q4",
            files: &[],
            data_root: None,
            profile: &profile,
        };
        assert_eq!(ValidTaskRef.evaluate(&input).check.status, CheckStatus::Failed);
        assert_eq!(WindowFormat.evaluate(&input).check.status, CheckStatus::Warning);
    }
}
