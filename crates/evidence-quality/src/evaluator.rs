//! Evidence scoring
//!
//! Scores a window's evidence on four weighted dimensions (0-100 each) and
//! resolves an overall pass/warning/fail status. Critical issues veto a pass
//! outright; high-severity issues only demote a pass to a warning.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use evidence_core::{FileState, WindowState};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::extension_of;
use crate::profile::ValidationProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStatus {
    Pass,
    Warning,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationIssue {
    pub severity: IssueSeverity,

    /// completeness, requirements, quality, control_alignment
    pub category: String,

    pub message: String,

    /// File or section where the issue was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    /// 0-100
    pub score: f64,
    pub max_score: f64,
    /// Contribution to the overall score
    pub weight: f64,
    pub status: EvaluationStatus,
    /// What this dimension measures
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub details: String,
}

impl DimensionScore {
    pub fn new(weight: f64, description: &str) -> Self {
        Self {
            score: 0.0,
            max_score: 100.0,
            weight,
            status: EvaluationStatus::Fail,
            description: description.to_string(),
            details: String::new(),
        }
    }

    /// Set the score and derive the dimension status from it.
    pub fn set_score(&mut self, score: f64) {
        self.score = score.clamp(0.0, self.max_score);
        self.status = if self.score >= 80.0 {
            EvaluationStatus::Pass
        } else if self.score >= 50.0 {
            EvaluationStatus::Warning
        } else {
            EvaluationStatus::Fail
        };
    }

    fn note(&mut self, detail: impl AsRef<str>) {
        self.details.push_str(detail.as_ref());
        self.details.push(' ');
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub task_ref: String,
    pub window: String,

    /// Stage subfolder evaluated, if not the window root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfolder: Option<String>,

    // === Overall ===

    pub overall_score: f64,
    pub overall_status: EvaluationStatus,
    pub pass_threshold: f64,

    // === Dimensions ===

    pub completeness: DimensionScore,
    pub requirements_match: DimensionScore,
    pub quality: DimensionScore,
    pub control_alignment: DimensionScore,

    // === Findings ===

    #[serde(default)]
    pub issues: Vec<EvaluationIssue>,

    #[serde(default)]
    pub recommendations: Vec<String>,

    /// Requirement identifiers with no supporting evidence, kept apart from issues
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_requirements: Vec<String>,

    pub evaluated_at: DateTime<Utc>,
    pub file_count: usize,
    pub total_bytes: u64,
}

impl EvaluationResult {
    pub fn new(task_ref: &str, window: &str, profile: &ValidationProfile) -> Self {
        let w = profile.weights;
        Self {
            task_ref: task_ref.to_string(),
            window: window.to_string(),
            subfolder: None,
            overall_score: 0.0,
            overall_status: EvaluationStatus::Fail,
            pass_threshold: profile.pass_threshold,
            completeness: DimensionScore::new(
                w.completeness,
                "Evidence completeness and required files present",
            ),
            requirements_match: DimensionScore::new(
                w.requirements_match,
                "Evidence matches task requirements and guidance",
            ),
            quality: DimensionScore::new(w.quality, "Evidence quality and presentation"),
            control_alignment: DimensionScore::new(
                w.control_alignment,
                "Evidence addresses related controls appropriately",
            ),
            issues: Vec::new(),
            recommendations: Vec::new(),
            missing_requirements: Vec::new(),
            evaluated_at: Utc::now(),
            file_count: 0,
            total_bytes: 0,
        }
    }

    fn dimensions(&self) -> [&DimensionScore; 4] {
        [
            &self.completeness,
            &self.requirements_match,
            &self.quality,
            &self.control_alignment,
        ]
    }

    /// Weighted mean of the dimension scores; zero when all weights are zero.
    pub fn calculate_overall_score(&mut self) {
        let total_weight: f64 = self.dimensions().iter().map(|d| d.weight).sum();
        if total_weight == 0.0 {
            self.overall_score = 0.0;
            return;
        }
        let weighted: f64 = self.dimensions().iter().map(|d| d.score * d.weight).sum();
        self.overall_score = weighted / total_weight;
    }

    pub fn determine_status(&mut self) {
        if self.count_issues(IssueSeverity::Critical) > 0 {
            self.overall_status = EvaluationStatus::Fail;
            return;
        }

        self.overall_status = if self.overall_score >= self.pass_threshold {
            EvaluationStatus::Pass
        } else if self.overall_score >= self.pass_threshold * 0.6 {
            EvaluationStatus::Warning
        } else {
            EvaluationStatus::Fail
        };

        if self.overall_status == EvaluationStatus::Pass
            && self.count_issues(IssueSeverity::High) > 0
        {
            self.overall_status = EvaluationStatus::Warning;
        }
    }

    pub fn add_issue(
        &mut self,
        severity: IssueSeverity,
        category: &str,
        message: impl Into<String>,
        location: Option<&str>,
        suggestion: Option<&str>,
    ) {
        self.issues.push(EvaluationIssue {
            severity,
            category: category.to_string(),
            message: message.into(),
            location: location.map(str::to_string),
            suggestion: suggestion.map(str::to_string),
        });
    }

    pub fn add_recommendation(&mut self, recommendation: impl Into<String>) {
        self.recommendations.push(recommendation.into());
    }

    pub fn count_issues(&self, severity: IssueSeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    pub fn is_passing(&self) -> bool {
        self.overall_status == EvaluationStatus::Pass
    }
}

/// A control the task is meant to evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlRef {
    /// CC6.1, AC-01, ...
    pub code: String,
    pub name: String,
}

/// What the evaluator knows about the task itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub guidance: String,
    #[serde(default)]
    pub related_controls: Vec<ControlRef>,
}

impl TaskProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = guidance.into();
        self
    }

    pub fn with_control(mut self, code: impl Into<String>, name: impl Into<String>) -> Self {
        self.related_controls.push(ControlRef {
            code: code.into(),
            name: name.into(),
        });
        self
    }

    /// Rough number of files a complete submission should contain.
    fn expected_file_count(&self) -> usize {
        let mut count = match self.related_controls.len() {
            n if n > 3 => 3,
            n if n > 1 => 2,
            _ => 1,
        };
        if self.description.len() > 500 {
            count += 1;
        }
        count
    }

    fn required_keywords(&self) -> Vec<&'static str> {
        const COMMON: &[&str] = &[
            "github", "terraform", "access", "permissions", "security", "policy", "control",
            "users", "roles", "audit", "log", "review", "deployment",
        ];
        let text = format!("{} {}", self.name, self.description).to_lowercase();
        COMMON.iter().copied().filter(|w| text.contains(w)).collect()
    }

    fn expected_formats(&self) -> Vec<&'static str> {
        let mut formats = vec!["csv", "json", "md"];
        let text = self.description.to_lowercase();
        if text.contains("screenshot") || text.contains("image") {
            formats.extend(["png", "jpg"]);
        }
        if text.contains("report") || text.contains("document") {
            formats.extend(["pdf", "docx"]);
        }
        if text.contains("spreadsheet") || text.contains("table") {
            formats.push("xlsx");
        }
        formats
    }
}

const STRUCTURED_EXTENSIONS: &[&str] = &[".csv", ".json", ".yaml", ".xlsx"];
const DOCUMENT_EXTENSIONS: &[&str] = &[".md", ".txt", ".pdf"];

/// Four-dimension evidence scorer
#[derive(Debug, Clone, Default)]
pub struct Evaluator {
    profile: ValidationProfile,
}

impl Evaluator {
    pub fn new(profile: ValidationProfile) -> Self {
        Self { profile }
    }

    /// Score a window (or stage subfolder) snapshot against the task profile.
    pub fn evaluate(
        &self,
        task_ref: &str,
        task: &TaskProfile,
        window: &WindowState,
        subfolder: Option<&str>,
    ) -> EvaluationResult {
        let mut result = EvaluationResult::new(task_ref, &window.window, &self.profile);
        result.subfolder = subfolder.map(str::to_string);
        result.file_count = window.file_count;
        result.total_bytes = window.total_bytes;

        score_completeness(task, window, &mut result);
        score_requirements(task, window, &mut result);
        score_quality(window, &mut result);
        score_control_alignment(task, window, &mut result);

        result.calculate_overall_score();
        result.determine_status();
        recommend(task, &mut result);

        info!(
            task_ref,
            window = %window.window,
            score = result.overall_score,
            status = ?result.overall_status,
            "evaluation complete"
        );
        result
    }
}

fn score_completeness(task: &TaskProfile, window: &WindowState, result: &mut EvaluationResult) {
    if window.file_count == 0 {
        result.completeness.set_score(0.0);
        result.completeness.note("No evidence files found.");
        result.add_issue(
            IssueSeverity::Critical,
            "completeness",
            "No evidence files present",
            None,
            Some("Upload or generate evidence files"),
        );
        return;
    }

    let mut score = 40.0;

    if window.has_generation_meta {
        score += 15.0;
        result.completeness.note("Generation metadata present.");
    } else {
        result.add_issue(
            IssueSeverity::Medium,
            "completeness",
            "Missing generation metadata",
            Some(".generation/metadata.yaml"),
            Some("Track how evidence was generated"),
        );
    }

    let expected = task.expected_file_count();
    if window.file_count >= expected {
        score += 20.0;
        result
            .completeness
            .note(format!("File count adequate ({} files).", window.file_count));
    } else {
        score += window.file_count as f64 / expected as f64 * 20.0;
        result.add_issue(
            IssueSeverity::Medium,
            "completeness",
            format!(
                "File count below expected (found {}, expected ~{expected})",
                window.file_count
            ),
            None,
            Some("Ensure all required evidence is collected"),
        );
    }

    if window.total_bytes > 1024 {
        score += 15.0;
    } else {
        score += 5.0;
        result.add_issue(
            IssueSeverity::Low,
            "completeness",
            format!("Evidence files very small ({} bytes total)", window.total_bytes),
            None,
            Some("Ensure evidence contains sufficient detail"),
        );
    }

    if window.newest_file.is_some() {
        score += 10.0;
        result.completeness.note("Evidence recently updated.");
    }

    result.completeness.set_score(score);
}

fn ratio(matching: usize, files: &[FileState]) -> f64 {
    if files.is_empty() {
        0.0
    } else {
        matching as f64 / files.len() as f64
    }
}

fn score_requirements(task: &TaskProfile, window: &WindowState, result: &mut EvaluationResult) {
    let mut score = 0.0;
    let files = &window.files;

    let keywords = task.required_keywords();
    if keywords.is_empty() {
        score += 30.0;
        result.requirements_match.note("No specific keywords required.");
    } else {
        let matching = files
            .iter()
            .filter(|f| {
                let name = f.filename.to_lowercase();
                keywords.iter().any(|k| name.contains(k))
            })
            .count();
        score += ratio(matching, files) * 40.0;
        result.requirements_match.note(format!(
            "Filename relevance: {matching}/{} files match keywords.",
            files.len()
        ));
        for keyword in &keywords {
            if !files.iter().any(|f| f.filename.to_lowercase().contains(keyword)) {
                result.missing_requirements.push(format!("keyword:{keyword}"));
            }
        }
    }

    if task.guidance.is_empty() {
        score += 30.0;
    } else {
        score += 20.0;
        result.requirements_match.note("Collection guidance present.");
    }

    let formats = task.expected_formats();
    let matching = files
        .iter()
        .filter(|f| {
            let ext = extension_of(&f.filename);
            formats.iter().any(|f| ext.trim_start_matches('.') == *f)
        })
        .count();
    let format_score = ratio(matching, files);
    score += format_score * 30.0;
    result
        .requirements_match
        .note(format!("File format match: {:.0}%.", format_score * 100.0));
    if format_score < 0.5 {
        let suggestion = format!("Consider using formats: {}", formats.join(", "));
        result.add_issue(
            IssueSeverity::Medium,
            "requirements",
            "Evidence file formats may not match expected types",
            None,
            Some(suggestion.as_str()),
        );
    }

    result.requirements_match.set_score(score);
}

/// Descriptive lowercase names without spaces, at least five characters before the extension.
fn has_proper_naming(filename: &str) -> bool {
    let stem = match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    };
    stem.chars().count() >= 5 && stem.to_lowercase() == stem && !stem.contains(' ')
}

fn score_quality(window: &WindowState, result: &mut EvaluationResult) {
    let files = &window.files;
    if window.file_count == 0 || files.is_empty() {
        result.quality.set_score(0.0);
        return;
    }

    let mut score = 0.0;

    let named = files.iter().filter(|f| has_proper_naming(&f.filename)).count();
    let naming_score = ratio(named, files) * 25.0;
    score += naming_score;
    result
        .quality
        .note(format!("Naming conventions: {named}/{} files.", files.len()));
    if naming_score < 15.0 {
        result.add_issue(
            IssueSeverity::Low,
            "quality",
            "Some files don't follow naming conventions",
            None,
            Some("Use descriptive lowercase names with underscores"),
        );
    }

    let reasonable = files
        .iter()
        .filter(|f| f.size_bytes > 100 && f.size_bytes < 100 * 1024 * 1024)
        .count();
    score += ratio(reasonable, files) * 25.0;

    let structured = files
        .iter()
        .filter(|f| STRUCTURED_EXTENSIONS.contains(&extension_of(&f.filename).as_str()))
        .count();
    if structured > 0 {
        score += ratio(structured, files) * 25.0;
        result
            .quality
            .note(format!("Structured formats: {structured}/{} files.", files.len()));
    } else {
        score += 10.0;
        result.add_issue(
            IssueSeverity::Low,
            "quality",
            "No structured data formats (CSV, JSON, YAML)",
            None,
            Some("Consider using structured formats for better auditability"),
        );
    }

    let documented = files
        .iter()
        .any(|f| DOCUMENT_EXTENSIONS.contains(&extension_of(&f.filename).as_str()));
    if documented {
        score += 25.0;
        result.quality.note("Documentation present.");
    } else {
        score += 10.0;
        result.add_issue(
            IssueSeverity::Low,
            "quality",
            "No documentation files found",
            None,
            Some("Consider adding a summary document or README"),
        );
    }

    result.quality.set_score(score);
}

fn control_keywords(control: &ControlRef) -> Vec<String> {
    control
        .name
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > 4)
        .map(str::to_string)
        .collect()
}

fn score_control_alignment(task: &TaskProfile, window: &WindowState, result: &mut EvaluationResult) {
    if task.related_controls.is_empty() {
        result.control_alignment.set_score(70.0);
        result
            .control_alignment
            .note("No specific controls to evaluate against.");
        return;
    }

    let mut score = if window.file_count > 0 { 30.0 } else { 0.0 };

    let filenames: Vec<String> = window.files.iter().map(|f| f.filename.to_lowercase()).collect();
    let keywords: BTreeSet<String> = task
        .related_controls
        .iter()
        .flat_map(control_keywords)
        .collect();
    let coverage = if keywords.is_empty() {
        1.0
    } else {
        let matched = keywords
            .iter()
            .filter(|k| filenames.iter().any(|name| name.contains(k.as_str())))
            .count();
        matched as f64 / keywords.len() as f64
    };
    score += coverage * 40.0;
    result
        .control_alignment
        .note(format!("Control keyword coverage: {:.0}%.", coverage * 100.0));
    if coverage < 0.3 {
        result.add_issue(
            IssueSeverity::High,
            "control_alignment",
            "Evidence may not adequately address related controls",
            None,
            Some("Ensure evidence demonstrates control implementation"),
        );
    }

    for control in &task.related_controls {
        let words = control_keywords(control);
        if !words.is_empty()
            && !words
                .iter()
                .any(|k| filenames.iter().any(|name| name.contains(k.as_str())))
        {
            result.missing_requirements.push(control.code.clone());
        }
    }

    score += 30.0;
    result.control_alignment.note(format!(
        "Addresses {} control(s).",
        task.related_controls.len()
    ));

    result.control_alignment.set_score(score);
}

fn recommend(task: &TaskProfile, result: &mut EvaluationResult) {
    if result.completeness.score < 70.0 {
        result.add_recommendation("Add more evidence files to improve completeness");
    }
    if result.requirements_match.score < 70.0 {
        result.add_recommendation(
            "Review task requirements and ensure evidence addresses all requirements",
        );
    }
    if result.quality.score < 70.0 {
        result.add_recommendation(
            "Improve evidence quality by using structured formats and better naming",
        );
    }
    if result.control_alignment.score < 70.0 {
        result.add_recommendation(format!(
            "Ensure evidence demonstrates implementation of all {} related controls",
            task.related_controls.len()
        ));
    }
    if result.file_count < 2 {
        result.add_recommendation(
            "Consider adding supporting documentation or additional evidence files",
        );
    }
    if result.count_issues(IssueSeverity::Critical) > 0 {
        result.add_recommendation("Address all critical issues before submission");
    } else if result.count_issues(IssueSeverity::High) > 0 {
        result.add_recommendation("Review and address high-priority issues");
    }
}
