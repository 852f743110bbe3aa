//! State aggregation
//!
//! Pure reductions from per-window state to task-level state. Nothing here
//! touches the filesystem.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{AutomationCapability, LocalEvidenceState, WindowState};
use crate::submission::SubmissionStatus;

/// State contributed by a single window.
pub fn window_local_state(window: &WindowState) -> LocalEvidenceState {
    match window.submission_status {
        Some(SubmissionStatus::Accepted) => LocalEvidenceState::Accepted,
        Some(SubmissionStatus::Submitted) => LocalEvidenceState::Submitted,
        Some(SubmissionStatus::Validated) => LocalEvidenceState::Validated,
        _ if window.file_count > 0 => LocalEvidenceState::Generated,
        _ => LocalEvidenceState::NoEvidence,
    }
}

/// Most advanced state found across all windows.
///
/// Order: `accepted > submitted > validated > generated > no_evidence`.
/// Draft and rejected windows with files count as `generated`.
pub fn determine_local_state(windows: &BTreeMap<String, WindowState>) -> LocalEvidenceState {
    windows
        .values()
        .map(window_local_state)
        .max_by_key(|state| state.rank())
        .unwrap_or(LocalEvidenceState::NoEvidence)
}

/// Heuristic: no tools is unknown, one is partial, two or more is full.
///
/// The description is accepted for callers that want to refine the estimate
/// but does not change the result today.
pub fn determine_automation_capability(
    applicable_tools: &[String],
    _task_description: &str,
) -> AutomationCapability {
    match applicable_tools.len() {
        0 => AutomationCapability::Unknown,
        1 => AutomationCapability::PartiallyAutomated,
        _ => AutomationCapability::FullyAutomated,
    }
}

/// Automation estimate with per-task overrides taking precedence
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AutomationPolicy {
    /// Task reference to forced capability
    #[serde(default)]
    pub overrides: HashMap<String, AutomationCapability>,
}

impl AutomationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override(mut self, task_ref: impl Into<String>, level: AutomationCapability) -> Self {
        self.overrides.insert(task_ref.into(), level);
        self
    }

    pub fn resolve(
        &self,
        task_ref: &str,
        applicable_tools: &[String],
        task_description: &str,
    ) -> AutomationCapability {
        self.overrides
            .get(task_ref)
            .copied()
            .unwrap_or_else(|| determine_automation_capability(applicable_tools, task_description))
    }
}

const TOOL_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "github-permissions",
        &["github", "repository", "access", "permissions"],
    ),
    (
        "terraform-security-analyzer",
        &["terraform", "infrastructure", "iam", "security"],
    ),
    ("google-workspace", &["google", "workspace", "drive", "docs"]),
    ("atmos-stack-analyzer", &["atmos", "stack", "multi-environment"]),
];

/// Tools that already produced evidence for this task, plus tools whose
/// keywords appear in the task name or description. Sorted, deduplicated.
pub fn detect_applicable_tools(
    task_text: Option<&str>,
    windows: &BTreeMap<String, WindowState>,
) -> Vec<String> {
    let mut tools: BTreeSet<String> = windows
        .values()
        .flat_map(|w| w.tools_used.iter().cloned())
        .collect();

    if let Some(text) = task_text {
        let text = text.to_lowercase();
        for (tool, keywords) in TOOL_KEYWORDS {
            if keywords.iter().any(|k| text.contains(k)) {
                tools.insert((*tool).to_string());
            }
        }
    }

    tools.into_iter().collect()
}

/// Latest generation and submission timestamps across all windows.
pub fn latest_timestamps(
    windows: &BTreeMap<String, WindowState>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let generated = windows.values().filter_map(|w| w.generated_at).max();
    let submitted = windows.values().filter_map(|w| w.submitted_at).max();
    (generated, submitted)
}
