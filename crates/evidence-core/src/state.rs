//! Evidence task state
//!
//! Per-task and per-window snapshots derived from what a scan finds on disk.
//! `EvidenceTaskState::local_state` is a cache of the aggregation over its
//! windows; recompute it with [`EvidenceTaskState::refresh_derived`] after
//! touching `windows`.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::determine_local_state;
use crate::submission::SubmissionStatus;

/// Complete state for one evidence task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceTaskState {
    /// Human readable reference (ET-0001)
    pub task_ref: String,

    /// Numeric id parsed from the reference
    pub task_id: u32,

    pub task_name: String,

    // === Remote sync state ===

    /// Status reported by the compliance platform (pending, in_progress, completed)
    #[serde(default)]
    pub remote_status: String,

    #[serde(default)]
    pub remote_completed: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_synced_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,

    // === Local evidence state ===

    /// Most advanced state across `windows`
    pub local_state: LocalEvidenceState,

    /// Window label (2025-Q4) to window state
    #[serde(default)]
    pub windows: BTreeMap<String, WindowState>,

    // === Automation ===

    pub automation_level: AutomationCapability,

    #[serde(default)]
    pub applicable_tools: Vec<String>,

    // === Timestamps ===

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_generated_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_submitted_at: Option<DateTime<Utc>>,

    pub last_scanned_at: DateTime<Utc>,
}

impl EvidenceTaskState {
    /// Empty state for a task with no local evidence yet
    pub fn new(task_ref: impl Into<String>, task_id: u32, task_name: impl Into<String>) -> Self {
        Self {
            task_ref: task_ref.into(),
            task_id,
            task_name: task_name.into(),
            remote_status: String::new(),
            remote_completed: false,
            last_synced_at: None,
            framework: None,
            local_state: LocalEvidenceState::NoEvidence,
            windows: BTreeMap::new(),
            automation_level: AutomationCapability::Unknown,
            applicable_tools: Vec::new(),
            last_generated_at: None,
            last_submitted_at: None,
            last_scanned_at: Utc::now(),
        }
    }

    pub fn with_window(mut self, window: WindowState) -> Self {
        self.windows.insert(window.window.clone(), window);
        self.refresh_derived();
        self
    }

    /// Recompute every field that is a function of `windows`.
    pub fn refresh_derived(&mut self) {
        self.local_state = determine_local_state(&self.windows);
        let (generated, submitted) = crate::aggregate::latest_timestamps(&self.windows);
        self.last_generated_at = generated;
        self.last_submitted_at = submitted;
    }
}

/// Evidence state for one collection window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowState {
    /// "2025-Q4", "2025", "2025-10", ...
    pub window: String,

    // === File inventory ===

    pub file_count: usize,

    pub total_bytes: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_file: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest_file: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileState>,

    // === Generation metadata (.generation/metadata.yaml) ===

    #[serde(default)]
    pub has_generation_meta: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_method: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_by: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_used: Vec<String>,

    // === Submission metadata (.submission/submission.yaml) ===

    #[serde(default)]
    pub has_submission_meta: bool,

    /// Explicit status from the submission record, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_status: Option<SubmissionStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_id: Option<String>,
}

impl WindowState {
    pub fn new(window: impl Into<String>) -> Self {
        Self {
            window: window.into(),
            file_count: 0,
            total_bytes: 0,
            oldest_file: None,
            newest_file: None,
            files: Vec::new(),
            has_generation_meta: false,
            generation_method: None,
            generated_at: None,
            generated_by: None,
            tools_used: Vec::new(),
            has_submission_meta: false,
            submission_status: None,
            submitted_at: None,
            submission_id: None,
        }
    }

    /// Record one observed file, keeping counts and the time range in step.
    pub fn push_file(&mut self, file: FileState) {
        self.file_count += 1;
        self.total_bytes += file.size_bytes;
        if let Some(modified) = file.modified_at {
            if self.oldest_file.map_or(true, |t| modified < t) {
                self.oldest_file = Some(modified);
            }
            if self.newest_file.map_or(true, |t| modified > t) {
                self.newest_file = Some(modified);
            }
        }
        self.files.push(file);
    }

    pub fn with_status(mut self, status: SubmissionStatus) -> Self {
        self.has_submission_meta = true;
        self.submission_status = Some(status);
        self
    }
}

/// Metadata for a single evidence file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileState {
    /// Bare filename, never a full path
    pub filename: String,

    pub size_bytes: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,

    /// `None` when the file's metadata could not be read
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,

    /// Produced by a tool rather than added by hand
    #[serde(default)]
    pub is_generated: bool,
}

/// Overall state of local evidence for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalEvidenceState {
    NoEvidence,
    Generated,
    Validated,
    Submitted,
    Accepted,
    /// Evidence was rejected and needs rework. Never produced by aggregation.
    Rejected,
}

impl LocalEvidenceState {
    /// Position in the lifecycle order `no_evidence < generated < validated < submitted < accepted`.
    pub fn rank(self) -> u8 {
        match self {
            Self::NoEvidence => 0,
            Self::Generated | Self::Rejected => 1,
            Self::Validated => 2,
            Self::Submitted => 3,
            Self::Accepted => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoEvidence => "no_evidence",
            Self::Generated => "generated",
            Self::Validated => "validated",
            Self::Submitted => "submitted",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for LocalEvidenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Level of automation available for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationCapability {
    FullyAutomated,
    PartiallyAutomated,
    ManualOnly,
    Unknown,
}

impl AutomationCapability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullyAutomated => "fully_automated",
            Self::PartiallyAutomated => "partially_automated",
            Self::ManualOnly => "manual_only",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AutomationCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cached task states keyed by task reference
///
/// Plain data; the synchronized owner lives in the store crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateCache {
    pub last_scan: DateTime<Utc>,

    #[serde(default)]
    pub tasks: BTreeMap<String, EvidenceTaskState>,
}

impl Default for StateCache {
    fn default() -> Self {
        Self {
            last_scan: Utc::now(),
            tasks: BTreeMap::new(),
        }
    }
}

impl StateCache {
    pub fn get_task(&self, task_ref: &str) -> Option<&EvidenceTaskState> {
        self.tasks.get(task_ref)
    }

    /// Insert or replace a task, re-deriving its cached fields first.
    pub fn set_task(&mut self, mut state: EvidenceTaskState) {
        state.refresh_derived();
        self.tasks.insert(state.task_ref.clone(), state);
        self.last_scan = Utc::now();
    }

    pub fn tasks_by_state(&self, target: LocalEvidenceState) -> Vec<&EvidenceTaskState> {
        self.tasks.values().filter(|t| t.local_state == target).collect()
    }

    pub fn tasks_by_automation(&self, level: AutomationCapability) -> Vec<&EvidenceTaskState> {
        self.tasks
            .values()
            .filter(|t| t.automation_level == level)
            .collect()
    }

    pub fn state_summary(&self) -> HashMap<LocalEvidenceState, usize> {
        let mut summary = HashMap::new();
        for task in self.tasks.values() {
            *summary.entry(task.local_state).or_insert(0) += 1;
        }
        summary
    }

    pub fn automation_summary(&self) -> HashMap<AutomationCapability, usize> {
        let mut summary = HashMap::new();
        for task in self.tasks.values() {
            *summary.entry(task.automation_level).or_insert(0) += 1;
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn file(name: &str, size: u64, hour: u32) -> FileState {
        FileState {
            filename: name.to_string(),
            size_bytes: size,
            checksum: None,
            modified_at: Some(Utc.with_ymd_and_hms(2025, 10, 1, hour, 0, 0).unwrap()),
            is_generated: false,
        }
    }

    #[test]
    fn test_push_file_tracks_range() {
        let mut window = WindowState::new("2025-Q4");
        window.push_file(file("b.md", 200, 12));
        window.push_file(file("a.md", 100, 9));
        window.push_file(file("c.md", 50, 15));
        let mut unreadable = file("d.md", 0, 0);
        unreadable.modified_at = None;
        window.push_file(unreadable);

        assert_eq!(window.file_count, 4);
        assert_eq!(window.total_bytes, 350);
        assert_eq!(window.oldest_file.unwrap().format("%H").to_string(), "09");
        assert_eq!(window.newest_file.unwrap().format("%H").to_string(), "15");
    }

    #[test]
    fn test_set_task_recomputes_local_state() {
        let mut cache = StateCache::default();
        let mut task = EvidenceTaskState::new("ET-0001", 1, "Access Review");
        let mut window = WindowState::new("2025-Q4");
        window.push_file(file("a.md", 10, 1));
        task.windows.insert(window.window.clone(), window);
        // stale cached value must not survive
        task.local_state = LocalEvidenceState::Accepted;

        cache.set_task(task);
        assert_eq!(
            cache.get_task("ET-0001").unwrap().local_state,
            LocalEvidenceState::Generated
        );
    }

    #[test]
    fn test_summaries() {
        let mut cache = StateCache::default();
        cache.set_task(EvidenceTaskState::new("ET-0001", 1, "A"));
        cache.set_task(
            EvidenceTaskState::new("ET-0002", 2, "B")
                .with_window(WindowState::new("2025-Q4").with_status(SubmissionStatus::Submitted)),
        );

        let summary = cache.state_summary();
        assert_eq!(summary.get(&LocalEvidenceState::NoEvidence), Some(&1));
        assert_eq!(summary.get(&LocalEvidenceState::Submitted), Some(&1));
        assert_eq!(cache.tasks_by_state(LocalEvidenceState::Submitted).len(), 1);
        assert_eq!(
            cache.automation_summary().get(&AutomationCapability::Unknown),
            Some(&2)
        );
    }

    #[test]
    fn test_state_serializes_snake_case() {
        let json = serde_json::to_string(&LocalEvidenceState::NoEvidence).unwrap();
        assert_eq!(json, "\"no_evidence\"");
        let json = serde_json::to_string(&AutomationCapability::PartiallyAutomated).unwrap();
        assert_eq!(json, "\"partially_automated\"");
    }
}
