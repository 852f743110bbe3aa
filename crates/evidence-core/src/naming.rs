//! Naming rules for task and window directories
//!
//! Task directories begin with (or embed) the task reference:
//! `ET-0001`, `ET-0001_Access_Review`, or `Access_Review_ET-0001_328001`.
//! Window directories are period labels: `2025`, `2025-Q4`, `2025-10`, `2025-H1`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Hidden stage folder for evidence that has been sent to the platform
pub const SUBFOLDER_SUBMITTED: &str = ".submitted";

/// Stage folder for evidence synced back from the platform or retired locally
pub const SUBFOLDER_ARCHIVE: &str = "archive";

pub const MAX_TASK_NAME_LENGTH: usize = 100;

static TASK_REF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^ET-(\d+)$").expect("valid regex"));
static TASK_DIR_PREFIXED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(ET-\d+)(?:_(.+))?$").expect("valid regex"));
static TASK_DIR_PLATFORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)_(ET-\d{4})_(\d+)$").expect("valid regex"));
static UNSAFE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s\-_()\[\]]").expect("valid regex"));
static MULTI_UNDERSCORE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}").expect("valid regex"));

static WINDOW_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").expect("valid regex"));
static WINDOW_QUARTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-Q[1-4]$").expect("valid regex"));
static WINDOW_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])$").expect("valid regex"));
static WINDOW_HALF: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-H[12]$").expect("valid regex"));
static WINDOW_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$").expect("valid regex"));

/// True for references of the form `ET-<digits>`
pub fn is_task_ref(value: &str) -> bool {
    TASK_REF.is_match(value)
}

/// `ET-0001` -> `1`
pub fn task_id_from_ref(task_ref: &str) -> Option<u32> {
    TASK_REF
        .captures(task_ref)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Components recovered from a task directory name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDirName {
    pub task_ref: String,
    /// Human name with underscores turned back into spaces; empty if absent
    pub name: String,
    pub platform_id: Option<String>,
}

/// Parse any of the recognized task directory shapes.
pub fn parse_task_dir(dir_name: &str) -> Option<TaskDirName> {
    if let Some(caps) = TASK_DIR_PLATFORM.captures(dir_name) {
        return Some(TaskDirName {
            name: caps[1].replace('_', " "),
            task_ref: caps[2].to_string(),
            platform_id: Some(caps[3].to_string()),
        });
    }
    let caps = TASK_DIR_PREFIXED.captures(dir_name)?;
    Some(TaskDirName {
        task_ref: caps[1].to_string(),
        name: caps
            .get(2)
            .map(|m| m.as_str().replace('_', " "))
            .unwrap_or_default(),
        platform_id: None,
    })
}

/// Does this directory hold evidence for `task_ref`?
pub fn matches_task_ref(dir_name: &str, task_ref: &str) -> bool {
    if dir_name == task_ref {
        return true;
    }
    parse_task_dir(dir_name).is_some_and(|parsed| parsed.task_ref == task_ref)
}

/// `ET-0001_Access_Review` -> `Access Review`
pub fn task_name_from_dir(dir_name: &str) -> String {
    parse_task_dir(dir_name).map(|p| p.name).unwrap_or_default()
}

/// Canonical directory name: `{SanitizedName}_{TaskRef}_{PlatformId}`
pub fn task_dir_name(task_name: &str, task_ref: &str, platform_id: &str) -> String {
    format!("{}_{}_{}", sanitize_task_name(task_name), task_ref, platform_id)
}

/// Make a task name safe for use as a directory name.
pub fn sanitize_task_name(name: &str) -> String {
    let safe = UNSAFE_CHARS.replace_all(name, "_");
    let safe = safe.replace(' ', "_");
    let safe = MULTI_UNDERSCORE.replace_all(&safe, "_");
    let mut safe = safe.trim_matches('_').to_string();
    if safe.chars().count() > MAX_TASK_NAME_LENGTH {
        safe = safe.chars().take(MAX_TASK_NAME_LENGTH).collect();
        safe = safe.trim_end_matches('_').to_string();
    }
    safe
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowKind {
    Year,
    Quarter,
    Month,
    Half,
}

/// Classify a window directory name; `None` if it is not a window.
pub fn window_kind(name: &str) -> Option<WindowKind> {
    if WINDOW_YEAR.is_match(name) {
        Some(WindowKind::Year)
    } else if WINDOW_QUARTER.is_match(name) {
        Some(WindowKind::Quarter)
    } else if WINDOW_MONTH.is_match(name) {
        Some(WindowKind::Month)
    } else if WINDOW_HALF.is_match(name) {
        Some(WindowKind::Half)
    } else {
        None
    }
}

pub fn is_window_dir(name: &str) -> bool {
    window_kind(name).is_some()
}

/// Window labels accepted on a submission: any window directory shape or a `YYYY-MM-DD` date.
pub fn is_valid_window_label(label: &str) -> bool {
    is_window_dir(label) || WINDOW_DATE.is_match(label)
}
