//! Folder layout for one task/window
//!
//! Two shapes are supported. Structured windows split evidence, sources and
//! metadata into their own directories. Flat windows keep everything in the
//! window root with metadata under a hidden `.submission/`. Path accessors are
//! pure; only [`EvidenceFolderStructure::create`] and
//! [`EvidenceFolderStructure::create_readme`] touch the disk.

use std::fmt;
use std::path::{Path, PathBuf};

use evidence_core::naming::{SUBFOLDER_ARCHIVE, SUBFOLDER_SUBMITTED};
use evidence_core::{LayoutMode, Result};

use crate::fs::{atomic_write, ensure_dir};

pub const SUBMISSION_META_DIR: &str = ".submission";
pub const GENERATION_META_DIR: &str = ".generation";
pub const VALIDATION_META_DIR: &str = ".validation";

pub const SUBMISSION_FILE: &str = "submission.yaml";
pub const VALIDATION_FILE: &str = "validation.yaml";
pub const HISTORY_FILE: &str = "history.yaml";
pub const PROVENANCE_FILE: &str = "provenance.yaml";
pub const GENERATION_FILE: &str = "metadata.yaml";

/// Planning artifacts that live beside evidence but are never evidence.
pub(crate) const NON_EVIDENCE_FILES: &[&str] =
    &["collection_plan.md", "collection_plan_metadata.yaml"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvidenceFolderStructure {
    root: PathBuf,
    mode: LayoutMode,
}

impl EvidenceFolderStructure {
    pub fn new(root: impl Into<PathBuf>, mode: LayoutMode) -> Self {
        Self {
            root: root.into(),
            mode,
        }
    }

    pub fn mode(&self) -> LayoutMode {
        self.mode
    }

    pub fn root_dir(&self) -> &Path {
        &self.root
    }

    pub fn evidence_dir(&self) -> PathBuf {
        match self.mode {
            LayoutMode::Structured => self.root.join("evidence"),
            LayoutMode::Flat => self.root.clone(),
        }
    }

    pub fn sources_dir(&self) -> PathBuf {
        match self.mode {
            LayoutMode::Structured => self.root.join("sources"),
            LayoutMode::Flat => self.root.clone(),
        }
    }

    pub fn metadata_dir(&self) -> PathBuf {
        match self.mode {
            LayoutMode::Structured => self.root.join("metadata"),
            LayoutMode::Flat => self.root.join(SUBMISSION_META_DIR),
        }
    }

    pub fn evidence_file_path(&self, filename: &str) -> PathBuf {
        self.evidence_dir().join(filename)
    }

    pub fn source_file_path(&self, filename: &str) -> PathBuf {
        self.sources_dir().join(filename)
    }

    pub fn metadata_file_path(&self, filename: &str) -> PathBuf {
        self.metadata_dir().join(filename)
    }

    /// Structured windows keep the plan as YAML metadata; flat windows keep
    /// the markdown plan in the root.
    pub fn collection_plan_path(&self) -> PathBuf {
        match self.mode {
            LayoutMode::Structured => self.metadata_file_path("collection_plan.yaml"),
            LayoutMode::Flat => self.root.join("collection_plan.md"),
        }
    }

    pub fn provenance_path(&self) -> PathBuf {
        self.metadata_file_path(PROVENANCE_FILE)
    }

    pub fn submission_path(&self) -> PathBuf {
        self.metadata_file_path(SUBMISSION_FILE)
    }

    pub fn validation_path(&self) -> PathBuf {
        self.metadata_file_path(VALIDATION_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.metadata_file_path(HISTORY_FILE)
    }

    pub fn readme_path(&self) -> PathBuf {
        self.root.join("README.md")
    }

    /// Create every directory of the active layout. Any failure is fatal.
    pub fn create(&self) -> Result<()> {
        let mut dirs = vec![self.root.clone(), self.evidence_dir(), self.metadata_dir()];
        if self.mode == LayoutMode::Structured {
            dirs.push(self.sources_dir());
        }
        for dir in &dirs {
            ensure_dir(dir)?;
        }
        Ok(())
    }

    /// Write README.md describing the layout. No-op for flat windows.
    pub fn create_readme(&self, task_ref: &str, window: &str) -> Result<()> {
        if self.mode == LayoutMode::Flat {
            return Ok(());
        }
        atomic_write(&self.readme_path(), readme(task_ref, window).as_bytes())
    }

    pub fn exists(&self) -> bool {
        self.root.exists()
    }
}

fn readme(task_ref: &str, window: &str) -> String {
    format!(
        "# Evidence Collection: {task_ref} - {window}

## Directory Structure

- **evidence/** - Main evidence documents (CSV, Markdown, JSON)
- **sources/** - Full supporting source files
- **metadata/** - Collection metadata
  - {PROVENANCE_FILE} - Collection context and source revision
  - collection_plan.yaml - Inventory of all evidence files
  - {SUBMISSION_FILE} - Submission tracking and status
  - {VALIDATION_FILE} - Validation results
  - {HISTORY_FILE} - Submission history

## Integrity

Evidence file checksums are recorded in metadata/{SUBMISSION_FILE} and
re-verified before submission.

---
*Generated by evidence-store*
"
    )
}

/// Lifecycle stage of a window's evidence, each backed by a subfolder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// The window directory itself
    Root,
    Wip,
    Ready,
    /// Hidden; excluded from scans so evidence is never submitted twice
    Submitted,
    Archive,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Root,
        Stage::Wip,
        Stage::Ready,
        Stage::Submitted,
        Stage::Archive,
    ];

    /// Subfolder name, `None` for the window root.
    pub fn dir_name(self) -> Option<&'static str> {
        match self {
            Stage::Root => None,
            Stage::Wip => Some("wip"),
            Stage::Ready => Some("ready"),
            Stage::Submitted => Some(SUBFOLDER_SUBMITTED),
            Stage::Archive => Some(SUBFOLDER_ARCHIVE),
        }
    }

    pub fn path_in(self, window_dir: &Path) -> PathBuf {
        match self.dir_name() {
            Some(name) => window_dir.join(name),
            None => window_dir.to_path_buf(),
        }
    }

    pub fn from_dir_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.dir_name() == Some(name))
    }

    /// Stages whose files count toward a window's evidence inventory.
    pub fn is_scanned(self) -> bool {
        self != Stage::Submitted
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name().unwrap_or("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_paths() {
        let layout = EvidenceFolderStructure::new("/data/ET-0001/2025-Q4", LayoutMode::Flat);
        assert_eq!(layout.evidence_dir(), PathBuf::from("/data/ET-0001/2025-Q4"));
        assert_eq!(layout.sources_dir(), layout.evidence_dir());
        assert_eq!(
            layout.submission_path(),
            PathBuf::from("/data/ET-0001/2025-Q4/.submission/submission.yaml")
        );
        assert_eq!(
            layout.collection_plan_path(),
            PathBuf::from("/data/ET-0001/2025-Q4/collection_plan.md")
        );
    }

    #[test]
    fn test_structured_paths() {
        let layout = EvidenceFolderStructure::new("/w", LayoutMode::Structured);
        assert_eq!(layout.evidence_dir(), PathBuf::from("/w/evidence"));
        assert_eq!(layout.sources_dir(), PathBuf::from("/w/sources"));
        assert_eq!(layout.history_path(), PathBuf::from("/w/metadata/history.yaml"));
        assert_eq!(
            layout.collection_plan_path(),
            PathBuf::from("/w/metadata/collection_plan.yaml")
        );
    }

    #[test]
    fn test_create_and_readme() {
        let tmp = tempfile::tempdir().unwrap();
        let structured = EvidenceFolderStructure::new(tmp.path().join("s"), LayoutMode::Structured);
        assert!(!structured.exists());
        structured.create().unwrap();
        assert!(structured.exists());
        assert!(structured.sources_dir().is_dir());
        assert!(structured.metadata_dir().is_dir());

        structured.create_readme("ET-0001", "2025-Q4").unwrap();
        structured.create_readme("ET-0001", "2025-Q4").unwrap();
        let text = std::fs::read_to_string(structured.readme_path()).unwrap();
        assert!(text.starts_with("# Evidence Collection: ET-0001 - 2025-Q4"));

        let flat = EvidenceFolderStructure::new(tmp.path().join("f"), LayoutMode::Flat);
        flat.create().unwrap();
        flat.create_readme("ET-0001", "2025-Q4").unwrap();
        assert!(!flat.readme_path().exists());
        assert!(flat.metadata_dir().ends_with(".submission"));
    }

    #[test]
    fn test_stage_dirs() {
        assert_eq!(Stage::Submitted.dir_name(), Some(".submitted"));
        assert_eq!(Stage::from_dir_name("ready"), Some(Stage::Ready));
        assert_eq!(Stage::from_dir_name("other"), None);
        assert!(!Stage::Submitted.is_scanned());
        assert_eq!(Stage::Root.path_in(Path::new("/w")), PathBuf::from("/w"));
    }
}
