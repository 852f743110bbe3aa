//! Engine configuration
//!
//! Loaded from YAML with every field defaulted, then optionally overridden by
//! `EVIDENCE_DATA_ROOT`. Path helpers are pure and never touch the disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::aggregate::AutomationPolicy;
use crate::error::{EvidenceError, Result};
use crate::state::AutomationCapability;
use crate::validation::ValidationMode;

pub const DATA_ROOT_ENV: &str = "EVIDENCE_DATA_ROOT";

/// Folder layout for a task/window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    /// Evidence and sources share the window root; metadata in `.submission/`
    #[default]
    Flat,
    /// `evidence/`, `sources/`, `metadata/` under the window root
    Structured,
}

/// Thresholds shared by the readiness rules and the evaluator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub mode: ValidationMode,

    /// Overall evaluation score (0-100) needed to pass
    pub pass_threshold: f64,

    pub max_file_size_bytes: u64,

    /// Lowercase extensions including the dot
    pub allowed_extensions: Vec<String>,

    /// Fewer files than this draws a warning
    pub min_recommended_files: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            mode: ValidationMode::Lenient,
            pass_threshold: 70.0,
            max_file_size_bytes: 50 * 1024 * 1024,
            allowed_extensions: [
                ".md", ".csv", ".json", ".pdf", ".xlsx", ".txt", ".yaml", ".yml",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_recommended_files: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub data_root: PathBuf,

    /// Relative to `data_root`
    pub evidence_dir: String,

    /// Relative to `data_root`; holds batch manifests
    pub batches_dir: String,

    /// Relative to `data_root`; holds the state cache
    pub state_dir: String,

    pub layout: LayoutMode,

    /// Render markdown to a durable format when files enter `ready/`
    pub convert_markdown_on_ready: bool,

    pub validation: ValidationSettings,

    pub automation_overrides: HashMap<String, AutomationCapability>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./data"),
            evidence_dir: "evidence".to_string(),
            batches_dir: "submissions".to_string(),
            state_dir: ".state".to_string(),
            layout: LayoutMode::Flat,
            convert_markdown_on_ready: true,
            validation: ValidationSettings::default(),
            automation_overrides: HashMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn with_data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.data_root = root.into();
        self
    }

    pub fn with_layout(mut self, layout: LayoutMode) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_validation_mode(mut self, mode: ValidationMode) -> Self {
        self.validation.mode = mode;
        self
    }

    /// Read a YAML config file and apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EvidenceError::not_found("config", path)
            } else {
                EvidenceError::io("read", path, e)
            }
        })?;
        let config: Self = serde_yaml::from_str(&raw)
            .map_err(|e| EvidenceError::Config(format!("{}: {e}", path.display())))?;
        let config = config.apply_env();
        debug!(path = %path.display(), data_root = %config.data_root.display(), "loaded engine config");
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        Self::default().apply_env()
    }

    fn apply_env(mut self) -> Self {
        if let Ok(root) = std::env::var(DATA_ROOT_ENV) {
            if !root.trim().is_empty() {
                self.data_root = PathBuf::from(root);
            }
        }
        self
    }

    pub fn evidence_root(&self) -> PathBuf {
        self.data_root.join(&self.evidence_dir)
    }

    pub fn batches_root(&self) -> PathBuf {
        self.data_root.join(&self.batches_dir)
    }

    pub fn state_root(&self) -> PathBuf {
        self.data_root.join(&self.state_dir)
    }

    pub fn automation_policy(&self) -> AutomationPolicy {
        AutomationPolicy {
            overrides: self.automation_overrides.clone(),
        }
    }
}
