//! Generation metadata
//!
//! Provenance written by upstream collectors into `.generation/metadata.yaml`.
//! Read-only input for this engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationMetadata {
    pub generated_at: DateTime<Utc>,

    /// Generating actor (grctool-cli, claude-code-assisted, manual)
    #[serde(default)]
    pub generated_by: String,

    /// tool_coordination, ai_generation, manual_upload
    #[serde(default)]
    pub generation_method: String,

    #[serde(default)]
    pub task_id: u32,

    #[serde(default)]
    pub task_ref: String,

    #[serde(default)]
    pub window: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools_used: Vec<String>,

    #[serde(default)]
    pub files_generated: Vec<FileMetadata>,

    /// generated, validated, submitted
    #[serde(default)]
    pub status: String,
}

impl GenerationMetadata {
    /// Look up a generated file by its bare filename.
    pub fn file(&self, filename: &str) -> Option<&FileMetadata> {
        self.files_generated.iter().find(|f| f.filename() == filename)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Relative to the window directory
    pub path: String,

    /// Algorithm-tagged digest ("sha256:abc123...")
    #[serde(default)]
    pub checksum: String,

    #[serde(default)]
    pub size_bytes: u64,

    pub generated_at: DateTime<Utc>,
}

impl FileMetadata {
    pub fn filename(&self) -> &str {
        self.path.rsplit(['/', '\\']).next().unwrap_or(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_collector_metadata() {
        let yaml = r#"
generated_at: 2025-10-15T10:00:00Z
generated_by: grctool-cli
generation_method: tool_coordination
task_id: 1
task_ref: ET-0001
window: 2025-Q4
tools_used: [github-permissions, terraform-scanner]
files_generated:
  - path: 01_github_access.md
    checksum: "sha256:9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
    size_bytes: 4
    generated_at: 2025-10-15T10:00:00Z
  - path: sub/02_iam.csv
    checksum: ""
    size_bytes: 10
    generated_at: 2025-10-15T10:00:01Z
status: generated
"#;
        let meta: GenerationMetadata = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(meta.tools_used.len(), 2);
        assert_eq!(meta.file("02_iam.csv").unwrap().size_bytes, 10);
        assert!(meta.file("missing.md").is_none());
    }
}
