//! Validation profiles
//!
//! Thresholds and weights for the readiness rules and the scoring evaluator,
//! with presets per validation mode.

use evidence_core::{ValidationMode, ValidationSettings};
use serde::{Deserialize, Serialize};

/// Weight of each scoring dimension in the overall score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionWeights {
    pub completeness: f64,
    pub requirements_match: f64,
    pub quality: f64,
    pub control_alignment: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            completeness: 0.30,
            requirements_match: 0.30,
            quality: 0.20,
            control_alignment: 0.20,
        }
    }
}

impl DimensionWeights {
    pub fn total(&self) -> f64 {
        self.completeness + self.requirements_match + self.quality + self.control_alignment
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationProfile {
    /// Profile name (e.g., "strict@1.0", "lenient@1.0")
    pub name: String,

    pub mode: ValidationMode,

    // === Scoring ===

    /// Overall score (0-100) needed to pass
    pub pass_threshold: f64,

    pub weights: DimensionWeights,

    // === Readiness rules ===

    pub max_file_size_bytes: u64,

    /// Lowercase, dot-prefixed
    pub allowed_extensions: Vec<String>,

    /// Below this the file count draws a warning
    pub min_recommended_files: usize,

    /// Recompute recorded checksums against the files on disk
    pub verify_checksums: bool,
}

impl ValidationProfile {
    /// Errors and warnings both block submission
    pub fn strict() -> Self {
        Self {
            name: "strict@1.0".to_string(),
            mode: ValidationMode::Strict,
            ..Self::from_settings(&ValidationSettings::default())
        }
    }

    /// Only errors block submission
    pub fn lenient() -> Self {
        Self {
            name: "lenient@1.0".to_string(),
            mode: ValidationMode::Lenient,
            ..Self::from_settings(&ValidationSettings::default())
        }
    }

    /// No readiness checks at all
    pub fn skip() -> Self {
        Self {
            name: "skip@1.0".to_string(),
            mode: ValidationMode::Skip,
            verify_checksums: false,
            ..Self::from_settings(&ValidationSettings::default())
        }
    }

    pub fn for_mode(mode: ValidationMode) -> Self {
        match mode {
            ValidationMode::Strict => Self::strict(),
            ValidationMode::Lenient => Self::lenient(),
            ValidationMode::Skip => Self::skip(),
        }
    }

    /// Profile built from engine configuration
    pub fn from_settings(settings: &ValidationSettings) -> Self {
        Self {
            name: format!("{}@config", settings.mode),
            mode: settings.mode,
            pass_threshold: settings.pass_threshold,
            weights: DimensionWeights::default(),
            max_file_size_bytes: settings.max_file_size_bytes,
            allowed_extensions: settings
                .allowed_extensions
                .iter()
                .map(|e| e.to_ascii_lowercase())
                .collect(),
            min_recommended_files: settings.min_recommended_files,
            verify_checksums: true,
        }
    }

    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_pass_threshold(mut self, threshold: f64) -> Self {
        self.pass_threshold = threshold;
        self
    }

    pub fn with_weights(mut self, weights: DimensionWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn is_extension_allowed(&self, filename: &str) -> bool {
        let ext = crate::extension_of(filename);
        self.allowed_extensions.iter().any(|allowed| *allowed == ext)
    }
}

impl Default for ValidationProfile {
    fn default() -> Self {
        Self::lenient()
    }
}
