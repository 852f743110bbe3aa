//! Evidence Core: data model, naming, checksums, and state aggregation
//!
//! Shared vocabulary for the evidence lifecycle engine. Everything here is
//! either plain data or a pure function, apart from the checksum helpers
//! that stream files from disk.

pub mod aggregate;
pub mod batch;
pub mod checksum;
pub mod config;
pub mod context;
pub mod error;
pub mod generation;
pub mod metadata;
pub mod naming;
pub mod state;
pub mod submission;
pub mod telemetry;
pub mod validation;

pub use aggregate::{
    detect_applicable_tools, determine_automation_capability, determine_local_state,
    latest_timestamps, AutomationPolicy,
};
pub use batch::{BatchStatus, BatchSubmissionResult, BatchTaskStatus, SubmissionBatch};
pub use checksum::{sha256_file, verify_file, ChecksumAlgorithm, ChecksumVerdict, TaggedChecksum};
pub use config::{EngineConfig, LayoutMode, ValidationSettings};
pub use context::ScanContext;
pub use error::{EvidenceError, Result};
pub use generation::{FileMetadata, GenerationMetadata};
pub use metadata::{Metadata, MetadataValue};
pub use state::{
    AutomationCapability, EvidenceTaskState, FileState, LocalEvidenceState, StateCache,
    WindowState,
};
pub use submission::{
    EvidenceFileRef, EvidenceSubmission, PlatformAcknowledgement, SubmissionHistory,
    SubmissionHistoryEntry, SubmissionStatus, ValidationStatus,
};
pub use validation::{
    CheckStatus, FindingSeverity, ValidationCheck, ValidationFinding, ValidationMode,
    ValidationResult, ValidationVerdict,
};

/// Engine version
pub const EVIDENCE_ENGINE_VERSION: &str = "1.0.0";
