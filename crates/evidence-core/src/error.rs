//! Unified Error Model
//!
//! Every fallible operation in the engine returns [`EvidenceError`]. Variants
//! carry the path and operation that failed so callers can tell a missing
//! record apart from a corrupt one without string matching.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvidenceError {
    /// The record, file, or batch does not exist yet.
    #[error("NOT_FOUND/{what} at {}", path.display())]
    NotFound { what: String, path: PathBuf },

    #[error("IO/{op} {}: {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A persisted document exists but could not be parsed.
    #[error("MALFORMED/{}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("SERIALIZE/{what}: {source}")]
    Serialize {
        what: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Evidence for this task/window already sits in `.submitted/`.
    #[error("RESUBMISSION/{task_ref} {window} has already been submitted")]
    AlreadySubmitted { task_ref: String, window: String },

    #[error("INVALID/{0}")]
    InvalidInput(String),

    #[error("CANCELLED/operation aborted by caller")]
    Cancelled,

    #[error("CONFIG/{0}")]
    Config(String),
}

impl EvidenceError {
    pub fn not_found(what: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::NotFound {
            what: what.into(),
            path: path.into(),
        }
    }

    pub fn io(op: &'static str, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn malformed<E>(path: impl AsRef<Path>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Malformed {
            path: path.as_ref().to_path_buf(),
            source: Box::new(source),
        }
    }

    pub fn serialize<E>(what: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Serialize {
            what: what.into(),
            source: Box::new(source),
        }
    }

    /// True when the failure means "nothing here yet" rather than a fault.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}

pub type Result<T> = std::result::Result<T, EvidenceError>;
