//! Scan context: cancellation and deadline shared by long-running operations
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{EvidenceError, Result};

/// Threaded through bulk scans, batch listings, and batch runs so a caller
/// can abort them between entries. Cheap to clone; clones share the token.
#[derive(Debug, Clone)]
pub struct ScanContext {
    pub trace_id: String,
    cancelled: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Default for ScanContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanContext {
    pub fn new() -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            cancelled: Arc::new(AtomicBool::new(false)),
            deadline: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// `Err(Cancelled)` once the token fires or the deadline passes.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(EvidenceError::Cancelled)
        } else {
            Ok(())
        }
    }
}
