//! Batch Manager
//!
//! Persists batch manifests under `<data_root>/<batches_dir>/<batch_id>/manifest.yaml`.
//! The continue-on-error policy is applied by [`crate::workflow::BatchRunner`];
//! this type only stores and reports.

use chrono::Utc;
use evidence_core::{EngineConfig, EvidenceError, Result, ScanContext, SubmissionBatch};
use tracing::{debug, warn};

use crate::fs::{read_dir_or_empty, read_yaml, write_yaml};
use crate::paths::{check_component, StorePaths};

/// `batch-YYYYMMDD-HHMMSS-<6 hex>`: sorts by creation time, unique within a second.
pub fn new_batch_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("batch-{}-{}", Utc::now().format("%Y%m%d-%H%M%S"), &suffix[..6])
}

pub struct BatchManager {
    paths: StorePaths,
}

impl BatchManager {
    pub fn new(paths: StorePaths) -> Self {
        Self { paths }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(StorePaths::from_config(config))
    }

    pub fn save_batch(&self, batch: &SubmissionBatch) -> Result<()> {
        check_component("batch_id", &batch.batch_id)?;
        if !batch.counts_consistent() {
            return Err(EvidenceError::InvalidInput(format!(
                "batch {} counts exceed its task list ({} submitted + {} failed > {})",
                batch.batch_id, batch.submitted_tasks, batch.failed_tasks, batch.total_tasks
            )));
        }
        write_yaml(&self.paths.batch_manifest(&batch.batch_id), batch, "batch manifest")?;
        debug!(batch_id = %batch.batch_id, status = ?batch.status, "saved batch");
        Ok(())
    }

    /// `NotFound` for an unknown id, `Malformed` for an unparsable manifest.
    pub fn load_batch(&self, batch_id: &str) -> Result<SubmissionBatch> {
        check_component("batch_id", batch_id)?;
        read_yaml(&self.paths.batch_manifest(batch_id), "batch")
    }

    /// Every readable batch, most recently created first. Unreadable manifests
    /// are skipped.
    pub fn list_batches(&self, ctx: &ScanContext) -> Result<Vec<SubmissionBatch>> {
        let mut batches = Vec::new();
        for entry in read_dir_or_empty(self.paths.batches_root())? {
            ctx.check()?;
            if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            let id = entry.file_name().to_string_lossy().into_owned();
            match self.load_batch(&id) {
                Ok(batch) => batches.push(batch),
                Err(err) => warn!(batch_id = %id, error = %err, "skipping unreadable batch"),
            }
        }
        batches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(batches)
    }
}
