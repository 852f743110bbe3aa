//! Evidence Store: on-disk lifecycle of collected evidence
//!
//! Everything that touches the managed directory tree lives here:
//!
//! - [`EvidenceFolderStructure`] and [`Stage`] name the paths of a window
//! - [`EvidenceScanner`] derives task and window state from the tree
//! - [`SubmissionCoordinator`] persists submission records, validation results
//!   and history, and moves evidence between stages
//! - [`BatchManager`] stores batch manifests
//! - [`StateStore`] caches scanned state as JSON
//! - [`SubmissionWorkflow`] and [`BatchRunner`] drive submissions through an
//!   injected [`PlatformClient`]
//! - [`EvidenceCleaner`] migrates legacy flat windows
//!
//! # Example
//!
//! ```ignore
//! use evidence_core::{EngineConfig, LocalEvidenceState, ScanContext};
//! use evidence_store::EvidenceStore;
//!
//! let store = EvidenceStore::new(EngineConfig::load("engine.yaml")?);
//! let ctx = ScanContext::new();
//! store.refresh_state(&ctx)?;
//! for task in store.state().tasks_by_state(LocalEvidenceState::Validated) {
//!     println!("{} is validated", task.task_ref);
//! }
//! ```

mod fs;

pub mod batch;
pub mod cleanup;
pub mod coordinator;
pub mod layout;
pub mod paths;
pub mod render;
pub mod scanner;
pub mod state_store;
pub mod workflow;

use std::sync::Arc;

pub use batch::{new_batch_id, BatchManager};
pub use cleanup::{CleanupResult, CleanupSummary, EvidenceCleaner};
pub use coordinator::{FileVerdict, FileVerification, StageMove, SubmissionCoordinator};
pub use layout::{EvidenceFolderStructure, Stage};
pub use paths::StorePaths;
pub use render::DocumentRenderer;
pub use scanner::EvidenceScanner;
pub use state_store::{StateStore, STATE_FILE};
pub use workflow::{
    content_type_for, local_submission_id, BatchRunner, PayloadFile, PlatformClient,
    SubmissionOutcome, SubmissionPayload, SubmissionRequest, SubmissionWorkflow,
};

use evidence_core::{EngineConfig, Result, ScanContext};
use evidence_quality::ValidationProfile;
use tracing::info;

/// Every store component wired from one [`EngineConfig`]
pub struct EvidenceStore {
    config: EngineConfig,
    scanner: EvidenceScanner,
    coordinator: SubmissionCoordinator,
    batches: BatchManager,
    state: StateStore,
    cleaner: EvidenceCleaner,
}

impl EvidenceStore {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            scanner: EvidenceScanner::from_config(&config),
            coordinator: SubmissionCoordinator::from_config(&config),
            batches: BatchManager::from_config(&config),
            state: StateStore::from_config(&config),
            cleaner: EvidenceCleaner::from_config(&config),
            config,
        }
    }

    /// Render markdown through `renderer` when evidence enters `ready/`.
    pub fn with_renderer(mut self, renderer: Arc<dyn DocumentRenderer>) -> Self {
        self.coordinator = self.coordinator.with_renderer(renderer);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scanner(&self) -> &EvidenceScanner {
        &self.scanner
    }

    pub fn coordinator(&self) -> &SubmissionCoordinator {
        &self.coordinator
    }

    pub fn batches(&self) -> &BatchManager {
        &self.batches
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    pub fn cleaner(&self) -> &EvidenceCleaner {
        &self.cleaner
    }

    /// Workflow using the configured validation thresholds
    pub fn workflow(&self) -> SubmissionWorkflow<'_> {
        SubmissionWorkflow::new(&self.coordinator)
            .with_profile(ValidationProfile::from_settings(&self.config.validation))
    }

    /// Rescan every task, replace the cached state, and persist it.
    pub fn refresh_state(&self, ctx: &ScanContext) -> Result<usize> {
        let states = self.scanner.scan_all(ctx)?;
        let count = states.len();
        self.state.replace_all(states);
        self.state.save()?;
        info!(trace_id = %ctx.trace_id, tasks = count, "state refreshed");
        Ok(count)
    }
}
