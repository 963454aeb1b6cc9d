//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor and
//! cloned into the scheduler tasks. It holds the validated rename config,
//! the document store, the sending side of the trigger queue, and the most
//! recent pass report. The receiving side of the queue is handed to exactly
//! one worker, which is what serializes passes over the document.

use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};

use crate::config::{RenameConfig, Timing};
use crate::services::pass::PassReport;
use crate::services::scheduler::Trigger;
use crate::store::DocumentStore;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Copy.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RenameConfig>,
    pub timing: Timing,
    pub store: Arc<dyn DocumentStore>,
    /// Sender into the single serialized trigger queue.
    pub triggers: mpsc::Sender<Trigger>,
    /// Report of the last pass that ran, if any.
    pub last_report: Arc<RwLock<Option<PassReport>>>,
}

impl AppState {
    /// Build state and the trigger receiver the worker must own.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, config: RenameConfig, timing: Timing) -> (Self, mpsc::Receiver<Trigger>) {
        let (triggers, rx) = mpsc::channel(timing.queue_capacity);
        let state = Self {
            config: Arc::new(config),
            timing,
            store,
            triggers,
            last_report: Arc::new(RwLock::new(None)),
        };
        (state, rx)
    }

    pub async fn record_report(&self, report: PassReport) {
        *self.last_report.write().await = Some(report);
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
