//! Pass service: one read/plan/rename/persist cycle over the target canvas.
//!
//! DESIGN
//! ======
//! A pass is two-phase: the planner computes an immutable plan from a fresh
//! read of the document, then each entry is applied through the store. The
//! successful entries produce a new document snapshot that is written once,
//! and only if at least one rename went through.
//!
//! ERROR HANDLING
//! ==============
//! - Unreadable or unparseable document: the pass aborts before touching any
//!   file, and the stored text is left as is. The next tick tries again.
//! - Source missing: the entry is handed back in `PassReport::retry`; the
//!   scheduler retries it once via [`retry_entry`], which never hands it back
//!   again.
//! - Any other store failure (destination taken, I/O): logged, abandoned.

use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::canvas::{CanvasDocument, CanvasError};
use crate::config::RenameConfig;
use crate::error::ErrorCode;
use crate::planner::{self, PlanEntry, RenamePlan, SkippedNode};
use crate::store::{DocumentStore, StoreError};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PassError {
    #[error("failed to read canvas {path}: {source}")]
    Read { path: String, source: StoreError },
    #[error("canvas {path} is invalid: {source}")]
    Canvas { path: String, source: CanvasError },
    #[error("failed to write canvas {path}: {source}")]
    Write { path: String, source: StoreError },
}

impl ErrorCode for PassError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Read { source, .. } => source.error_code(),
            Self::Canvas { .. } => "E_CANVAS_PARSE",
            Self::Write { .. } => "E_CANVAS_WRITE",
        }
    }

    fn retryable(&self) -> bool {
        true
    }
}

/// Why a single entry was given up on.
#[derive(Debug, thiserror::Error)]
pub enum RenameFailure {
    #[error("source still missing on retry: {0}")]
    SourceMissing(String),
    #[error("node no longer references {0}")]
    Stale(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for RenameFailure {
    fn error_code(&self) -> &'static str {
        match self {
            Self::SourceMissing(_) => "E_SOURCE_MISSING",
            Self::Stale(_) => "E_STALE_ENTRY",
            Self::Store(e) => e.error_code(),
        }
    }
}

/// What started a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Tick,
    Paste,
    Retry,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AbandonedEntry {
    #[serde(flatten)]
    pub entry: PlanEntry,
    pub code: &'static str,
    pub reason: String,
}

impl AbandonedEntry {
    fn new(entry: PlanEntry, failure: &RenameFailure) -> Self {
        Self { entry, code: failure.error_code(), reason: failure.to_string() }
    }
}

/// Outcome of one pass, kept for the report endpoint and logs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassReport {
    pub id: Uuid,
    pub origin: Origin,
    /// Image nodes found in the document.
    pub qualifying: usize,
    pub renamed: Vec<PlanEntry>,
    /// Entries whose source was missing; eligible for one retry.
    pub retry: Vec<PlanEntry>,
    pub abandoned: Vec<AbandonedEntry>,
    pub skipped: Vec<SkippedNode>,
    /// Whether the document was rewritten.
    pub persisted: bool,
}

impl PassReport {
    fn new(origin: Origin) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            qualifying: 0,
            renamed: Vec::new(),
            retry: Vec::new(),
            abandoned: Vec::new(),
            skipped: Vec::new(),
            persisted: false,
        }
    }
}

enum Outcome {
    Renamed,
    SourceMissing,
    Failed(StoreError),
}

// =============================================================================
// PASSES
// =============================================================================

async fn load(store: &dyn DocumentStore, config: &RenameConfig) -> Result<CanvasDocument, PassError> {
    let text = store
        .read(&config.target)
        .await
        .map_err(|source| PassError::Read { path: config.target.clone(), source })?;
    CanvasDocument::parse(&text).map_err(|source| PassError::Canvas { path: config.target.clone(), source })
}

/// Compute the current plan without renaming anything.
///
/// # Errors
///
/// Returns `PassError` if the document cannot be read or parsed.
pub async fn preview(store: &dyn DocumentStore, config: &RenameConfig) -> Result<RenamePlan, PassError> {
    let doc = load(store, config).await?;
    Ok(planner::plan(&doc.nodes, &config.prefix, &config.document_dir()))
}

/// Run one full pass: read, plan, rename, persist.
///
/// # Errors
///
/// Returns `PassError` if the document cannot be read or parsed (nothing is
/// renamed), or if the final write fails (renames already happened).
pub async fn run_pass(
    store: &dyn DocumentStore,
    config: &RenameConfig,
    origin: Origin,
) -> Result<PassReport, PassError> {
    let doc = load(store, config).await?;
    let plan = planner::plan(&doc.nodes, &config.prefix, &config.document_dir());

    let mut report = PassReport::new(origin);
    report.qualifying = plan.qualifying;
    report.skipped = plan.skipped;

    for entry in plan.entries {
        match apply_entry(store, &entry).await {
            Outcome::Renamed => {
                info!(pass_id = %report.id, old_path = %entry.old_path, new_path = %entry.new_path, "renamed image");
                report.renamed.push(entry);
            }
            Outcome::SourceMissing => {
                warn!(pass_id = %report.id, old_path = %entry.old_path, "source missing; will retry once");
                report.retry.push(entry);
            }
            Outcome::Failed(e) => {
                let failure = RenameFailure::Store(e);
                error!(
                    pass_id = %report.id,
                    old_path = %entry.old_path,
                    new_path = %entry.new_path,
                    error = %failure,
                    "rename failed"
                );
                report.abandoned.push(AbandonedEntry::new(entry, &failure));
            }
        }
    }

    persist(store, config, &doc, &mut report).await?;
    Ok(report)
}

/// Retry a single source-missing entry against a fresh read of the document.
///
/// The entry is never handed back for another retry: it is either renamed or
/// abandoned.
///
/// # Errors
///
/// Returns `PassError` if the document cannot be read, parsed, or written.
pub async fn retry_entry(
    store: &dyn DocumentStore,
    config: &RenameConfig,
    entry: PlanEntry,
) -> Result<PassReport, PassError> {
    let doc = load(store, config).await?;
    let mut report = PassReport::new(Origin::Retry);
    report.qualifying = planner::positioned_images(&doc.nodes).len();

    if doc.node_referencing(&entry.node_id, &entry.old_path).is_none() {
        let failure = RenameFailure::Stale(entry.old_path.clone());
        warn!(pass_id = %report.id, node_id = %entry.node_id, error = %failure, "dropping retry");
        report.abandoned.push(AbandonedEntry::new(entry, &failure));
        return Ok(report);
    }

    match apply_entry(store, &entry).await {
        Outcome::Renamed => {
            info!(pass_id = %report.id, old_path = %entry.old_path, new_path = %entry.new_path, "renamed image on retry");
            report.renamed.push(entry);
        }
        Outcome::SourceMissing => {
            let failure = RenameFailure::SourceMissing(entry.old_path.clone());
            error!(pass_id = %report.id, error = %failure, "giving up on rename");
            report.abandoned.push(AbandonedEntry::new(entry, &failure));
        }
        Outcome::Failed(e) => {
            let failure = RenameFailure::Store(e);
            error!(pass_id = %report.id, old_path = %entry.old_path, error = %failure, "rename retry failed");
            report.abandoned.push(AbandonedEntry::new(entry, &failure));
        }
    }

    persist(store, config, &doc, &mut report).await?;
    Ok(report)
}

/// Run one manual pass, then give its source-missing entries their single
/// retry after `retry_delay`. Returns the pass report followed by one report
/// per retry.
///
/// # Errors
///
/// Returns `PassError` if the initial pass aborts. Retry failures are logged
/// and skipped so the remaining retries still run.
pub async fn apply_once(
    store: &dyn DocumentStore,
    config: &RenameConfig,
    retry_delay: Duration,
) -> Result<Vec<PassReport>, PassError> {
    let first = run_pass(store, config, Origin::Manual).await?;
    let pending = first.retry.clone();
    let mut reports = vec![first];
    if pending.is_empty() {
        return Ok(reports);
    }

    tokio::time::sleep(retry_delay).await;
    for entry in pending {
        match retry_entry(store, config, entry).await {
            Ok(report) => reports.push(report),
            Err(e) => error!(error = %e, "rename retry aborted"),
        }
    }
    Ok(reports)
}

async fn apply_entry(store: &dyn DocumentStore, entry: &PlanEntry) -> Outcome {
    let file = match store.resolve(&entry.old_path).await {
        Ok(Some(file)) => file,
        Ok(None) => return Outcome::SourceMissing,
        Err(e) => return Outcome::Failed(e),
    };
    match store.rename(&file, &entry.new_path).await {
        Ok(()) => Outcome::Renamed,
        // EDGE: the file can vanish between resolve and rename.
        Err(StoreError::NotFound(_)) => Outcome::SourceMissing,
        Err(e) => Outcome::Failed(e),
    }
}

/// Write the renamed snapshot once, if anything was renamed.
async fn persist(
    store: &dyn DocumentStore,
    config: &RenameConfig,
    doc: &CanvasDocument,
    report: &mut PassReport,
) -> Result<(), PassError> {
    if report.renamed.is_empty() {
        return Ok(());
    }

    let text = doc
        .with_renamed(&report.renamed)
        .to_json()
        .map_err(|source| PassError::Canvas { path: config.target.clone(), source })?;
    store
        .write(&config.target, &text)
        .await
        .map_err(|source| PassError::Write { path: config.target.clone(), source })?;

    report.persisted = true;
    info!(pass_id = %report.id, count = report.renamed.len(), path = %config.target, "canvas updated");
    Ok(())
}

#[cfg(test)]
#[path = "pass_test.rs"]
mod tests;
