//! Scheduler: periodic and paste triggers feeding one serialized worker.
//!
//! DESIGN
//! ======
//! Every reason to touch the document becomes a `Trigger` on a bounded
//! queue: the periodic tick, a paste event, the follow-up pass after an
//! empty paste, and the single retry of a source-missing entry. One worker
//! drains the queue, so two passes never run against the document at once.
//!
//! Delayed triggers are spawned tasks that sleep, then enqueue. If the queue
//! is closed by then (shutdown) they drop the trigger quietly.
//!
//! Shutdown is cooperative: the worker is never aborted mid-pass, since a
//! pass cut between its renames and its document write would leave nodes
//! pointing at files that no longer exist.
//!
//! TRADE-OFFS
//! ==========
//! Ticks use `try_send`: when the worker is behind, a tick is skipped rather
//! than queued. Paste follow-ups and retries use `send` and wait for room,
//! since losing them would strand a freshly pasted image until the next tick.

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::planner::PlanEntry;
use crate::services::pass::{self, Origin, PassReport};
use crate::state::AppState;

/// A unit of work for the pass worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Tick,
    /// `attempt` counts follow-up passes already made for this paste.
    Paste { attempt: u32 },
    Retry(PlanEntry),
}

/// A paste notification from the editor host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PasteEvent {
    /// Document the paste landed in; `None` means the target.
    #[serde(default)]
    pub document: Option<String>,
    /// Clipboard MIME types; empty means unknown.
    #[serde(default)]
    pub mime_types: Vec<String>,
}

impl PasteEvent {
    /// Whether this paste could add an image to `target`.
    #[must_use]
    pub fn is_relevant(&self, target: &str) -> bool {
        let same_document = self.document.as_deref().is_none_or(|d| d == target);
        let has_image = self.mime_types.is_empty() || self.mime_types.iter().any(|m| m.starts_with("image/"));
        same_document && has_image
    }
}

// =============================================================================
// TASKS
// =============================================================================

/// Spawn the worker that owns the trigger queue.
///
/// The worker stops once `shutdown` turns true (or its sender is dropped),
/// but only between triggers: a pass already running finishes its renames
/// and its document write first. Await the handle to wait for that.
pub fn spawn_worker(
    state: AppState,
    mut rx: mpsc::Receiver<Trigger>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = async { shutdown.wait_for(|stop| *stop).await.map(|_| ()) } => {
                    debug!("shutdown requested; worker exiting");
                    break;
                }
                trigger = rx.recv() => {
                    let Some(trigger) = trigger else {
                        debug!("trigger queue closed; worker exiting");
                        break;
                    };
                    handle_trigger(&state, trigger).await;
                }
            }
        }
    })
}

/// Spawn the periodic tick source.
pub fn spawn_ticker(state: AppState) -> JoinHandle<()> {
    let period = state.timing.tick_interval;
    info!(interval = ?period, "periodic rename pass configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match state.triggers.try_send(Trigger::Tick) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("trigger queue full; skipping tick");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }
        }
    })
}

/// Enqueue `trigger` after `delay`.
pub fn schedule_after(state: &AppState, delay: Duration, trigger: Trigger) {
    let tx = state.triggers.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        if tx.send(trigger).await.is_err() {
            debug!("trigger queue closed; dropping delayed trigger");
        }
    });
}

/// Schedule a paste pass if the event can matter. Returns whether it did.
pub fn notify_paste(state: &AppState, event: &PasteEvent) -> bool {
    if !event.is_relevant(&state.config.target) {
        debug!(document = ?event.document, mime_types = ?event.mime_types, "ignoring paste");
        return false;
    }
    schedule_after(state, state.timing.paste_delay, Trigger::Paste { attempt: 0 });
    true
}

// =============================================================================
// WORKER
// =============================================================================

pub(crate) async fn handle_trigger(state: &AppState, trigger: Trigger) {
    match trigger {
        Trigger::Tick => {
            run(state, Origin::Tick).await;
        }
        Trigger::Paste { attempt } => {
            let Some(report) = run(state, Origin::Paste).await else {
                return;
            };
            if report.qualifying > 0 {
                return;
            }
            // EDGE: the pasted image may not be a node yet; look again, boundedly.
            if attempt < state.timing.paste_retry_limit {
                info!(attempt = attempt + 1, "no images after paste; scheduling another pass");
                schedule_after(state, state.timing.retry_delay, Trigger::Paste { attempt: attempt + 1 });
            } else {
                info!(attempt, "no images after paste; giving up until next tick");
            }
        }
        Trigger::Retry(entry) => match pass::retry_entry(state.store.as_ref(), &state.config, entry).await {
            Ok(report) => state.record_report(report).await,
            Err(e) => error!(error = %e, "rename retry aborted"),
        },
    }
}

async fn run(state: &AppState, origin: Origin) -> Option<PassReport> {
    match pass::run_pass(state.store.as_ref(), &state.config, origin).await {
        Ok(report) => {
            for entry in &report.retry {
                schedule_after(state, state.timing.retry_delay, Trigger::Retry(entry.clone()));
            }
            if report.renamed.is_empty() && report.retry.is_empty() && report.abandoned.is_empty() {
                debug!(pass_id = %report.id, ?origin, qualifying = report.qualifying, "nothing to rename");
            }
            state.record_report(report.clone()).await;
            Some(report)
        }
        Err(e) => {
            warn!(error = %e, ?origin, "rename pass aborted");
            None
        }
    }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
