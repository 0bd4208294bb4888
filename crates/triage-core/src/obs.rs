//! Structured observability hooks for reconciliation runs.
//!
//! This module provides:
//! - The run-scoped tracing span ([`run_span`])
//! - Emission functions for run lifecycle, wave completion and board writes
//!
//! Verbosity follows `RUST_LOG`; JSON output is selected at
//! [`crate::init_tracing`] time.

use tracing::{info, warn};

/// Span tagging everything a run does with its run_id and owner.
///
/// Attach it to the run future with [`tracing::Instrument`]; an entered
/// guard must not be held across `.await`.
///
/// # Example
///
/// ```ignore
/// reconcile().instrument(run_span("4b1c...", "kubescape")).await
/// ```
pub fn run_span(run_id: &str, owner: &str) -> tracing::Span {
    tracing::info_span!("triage.run", run_id = %run_id, owner = %owner)
}

/// Emit event: run started.
pub fn emit_run_started(run_id: &str, owner: &str, dry_run: bool) {
    info!(event = "run.started", run_id = %run_id, owner = %owner, dry_run = dry_run);
}

/// Emit event: a dispatcher wave drained.
pub fn emit_wave_finished(wave: &str, completed: usize, failed: usize) {
    if failed == 0 {
        info!(event = "wave.finished", wave = %wave, completed = completed, failed = failed);
    } else {
        warn!(event = "wave.finished", wave = %wave, completed = completed, failed = failed);
    }
}

/// Emit event: one class reconciled against its board.
pub fn emit_class_reconciled(class: &str, fetched: usize, tracked: usize, untracked: usize) {
    info!(
        event = "class.reconciled",
        class = %class,
        fetched = fetched,
        tracked = tracked,
        untracked = untracked,
    );
}

/// Emit event: an item was added to a board.
pub fn emit_item_added(board: &str, url: &str) {
    info!(event = "board.item_added", board = %board, url = %url);
}

/// Emit event: adding an item to a board failed (warning level).
pub fn emit_item_failed(board: &str, url: &str, error: &dyn std::fmt::Display) {
    warn!(event = "board.item_failed", board = %board, url = %url, error = %error);
}

/// Emit event: run finished with duration and write tallies.
pub fn emit_run_finished(run_id: &str, duration_ms: u64, added: usize, failed: usize) {
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        added = added,
        failed = failed,
        success = failed == 0,
    );
}

/// Emit event: run aborted by a read-side failure.
pub fn emit_run_aborted(run_id: &str, error: &dyn std::fmt::Display) {
    tracing::error!(event = "run.aborted", run_id = %run_id, error = %error);
}
