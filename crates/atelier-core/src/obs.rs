//! Structured observability hooks for round lifecycle events.
//!
//! This module provides:
//! - A round-scoped tracing span to instrument the controller future with
//! - Emission functions for key lifecycle events: round start, tool calls,
//!   render jobs, phase results, budget skips and round end
//!
//! Events are emitted at `info!` level (`warn!` for failures). Filter with
//! `RUST_LOG`, e.g. `RUST_LOG=atelier_core=debug`.

use tracing::{info, warn, Span};

/// Span tagged with the round id. Attach with `tracing::Instrument` so it
/// follows the controller across await points.
pub fn round_span(run_id: &str, theme: &str) -> Span {
    tracing::info_span!("atelier.round", run_id = %run_id, theme = %theme)
}

/// Emit event: round started with its budget.
pub fn emit_round_started(run_id: &str, theme: &str, budget_ms: u64) {
    info!(event = "round.started", run_id = %run_id, theme = %theme, budget_ms = budget_ms);
}

/// Emit event: a phase produced its result.
pub fn emit_phase_finished(run_id: &str, phase: &str, log_lines: usize, remaining_ms: u64) {
    info!(
        event = "round.phase_finished",
        run_id = %run_id,
        phase = %phase,
        log_lines = log_lines,
        remaining_ms = remaining_ms,
    );
}

/// Emit event: one external tool call finished.
pub fn emit_tool_finished(tool: &str, duration_ms: u64, error: Option<&dyn std::fmt::Display>) {
    match error {
        None => info!(event = "tool.finished", tool = %tool, duration_ms = duration_ms, ok = true),
        Some(error) => warn!(
            event = "tool.finished",
            tool = %tool,
            duration_ms = duration_ms,
            ok = false,
            error = %error,
        ),
    }
}

/// Emit event: a render job reached a terminal state or was abandoned.
pub fn emit_job_finished(job_id: &str, status: &str, polls: u32, latency_ms: u64) {
    info!(
        event = "render.job_finished",
        job_id = %job_id,
        status = %status,
        polls = polls,
        latency_ms = latency_ms,
    );
}

/// Emit event: TRYON skipped because the round budget ran short.
pub fn emit_budget_skip(run_id: &str, remaining_ms: u64, threshold_ms: u64) {
    warn!(
        event = "round.budget_skip",
        run_id = %run_id,
        remaining_ms = remaining_ms,
        threshold_ms = threshold_ms,
    );
}

/// Emit event: round finished with its final selection.
pub fn emit_round_finished(run_id: &str, duration_ms: u64, candidates: usize, fallback: bool) {
    info!(
        event = "round.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        candidates = candidates,
        fallback = fallback,
    );
}
