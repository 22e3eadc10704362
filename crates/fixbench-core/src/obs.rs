//! Structured log events for verification runs.
//!
//! Events are emitted at `info!` level unless noted and carry an `event`
//! field so they can be filtered in JSON output.

use tracing::{info, warn};

/// Span covering one verification run.
///
/// Attach it with `tracing::Instrument` so every event emitted while the run
/// is in flight carries `run_id` and `candidate`:
///
/// ```ignore
/// let report = run_stages(request).instrument(verify_span(&run_id, "bug.py")).await;
/// ```
pub fn verify_span(run_id: &str, candidate: &str) -> tracing::Span {
    tracing::info_span!("fixbench.verify", run_id = %run_id, candidate = %candidate)
}

pub fn emit_stage_started(stage: &str, program: &str) {
    info!(event = "stage.started", stage = %stage, program = %program);
}

pub fn emit_stage_finished(stage: &str, succeeded: bool, duration_exceeded: bool, duration_ms: u64) {
    info!(
        event = "stage.finished",
        stage = %stage,
        succeeded = succeeded,
        duration_exceeded = duration_exceeded,
        duration_ms = duration_ms,
    );
}

pub fn emit_stage_skipped(stage: &str, reason: &str) {
    info!(event = "stage.skipped", stage = %stage, reason = %reason);
}

/// Emitted at `warn!` when a child outlives its deadline and is killed.
pub fn emit_timeout_kill(program: &str, timeout_ms: u64) {
    warn!(event = "sandbox.timeout", program = %program, timeout_ms = timeout_ms);
}

pub fn emit_verdict(run_id: &str, passed: bool, violations: usize) {
    info!(
        event = "verify.verdict",
        run_id = %run_id,
        passed = passed,
        violations = violations,
    );
}

/// Emitted at `warn!` when a harness-level error aborts a run.
pub fn emit_harness_error(run_id: &str, stage: &str, error: &dyn std::fmt::Display) {
    warn!(event = "verify.aborted", run_id = %run_id, stage = %stage, error = %error);
}
