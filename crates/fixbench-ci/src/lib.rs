//! fixbench CI - candidate verification
//!
//! Provides a verification pipeline that:
//! - Lints, runs and tests one candidate in the sandbox
//! - Keeps going after candidate failures to gather the full picture
//! - Evaluates a pass/fail verdict and formats the report for callers

pub mod gate;
pub mod pipeline;
pub mod reporter;
pub mod runner;
pub mod stage;

// Re-export key types
pub use gate::{CiGate, GateVerdict};
pub use pipeline::{PipelineError, VerificationPipeline, VerificationReport, VerifyRequest};
pub use reporter::{render_summary_md, to_value, validate, write_report_json, ReportError};
pub use runner::{StageExecutor, StageResult};
pub use stage::{Stage, StageConfig};
