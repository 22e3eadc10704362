//! Report formatting for callers.
//!
//! [`to_value`] is the machine-facing shape; [`render_summary_md`] is for
//! humans and PR comments. Neither does I/O; [`write_report_json`] is a thin
//! convenience for the CLI.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Map, Value};

use crate::pipeline::VerificationReport;
use crate::runner::StageResult;

/// Shape problems in a report's stage list.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReportError {
    #[error("stage '{0}' appears more than once")]
    DuplicateStage(String),

    #[error("stage '{later}' is listed before '{earlier}'")]
    OutOfOrder { earlier: String, later: String },
}

/// Check that stages are unique and in Lint, Run, Test order.
///
/// Reports built by the pipeline always pass; this guards reports that were
/// deserialized from elsewhere.
pub fn validate(stages: &[StageResult]) -> std::result::Result<(), ReportError> {
    let mut seen = HashSet::new();
    for stage in stages {
        if !seen.insert(stage.stage) {
            return Err(ReportError::DuplicateStage(stage.stage.name().to_string()));
        }
    }
    for pair in stages.windows(2) {
        if pair[0].stage > pair[1].stage {
            return Err(ReportError::OutOfOrder {
                earlier: pair[1].stage.name().to_string(),
                later: pair[0].stage.name().to_string(),
            });
        }
    }
    Ok(())
}

/// Convert a report into a plain JSON value keyed by stage name.
pub fn to_value(report: &VerificationReport) -> std::result::Result<Value, ReportError> {
    validate(report.stages())?;

    let mut stages = Map::new();
    for stage in report.stages() {
        let r = &stage.result;
        stages.insert(
            stage.stage.name().to_string(),
            json!({
                "succeeded": r.succeeded,
                "exit_code": r.exit_code,
                "signal": r.signal,
                "duration_exceeded": r.duration_exceeded,
                "duration_ms": r.duration_ms,
                "stdout": r.stdout,
                "stderr": r.stderr,
                "counts_toward_verdict": stage.counts_toward_verdict,
            }),
        );
    }

    let verdict = report.verdict();
    Ok(json!({
        "run_id": report.run_id(),
        "candidate": report.candidate().to_string_lossy(),
        "candidate_digest": report.candidate_digest(),
        "generated_at": report.generated_at().to_rfc3339(),
        "duration_ms": report.duration_ms(),
        "passed": verdict.passed,
        "message": verdict.message,
        "violations": verdict.violations,
        "advisories": verdict.advisories,
        "stage_order": report.stages().iter().map(|s| s.stage.name()).collect::<Vec<_>>(),
        "stages": Value::Object(stages),
    }))
}

/// Write the JSON form of a report in pretty format.
pub fn write_report_json(path: &Path, report: &VerificationReport) -> Result<()> {
    let value = to_value(report).context("validate report")?;
    let content = serde_json::to_string_pretty(&value).context("serialize report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

const OUTPUT_EXCERPT_LINES: usize = 20;

fn excerpt(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= OUTPUT_EXCERPT_LINES {
        return lines.join("\n");
    }
    let tail = &lines[lines.len() - OUTPUT_EXCERPT_LINES..];
    format!(
        "... ({} earlier lines omitted)\n{}",
        lines.len() - OUTPUT_EXCERPT_LINES,
        tail.join("\n")
    )
}

/// Render a markdown summary of a report.
pub fn render_summary_md(report: &VerificationReport) -> String {
    let verdict = report.verdict();
    let mut out = String::new();
    out.push_str("# Verification Report\n\n");
    out.push_str(&format!(
        "- candidate: `{}`\n- digest: `{}`\n- run: `{}`\n- verdict: **{}**\n- {}\n\n",
        report.candidate().display(),
        &report.candidate_digest()[..report.candidate_digest().len().min(12)],
        report.run_id(),
        if verdict.passed { "PASS" } else { "FAIL" },
        verdict.message,
    ));

    out.push_str("## Stages\n\n");
    out.push_str("| stage | result | exit | duration |\n|---|---|---|---|\n");
    for stage in report.stages() {
        let r = &stage.result;
        let status = if r.duration_exceeded {
            "timeout"
        } else if r.succeeded {
            "pass"
        } else {
            "fail"
        };
        let status = if stage.counts_toward_verdict {
            status.to_string()
        } else {
            format!("{status} (advisory)")
        };
        let exit = match (r.exit_code, r.signal) {
            (Some(code), _) => code.to_string(),
            (None, Some(sig)) => format!("signal {sig}"),
            (None, None) => "-".to_string(),
        };
        out.push_str(&format!(
            "| {} | {} | {} | {}ms |\n",
            stage.stage.name(),
            status,
            exit,
            r.duration_ms
        ));
    }

    for stage in report.stages().iter().filter(|s| !s.passed()) {
        let output = stage.result.combined_output();
        if output.trim().is_empty() {
            continue;
        }
        out.push_str(&format!("\n### {} output\n\n```\n", stage.stage.name()));
        out.push_str(&excerpt(&output));
        out.push_str("\n```\n");
    }

    if !verdict.violations.is_empty() {
        out.push_str("\n## Violations\n\n");
        for v in &verdict.violations {
            out.push_str(&format!("- {}\n", v));
        }
    }
    if !verdict.advisories.is_empty() {
        out.push_str("\n## Advisories\n\n");
        for a in &verdict.advisories {
            out.push_str(&format!("- {}\n", a));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use fixbench_core::ExecutionResult;

    fn stage(stage: Stage, succeeded: bool) -> StageResult {
        StageResult {
            stage,
            counts_toward_verdict: stage != Stage::Lint,
            result: ExecutionResult {
                succeeded,
                exit_code: Some(if succeeded { 0 } else { 1 }),
                signal: None,
                stdout: String::new(),
                stderr: if succeeded {
                    String::new()
                } else {
                    "E501 line too long".into()
                },
                duration_exceeded: false,
                duration_ms: 7,
            },
        }
    }

    fn report_from(stages: Vec<StageResult>) -> VerificationReport {
        let verdict = crate::gate::CiGate::evaluate(&stages);
        serde_json::from_value(json!({
            "run_id": "run-1",
            "candidate": "/ws/bug.py",
            "candidate_digest": "abcdef0123456789",
            "generated_at": "2026-01-01T00:00:00Z",
            "duration_ms": 42,
            "stages": stages,
            "verdict": verdict,
        }))
        .unwrap()
    }

    #[test]
    fn test_to_value_keys_by_stage_name() {
        let report = report_from(vec![stage(Stage::Lint, false), stage(Stage::Run, true)]);
        let value = to_value(&report).unwrap();

        assert_eq!(value["passed"], json!(true));
        assert_eq!(value["stage_order"], json!(["lint", "run"]));
        assert_eq!(value["stages"]["lint"]["succeeded"], json!(false));
        assert_eq!(value["stages"]["lint"]["counts_toward_verdict"], json!(false));
        assert_eq!(value["stages"]["run"]["exit_code"], json!(0));
        assert_eq!(value["advisories"].as_array().unwrap().len(), 1);
        assert!(value["stages"].get("test").is_none());
    }

    #[test]
    fn test_to_value_rejects_malformed_report() {
        let report = report_from(vec![stage(Stage::Test, true), stage(Stage::Run, true)]);
        assert!(to_value(&report).is_err());
    }

    #[test]
    fn test_render_summary_md() {
        let report = report_from(vec![stage(Stage::Lint, false), stage(Stage::Run, false)]);
        let md = render_summary_md(&report);
        assert!(md.contains("verdict: **FAIL**"));
        assert!(md.contains("| lint | fail (advisory) | 1 | 7ms |"));
        assert!(md.contains("| run | fail | 1 | 7ms |"));
        assert!(md.contains("### run output"));
        assert!(md.contains("E501 line too long"));
        assert!(md.contains("## Violations"));
        assert!(md.contains("## Advisories"));
    }

    #[test]
    fn test_write_report_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let report = report_from(vec![stage(Stage::Run, true)]);
        write_report_json(&path, &report).unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["run_id"], json!("run-1"));
    }

    #[test]
    fn test_validate_accepts_canonical_order() {
        assert!(validate(&[stage(Stage::Lint, true), stage(Stage::Test, true)]).is_ok());
        assert!(validate(&[]).is_ok());
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        assert_eq!(
            validate(&[stage(Stage::Run, true), stage(Stage::Run, false)]),
            Err(ReportError::DuplicateStage("run".into()))
        );
    }

    #[test]
    fn test_validate_rejects_out_of_order() {
        let err = validate(&[stage(Stage::Test, true), stage(Stage::Lint, true)]).unwrap_err();
        assert!(matches!(err, ReportError::OutOfOrder { .. }));
    }

    #[test]
    fn test_excerpt_keeps_tail() {
        let text: String = (1..=30).map(|i| format!("line {i}\n")).collect();
        let ex = excerpt(&text);
        assert!(ex.starts_with("... (10 earlier lines omitted)"));
        assert!(ex.ends_with("line 30"));
        assert!(!ex.contains("line 10\n"));
    }
}
