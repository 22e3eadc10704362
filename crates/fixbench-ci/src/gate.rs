//! Verdict evaluation over executed stages.

use serde::{Deserialize, Serialize};

use crate::runner::StageResult;

/// Gate evaluation verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateVerdict {
    /// Whether the gate passed.
    pub passed: bool,

    /// Failures of stages that count toward the verdict (empty if passed).
    pub violations: Vec<String>,

    /// Failures of advisory stages, recorded but not counted.
    pub advisories: Vec<String>,

    /// Summary message.
    pub message: String,
}

/// Verdict rules for a verification run.
pub struct CiGate;

impl CiGate {
    /// Evaluate whether every counting stage passed.
    ///
    /// Gate rule:
    /// - A stage fails if it timed out, was killed by a signal, or exited non-zero
    /// - Failures of stages with `counts_toward_verdict == false` become advisories
    /// - The gate passes iff there are no violations
    pub fn evaluate(stages: &[StageResult]) -> GateVerdict {
        let mut violations = Vec::new();
        let mut advisories = Vec::new();

        for stage in stages {
            if stage.passed() {
                continue;
            }
            let description = describe_failure(stage);
            if stage.counts_toward_verdict {
                violations.push(description);
            } else {
                advisories.push(description);
            }
        }

        let passed = violations.is_empty();
        let message = if passed && advisories.is_empty() {
            "All stages passed".to_string()
        } else if passed {
            format!("Passed with {} advisory finding(s)", advisories.len())
        } else {
            format!("Verification failed with {} violation(s)", violations.len())
        };

        GateVerdict {
            passed,
            violations,
            advisories,
            message,
        }
    }
}

fn describe_failure(stage: &StageResult) -> String {
    let name = stage.stage.name();
    let result = &stage.result;
    if result.duration_exceeded {
        format!("Stage '{}' timed out after {}ms", name, result.duration_ms)
    } else if let Some(code) = result.exit_code {
        format!("Stage '{}' exited with code {}", name, code)
    } else if let Some(signal) = result.signal {
        format!("Stage '{}' was killed by signal {}", name, signal)
    } else {
        format!("Stage '{}' failed", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::Stage;
    use fixbench_core::ExecutionResult;

    fn stage(stage: Stage, exit_code: Option<i32>, counts: bool) -> StageResult {
        StageResult {
            stage,
            counts_toward_verdict: counts,
            result: ExecutionResult {
                succeeded: exit_code == Some(0),
                exit_code,
                signal: None,
                stdout: String::new(),
                stderr: String::new(),
                duration_exceeded: false,
                duration_ms: 5,
            },
        }
    }

    #[test]
    fn test_empty_stages_passes() {
        let verdict = CiGate::evaluate(&[]);
        assert!(verdict.passed);
        assert_eq!(verdict.message, "All stages passed");
    }

    #[test]
    fn test_all_stages_pass() {
        let verdict = CiGate::evaluate(&[
            stage(Stage::Run, Some(0), true),
            stage(Stage::Test, Some(0), true),
        ]);
        assert!(verdict.passed);
        assert!(verdict.violations.is_empty());
    }

    #[test]
    fn test_failed_run_fails_gate() {
        let verdict = CiGate::evaluate(&[
            stage(Stage::Run, Some(1), true),
            stage(Stage::Test, Some(0), true),
        ]);
        assert!(!verdict.passed);
        assert_eq!(verdict.violations, vec!["Stage 'run' exited with code 1"]);
    }

    #[test]
    fn test_advisory_lint_failure_does_not_fail_gate() {
        let verdict = CiGate::evaluate(&[
            stage(Stage::Lint, Some(1), false),
            stage(Stage::Run, Some(0), true),
        ]);
        assert!(verdict.passed);
        assert_eq!(verdict.advisories.len(), 1);
        assert!(verdict.message.contains("advisory"));
    }

    #[test]
    fn test_counting_lint_failure_fails_gate() {
        let verdict = CiGate::evaluate(&[
            stage(Stage::Lint, Some(1), true),
            stage(Stage::Run, Some(0), true),
        ]);
        assert!(!verdict.passed);
        assert!(verdict.violations[0].contains("lint"));
    }

    #[test]
    fn test_timeout_and_signal_descriptions() {
        let mut timed_out = stage(Stage::Test, None, true);
        timed_out.result.duration_exceeded = true;
        timed_out.result.duration_ms = 3000;

        let mut signalled = stage(Stage::Run, None, true);
        signalled.result.signal = Some(9);

        let verdict = CiGate::evaluate(&[signalled, timed_out]);
        assert!(!verdict.passed);
        assert_eq!(
            verdict.violations,
            vec![
                "Stage 'run' was killed by signal 9",
                "Stage 'test' timed out after 3000ms",
            ]
        );
    }
}
