//! Verification pipeline: lint, run and test one candidate.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::Instrument;
use uuid::Uuid;

use crate::gate::{CiGate, GateVerdict};
use crate::runner::{StageExecutor, StageResult};
use crate::stage::{Stage, StageConfig};
use fixbench_core::{
    obs, ErrorKind, ExecutionMode, ExecutionRequest, HarnessConfig, HarnessError, Sandbox,
    Workspace,
};

/// What to verify.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// Candidate source file, relative to the workspace root or absolute inside it.
    pub candidate: PathBuf,

    /// Test suite for the test stage.
    pub test_file: Option<PathBuf>,

    /// Arguments passed to the candidate in the run stage.
    pub run_args: Vec<String>,

    /// Text piped to the candidate's stdin in the run stage.
    pub stdin: Option<String>,

    /// Skip the lint stage for this call even if enabled in config.
    pub skip_lint: bool,

    /// Skip the test stage for this call even if enabled in config.
    pub skip_test: bool,
}

impl VerifyRequest {
    pub fn new(candidate: impl Into<PathBuf>) -> Self {
        Self {
            candidate: candidate.into(),
            ..Self::default()
        }
    }

    pub fn with_test_file(mut self, test_file: impl Into<PathBuf>) -> Self {
        self.test_file = Some(test_file.into());
        self
    }

    pub fn with_run_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn without_lint(mut self) -> Self {
        self.skip_lint = true;
        self
    }

    pub fn without_test(mut self) -> Self {
        self.skip_test = true;
        self
    }
}

/// Harness-level failure that aborted a verification run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("candidate unavailable: {0}")]
    Candidate(#[source] HarnessError),

    #[error("test file unavailable: {0}")]
    TestFile(#[source] HarnessError),

    #[error("stage '{stage}' aborted: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: HarnessError,
    },
}

impl PipelineError {
    pub fn harness_error(&self) -> &HarnessError {
        match self {
            PipelineError::Candidate(e) | PipelineError::TestFile(e) => e,
            PipelineError::Stage { source, .. } => source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.harness_error().kind()
    }
}

/// Result of one verification run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    run_id: String,
    candidate: PathBuf,
    candidate_digest: String,
    generated_at: DateTime<Utc>,
    duration_ms: u64,
    stages: Vec<StageResult>,
    verdict: GateVerdict,
}

impl VerificationReport {
    /// Run ID (UUID v4).
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn candidate(&self) -> &Path {
        &self.candidate
    }

    /// SHA-256 of the candidate source at verification time.
    pub fn candidate_digest(&self) -> &str {
        &self.candidate_digest
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    /// Total duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// Executed stages in Lint, Run, Test order.
    pub fn stages(&self) -> &[StageResult] {
        &self.stages
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn verdict(&self) -> &GateVerdict {
        &self.verdict
    }

    /// Whether the overall verdict is a pass.
    pub fn passed(&self) -> bool {
        self.verdict.passed
    }

    /// Number of stages that passed.
    pub fn passed_count(&self) -> usize {
        self.stages.iter().filter(|s| s.passed()).count()
    }

    /// Number of stages that failed.
    pub fn failed_count(&self) -> usize {
        self.stages.iter().filter(|s| !s.passed()).count()
    }
}

/// Verification pipeline orchestrator.
pub struct VerificationPipeline {
    workspace: Workspace,
    config: HarnessConfig,
    executor: Arc<dyn StageExecutor>,
}

impl VerificationPipeline {
    pub fn new(workspace: Workspace, config: HarnessConfig, executor: Arc<dyn StageExecutor>) -> Self {
        Self {
            workspace,
            config,
            executor,
        }
    }

    /// Build a pipeline backed by a real [`Sandbox`] over the configured workspace.
    pub fn from_config(config: HarnessConfig) -> fixbench_core::Result<Self> {
        let sandbox = Sandbox::from_config(config.clone())?;
        let workspace = sandbox.workspace().clone();
        Ok(Self::new(workspace, config, Arc::new(sandbox)))
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Plan the stages for a request, in canonical order.
    ///
    /// Lint is planned disabled when turned off in config or for this call,
    /// and advisory unless `lint_affects_verdict` is set. Test is planned only
    /// when a test file is given, and runs from the candidate's directory so
    /// the suite can import it. An enabled Test stage whose file is missing
    /// fails planning with [`PipelineError::TestFile`].
    pub fn plan(&self, request: &VerifyRequest) -> Result<Vec<StageConfig>, PipelineError> {
        let candidate = self
            .workspace
            .resolve(&request.candidate)
            .map_err(PipelineError::Candidate)?;
        let candidate_dir = candidate
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.workspace.root().to_path_buf());

        let mut stages = Vec::with_capacity(3);

        let mut lint = StageConfig::new(
            Stage::Lint,
            ExecutionRequest::file(&candidate, ExecutionMode::Lint),
        );
        if !self.config.lint_affects_verdict {
            lint = lint.advisory();
        }
        if !self.config.lint_enabled || request.skip_lint {
            lint = lint.disabled();
        }
        stages.push(lint);

        let mut run_request =
            ExecutionRequest::file(&candidate, ExecutionMode::Run).with_args(request.run_args.clone());
        if let Some(input) = &request.stdin {
            run_request = run_request.with_stdin(input.clone());
        }
        stages.push(StageConfig::new(Stage::Run, run_request));

        match &request.test_file {
            Some(test_file) => {
                let enabled = self.config.test_enabled && !request.skip_test;
                let test_file = self
                    .workspace
                    .resolve(test_file)
                    .map_err(PipelineError::TestFile)?;
                // Fail before any stage is spawned, not after lint and run.
                if enabled && !test_file.is_file() {
                    return Err(PipelineError::TestFile(HarnessError::NotFound {
                        path: test_file,
                    }));
                }
                let mut test = StageConfig::new(
                    Stage::Test,
                    ExecutionRequest::file(&test_file, ExecutionMode::Test)
                        .with_working_dir(&candidate_dir),
                );
                if !enabled {
                    test = test.disabled();
                }
                stages.push(test);
            }
            None => obs::emit_stage_skipped(Stage::Test.name(), "no test file supplied"),
        }

        Ok(stages)
    }

    /// Verify one candidate.
    ///
    /// Every enabled stage runs even when an earlier one failed, so the
    /// report always carries the full picture. A harness-level error (missing
    /// file, tool that cannot be launched) aborts the run instead.
    pub async fn run(&self, request: &VerifyRequest) -> Result<VerificationReport, PipelineError> {
        let run_id = Uuid::new_v4().to_string();
        let span = obs::verify_span(&run_id, &request.candidate.to_string_lossy());
        self.run_stages(run_id, request).instrument(span).await
    }

    async fn run_stages(
        &self,
        run_id: String,
        request: &VerifyRequest,
    ) -> Result<VerificationReport, PipelineError> {
        let start = Instant::now();

        let candidate = self
            .workspace
            .resolve(&request.candidate)
            .map_err(PipelineError::Candidate)?;
        let source = self
            .workspace
            .read(&candidate)
            .map_err(PipelineError::Candidate)?;
        let candidate_digest = hex::encode(Sha256::digest(source.as_bytes()));

        let mut stage_results = Vec::new();

        for config in self.plan(request)? {
            let stage = config.stage;
            if !config.enabled {
                obs::emit_stage_skipped(stage.name(), "disabled");
                continue;
            }

            obs::emit_stage_started(stage.name(), &self.executor.program_for(stage));
            let result = match self.executor.execute(&config).await {
                Ok(r) => r,
                Err(source) => {
                    obs::emit_harness_error(&run_id, stage.name(), &source);
                    return Err(PipelineError::Stage { stage, source });
                }
            };
            obs::emit_stage_finished(
                stage.name(),
                result.succeeded,
                result.duration_exceeded,
                result.duration_ms,
            );

            stage_results.push(StageResult {
                stage,
                counts_toward_verdict: config.counts_toward_verdict,
                result,
            });
        }

        stage_results.sort_by_key(|s| s.stage);
        let verdict = CiGate::evaluate(&stage_results);
        obs::emit_verdict(&run_id, verdict.passed, verdict.violations.len());

        Ok(VerificationReport {
            run_id,
            candidate,
            candidate_digest,
            generated_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
            stages: stage_results,
            verdict,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline_with(config: HarnessConfig) -> (tempfile::TempDir, VerificationPipeline) {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig {
            workspace_root: dir.path().to_path_buf(),
            ..config
        };
        let pipeline = VerificationPipeline::from_config(config).unwrap();
        (dir, pipeline)
    }

    #[test]
    fn test_plan_default_has_advisory_lint_and_run() {
        let (_dir, pipeline) = pipeline_with(HarnessConfig::default());
        let plan = pipeline.plan(&VerifyRequest::new("bug.py")).unwrap();

        let stages: Vec<_> = plan.iter().map(|s| s.stage).collect();
        assert_eq!(stages, vec![Stage::Lint, Stage::Run]);
        assert!(plan[0].enabled);
        assert!(!plan[0].counts_toward_verdict);
        assert!(plan[1].counts_toward_verdict);
    }

    #[test]
    fn test_plan_respects_switches() {
        let config = HarnessConfig {
            lint_enabled: false,
            lint_affects_verdict: true,
            test_enabled: false,
            ..HarnessConfig::default()
        };
        let (_dir, pipeline) = pipeline_with(config);
        let plan = pipeline
            .plan(&VerifyRequest::new("bug.py").with_test_file("test_bug.py"))
            .unwrap();

        assert_eq!(plan.len(), 3);
        assert!(!plan[0].enabled);
        assert!(plan[0].counts_toward_verdict);
        assert!(plan[1].enabled);
        assert!(!plan[2].enabled);
    }

    #[test]
    fn test_plan_per_call_skips() {
        let (_dir, pipeline) = pipeline_with(HarnessConfig::default());
        let plan = pipeline
            .plan(
                &VerifyRequest::new("bug.py")
                    .with_test_file("test_bug.py")
                    .without_lint()
                    .without_test(),
            )
            .unwrap();
        let enabled: Vec<_> = plan.iter().filter(|s| s.enabled).map(|s| s.stage).collect();
        assert_eq!(enabled, vec![Stage::Run]);
    }

    #[test]
    fn test_plan_test_runs_from_candidate_dir() {
        let (_dir, pipeline) = pipeline_with(HarnessConfig::default());
        pipeline.workspace().write("tests/test_bug.py", "").unwrap();
        let plan = pipeline
            .plan(&VerifyRequest::new("src/bug.py").with_test_file("tests/test_bug.py"))
            .unwrap();
        let test = plan.iter().find(|s| s.stage == Stage::Test).unwrap();
        let src = pipeline.workspace().root().join("src");
        assert_eq!(test.request.working_dir.as_deref(), Some(src.as_path()));
    }

    #[test]
    fn test_plan_rejects_missing_test_file() {
        let (_dir, pipeline) = pipeline_with(HarnessConfig::default());
        let err = pipeline
            .plan(&VerifyRequest::new("bug.py").with_test_file("tests/missing.py"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::TestFile(_)));
        assert_eq!(err.kind(), ErrorKind::NotFound);

        // A skipped Test stage does not need its file.
        let plan = pipeline
            .plan(
                &VerifyRequest::new("bug.py")
                    .with_test_file("tests/missing.py")
                    .without_test(),
            )
            .unwrap();
        assert!(!plan[2].enabled);
    }

    #[test]
    fn test_plan_rejects_escaping_candidate() {
        let (_dir, pipeline) = pipeline_with(HarnessConfig::default());
        let err = pipeline.plan(&VerifyRequest::new("../bug.py")).unwrap_err();
        assert!(matches!(err, PipelineError::Candidate(_)));
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
