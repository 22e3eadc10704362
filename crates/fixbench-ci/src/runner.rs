//! Stage execution.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::stage::{Stage, StageConfig};
use fixbench_core::{ExecutionResult, HarnessError, Sandbox};

/// Result of one executed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: Stage,

    /// Whether a failure here fails the overall verdict.
    pub counts_toward_verdict: bool,

    pub result: ExecutionResult,
}

impl StageResult {
    /// Whether this stage passed (exit code 0 within the deadline).
    pub fn passed(&self) -> bool {
        self.result.succeeded
    }
}

/// Backend that turns a planned stage into an execution result.
///
/// The pipeline only talks to this trait, so tests can swap the real
/// sandbox for a scripted fake.
#[async_trait]
pub trait StageExecutor: Send + Sync {
    async fn execute(&self, config: &StageConfig) -> Result<ExecutionResult, HarnessError>;

    /// Program that will run for a stage, for logging.
    fn program_for(&self, stage: Stage) -> String;
}

#[async_trait]
impl StageExecutor for Sandbox {
    async fn execute(&self, config: &StageConfig) -> Result<ExecutionResult, HarnessError> {
        self.run(&config.request).await
    }

    fn program_for(&self, stage: Stage) -> String {
        let cfg = self.config();
        match stage {
            Stage::Lint => cfg.linter.program.clone(),
            Stage::Run => cfg.interpreter.program.clone(),
            Stage::Test => cfg.test_runner.program.clone(),
        }
    }
}
