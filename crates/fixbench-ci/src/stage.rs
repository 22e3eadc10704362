//! Verification stage definitions and configuration.

use serde::{Deserialize, Serialize};

use fixbench_core::{ExecutionMode, ExecutionRequest};

/// The three verification stages, in report order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Static analysis of the candidate. Advisory by default.
    Lint,

    /// Execute the candidate itself.
    Run,

    /// Execute the associated test suite.
    Test,
}

impl Stage {
    /// All stages in canonical order.
    pub const ALL: [Stage; 3] = [Stage::Lint, Stage::Run, Stage::Test];

    /// Get the stage name as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Lint => "lint",
            Stage::Run => "run",
            Stage::Test => "test",
        }
    }

    /// Sandbox mode used to execute this stage.
    pub fn mode(&self) -> ExecutionMode {
        match self {
            Stage::Lint => ExecutionMode::Lint,
            Stage::Run => ExecutionMode::Run,
            Stage::Test => ExecutionMode::Test,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.name() == name)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for one planned stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    pub stage: Stage,

    /// What the sandbox runs for this stage.
    pub request: ExecutionRequest,

    /// Whether this stage runs at all.
    pub enabled: bool,

    /// Whether a failure of this stage fails the overall verdict.
    pub counts_toward_verdict: bool,
}

impl StageConfig {
    /// Create an enabled stage that counts toward the verdict.
    pub fn new(stage: Stage, request: ExecutionRequest) -> Self {
        Self {
            stage,
            request,
            enabled: true,
            counts_toward_verdict: true,
        }
    }

    /// Disable this stage.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Record this stage's result without letting it decide the verdict.
    pub fn advisory(mut self) -> Self {
        self.counts_toward_verdict = false;
        self
    }
}
