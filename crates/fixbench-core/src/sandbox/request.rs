//! Execution request types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the target is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Run the target with the configured interpreter.
    Run,
    /// Run the target as a test suite with the configured test runner.
    Test,
    /// Check the target with the configured linter.
    Lint,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Run => "run",
            ExecutionMode::Test => "test",
            ExecutionMode::Lint => "lint",
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to execute: an existing file, or source text materialized for the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// A file in the workspace (relative to the root, or absolute inside it).
    File(PathBuf),
    /// Source text written to a uniquely named temp file for the duration of the call.
    Inline { source: String, extension: String },
}

/// A single sandboxed execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub target: Target,
    pub mode: ExecutionMode,

    /// Overrides the configured timeout when set. Must be non-zero.
    pub timeout: Option<Duration>,

    /// Extra arguments appended after the target path.
    pub args: Vec<String>,

    /// Text piped to the child's stdin.
    pub stdin: Option<String>,

    /// Working directory; relative paths resolve against the workspace root.
    pub working_dir: Option<PathBuf>,
}

impl ExecutionRequest {
    pub fn new(target: Target, mode: ExecutionMode) -> Self {
        Self {
            target,
            mode,
            timeout: None,
            args: Vec::new(),
            stdin: None,
            working_dir: None,
        }
    }

    pub fn file(path: impl Into<PathBuf>, mode: ExecutionMode) -> Self {
        Self::new(Target::File(path.into()), mode)
    }

    /// Inline Python source, the common case for generated candidates.
    pub fn inline(source: impl Into<String>, mode: ExecutionMode) -> Self {
        Self::new(
            Target::Inline {
                source: source.into(),
                extension: "py".into(),
            },
            mode,
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}
