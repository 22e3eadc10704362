//! Harness configuration.
//!
//! Every executable the harness launches is named explicitly here, so tests
//! can substitute fakes without touching `PATH`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, Result};

/// An external program plus the fixed arguments placed before the target file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCommand {
    /// Executable name or path.
    pub program: String,

    /// Arguments inserted between the program and the target path.
    #[serde(default)]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }

    /// Default interpreter for `run` mode.
    pub fn python() -> Self {
        Self::new("python3", &[])
    }

    /// Default test runner: pytest in verbose mode.
    pub fn pytest() -> Self {
        Self::new("python3", &["-m", "pytest", "-v"])
    }

    /// Default linter: flake8 with a black-compatible profile.
    pub fn flake8() -> Self {
        Self::new("flake8", &["--max-line-length=88", "--ignore=E203,W503"])
    }
}

/// Configuration consumed by the workspace, sandbox and pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory holding candidates, tests and temporary files.
    pub workspace_root: PathBuf,

    /// Wall-clock budget per stage, in seconds. Must be positive.
    pub timeout_secs: u64,

    /// Run the lint stage.
    pub lint_enabled: bool,

    /// Run the test stage when a test file is supplied.
    pub test_enabled: bool,

    /// Count lint failures against the overall verdict.
    pub lint_affects_verdict: bool,

    /// Time between SIGTERM and SIGKILL when a stage times out (milliseconds).
    pub kill_grace_ms: u64,

    pub interpreter: ToolCommand,
    pub test_runner: ToolCommand,
    pub linter: ToolCommand,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("workspace"),
            timeout_secs: 60,
            lint_enabled: true,
            test_enabled: true,
            lint_affects_verdict: false,
            kill_grace_ms: 500,
            interpreter: ToolCommand::python(),
            test_runner: ToolCommand::pytest(),
            linter: ToolCommand::flake8(),
        }
    }
}

impl HarnessConfig {
    /// Default configuration rooted at `workspace_root`.
    pub fn with_root(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            ..Self::default()
        }
    }

    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| HarnessError::from_io(path, e))?;
        let config: HarnessConfig = serde_json::from_str(&raw).map_err(|e| {
            HarnessError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(HarnessError::InvalidConfig(
                "timeout_secs must be greater than zero".into(),
            ));
        }
        for (label, tool) in [
            ("interpreter", &self.interpreter),
            ("test_runner", &self.test_runner),
            ("linter", &self.linter),
        ] {
            if tool.program.trim().is_empty() {
                return Err(HarnessError::InvalidConfig(format!(
                    "{label}.program must not be empty"
                )));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}
