//! fixbench core library
//!
//! Building blocks of the verification harness:
//! - [`workspace`]: candidate files under one root, atomic writes, backups
//! - [`sandbox`]: timeout-bounded child processes with full output capture
//! - [`analyze`]: function and import extraction for Python candidates
//! - [`config`], [`error`], [`obs`], [`telemetry`]: the ambient pieces

pub mod analyze;
pub mod config;
pub mod error;
pub mod obs;
pub mod sandbox;
pub mod telemetry;
pub mod workspace;

pub use analyze::{extract_functions, extract_imports, FunctionInfo};
pub use config::{HarnessConfig, ToolCommand};
pub use error::{ErrorKind, HarnessError, Result};
pub use obs::verify_span;
pub use sandbox::{CommandSpec, ExecutionMode, ExecutionRequest, ExecutionResult, Sandbox, Target};
pub use telemetry::init_tracing;
pub use workspace::{backup_path, Workspace, BACKUP_SUFFIX};

/// fixbench version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
