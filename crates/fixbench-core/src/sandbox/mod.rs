//! Sandbox: timeout-bounded execution of candidates, test suites and linters.
//!
//! # Modules
//!
//! - [`request`]: `ExecutionRequest`, `ExecutionMode`, `Target`
//! - [`execution`]: `Sandbox`, `CommandSpec`, `ExecutionResult`
//! - `process`: process-group isolation and the kill-on-drop guard

pub mod execution;
mod process;
pub mod request;

pub use execution::{CommandSpec, ExecutionResult, Sandbox};
pub use request::{ExecutionMode, ExecutionRequest, Target};
