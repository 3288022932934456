//! Sandboxed execution of candidate programs.
//!
//! ```text
//! candidate text → scratch file → interpreter (timeout) → ExecutionResult
//! ```
//!
//! The pipeline talks to the sandbox through [`CodeExecutor`], so tests can
//! substitute scripted executors.

pub mod sandbox;

pub use sandbox::{CodeExecutor, ExecutionResult, Sandbox, SandboxConfig, EXECUTION_TIMED_OUT};
