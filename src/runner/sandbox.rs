//! Subprocess sandbox for candidate programs.
//!
//! Each execution writes the candidate to a uniquely named scratch file, runs
//! it under the configured interpreter with a wall-clock timeout and removes
//! the file again, whatever the outcome.

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, warn};

/// Diagnostic recorded when a candidate exceeds its time budget.
pub const EXECUTION_TIMED_OUT: &str = "execution timed out";

/// Configuration for the sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Interpreter invoked with the scratch file as its only argument.
    pub interpreter: String,
    /// Suffix of the scratch file (e.g. `.py`).
    pub script_suffix: String,
    /// Wall-clock limit for one execution.
    pub timeout: Duration,
    /// Directory for scratch files; the system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

impl SandboxConfig {
    /// Creates a configuration for the given interpreter with defaults.
    pub fn new(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            script_suffix: ".py".to_string(),
            timeout: Duration::from_secs(10),
            scratch_dir: None,
        }
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the scratch file suffix.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.script_suffix = suffix.into();
        self
    }

    /// Places scratch files under `dir`.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self::new("python3")
    }
}

/// Outcome of running one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn success(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration: Duration::ZERO,
        }
    }

    pub fn failure(diagnostic: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: diagnostic.into(),
            duration: Duration::ZERO,
        }
    }

    pub fn timed_out(&self) -> bool {
        !self.success && self.stderr == EXECUTION_TIMED_OUT
    }

    fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Text recorded against a failed sample.
    ///
    /// Standard error when present, otherwise standard output.
    pub fn diagnostic(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Runs candidate programs.
///
/// Failures of any kind are reported through [`ExecutionResult::success`],
/// never as an `Err`, so one bad candidate cannot abort a batch.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute(&self, code: &str) -> ExecutionResult;
}

/// Local subprocess sandbox.
pub struct Sandbox {
    config: SandboxConfig,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    fn write_scratch(&self, code: &str) -> std::io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("candidate-").suffix(&self.config.script_suffix);

        let mut file = match &self.config.scratch_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                builder.tempfile_in(dir)?
            }
            None => builder.tempfile()?,
        };
        file.write_all(code.as_bytes())?;
        file.flush()?;
        Ok(file)
    }

    async fn run(&self, code: &str) -> ExecutionResult {
        // Dropping the handle deletes the file on every path out of this function.
        let scratch = match self.write_scratch(code) {
            Ok(file) => file,
            Err(e) => {
                warn!(error = %e, "Failed to write scratch file");
                return ExecutionResult::failure(format!("failed to write scratch file: {}", e));
            }
        };
        debug!(path = %scratch.path().display(), "Running candidate");

        let child = Command::new(&self.config.interpreter)
            .arg(scratch.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(interpreter = %self.config.interpreter, error = %e, "Failed to spawn interpreter");
                return ExecutionResult::failure(format!(
                    "failed to spawn '{}': {}",
                    self.config.interpreter, e
                ));
            }
        };

        // On timeout the child future is dropped and kill_on_drop terminates it.
        match tokio::time::timeout(self.config.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                if output.status.success() {
                    ExecutionResult::success(stdout, stderr)
                } else {
                    let stderr = if stderr.trim().is_empty() {
                        format!("process exited with {}", output.status)
                    } else {
                        stderr
                    };
                    ExecutionResult {
                        success: false,
                        stdout,
                        stderr,
                        duration: Duration::ZERO,
                    }
                }
            }
            Ok(Err(e)) => ExecutionResult::failure(format!("failed to collect output: {}", e)),
            Err(_) => {
                debug!(timeout = ?self.config.timeout, "Candidate timed out");
                ExecutionResult::failure(EXECUTION_TIMED_OUT)
            }
        }
    }
}

#[async_trait]
impl CodeExecutor for Sandbox {
    async fn execute(&self, code: &str) -> ExecutionResult {
        let start = Instant::now();
        let result = self.run(code).await;
        result.with_duration(start.elapsed())
    }
}
