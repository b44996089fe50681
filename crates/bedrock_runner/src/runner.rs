//! Command runner trait and types.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::CommandSpec;
use crate::error::{RunnerError, RunnerResult};

/// Result of a finished command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Program that was executed
    pub program: String,
    /// Exit code (-1 when terminated by a signal)
    pub exit_code: i32,
    /// Captured stdout
    pub stdout: String,
    /// Captured stderr
    pub stderr: String,
    /// Execution start time
    pub started_at: DateTime<Utc>,
    /// Execution end time
    pub finished_at: DateTime<Utc>,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Check if execution was successful (exit code 0).
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get combined output (stdout + stderr).
    pub fn combined_output(&self) -> String {
        if self.stdout.is_empty() {
            self.stderr.clone()
        } else if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }

    /// Convert a non-zero exit into an error.
    pub fn into_checked(self) -> RunnerResult<Self> {
        if self.success() {
            return Ok(self);
        }
        let message = self
            .stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("no error output")
            .to_string();
        Err(RunnerError::NonZeroExit {
            program: self.program,
            code: self.exit_code,
            message,
        })
    }
}

/// Blocking command runner.
///
/// Every call runs to completion before returning; there is no timeout or
/// cancellation.
pub trait CommandRunner: Send + Sync {
    /// Run a command and capture its output.
    fn run(&self, spec: &CommandSpec) -> RunnerResult<ExecutionResult>;

    /// Resolve a program on PATH.
    fn locate(&self, program: &str) -> Option<PathBuf>;

    /// Run a command and fail on a non-zero exit code.
    fn run_checked(&self, spec: &CommandSpec) -> RunnerResult<ExecutionResult> {
        self.run(spec)?.into_checked()
    }

    /// Ensure every listed program is installed.
    fn require_tools(&self, programs: &[&str]) -> RunnerResult<Vec<PathBuf>> {
        programs
            .iter()
            .map(|program| {
                self.locate(program)
                    .ok_or_else(|| RunnerError::ToolNotFound(program.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(exit_code: i32, stdout: &str, stderr: &str) -> ExecutionResult {
        let now = Utc::now();
        ExecutionResult {
            program: "az".to_string(),
            exit_code,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            started_at: now,
            finished_at: now,
            duration_ms: 0,
        }
    }

    #[test]
    fn test_combined_output() {
        assert_eq!(result(0, "out", "").combined_output(), "out");
        assert_eq!(result(0, "", "err").combined_output(), "err");
        assert_eq!(result(0, "out", "err").combined_output(), "out\nerr");
    }

    #[test]
    fn test_into_checked_uses_last_stderr_line() {
        let err = result(3, "", "WARNING: deprecated\nERROR: group not found\n\n")
            .into_checked()
            .unwrap_err();

        match err {
            RunnerError::NonZeroExit { program, code, message } => {
                assert_eq!(program, "az");
                assert_eq!(code, 3);
                assert_eq!(message, "ERROR: group not found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
