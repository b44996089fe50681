//! Mock command runner for testing.
//!
//! Provides a configurable implementation of the CommandRunner trait that
//! records every call and returns predefined responses, so callers can be
//! tested without `az`, `terraform` or `ssh-keygen` installed.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;

use crate::config::CommandSpec;
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, ExecutionResult};

/// Predefined mock response for a command.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl MockResponse {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub program: String,
    pub args: Vec<String>,
    pub workdir: Option<PathBuf>,
    pub env: HashMap<String, String>,
}

impl CapturedCall {
    /// Program and arguments joined by spaces.
    pub fn line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Mock command runner for testing.
#[derive(Clone, Default)]
pub struct MockRunner {
    /// Queued responses keyed by program name.
    responses: Arc<RwLock<HashMap<String, VecDeque<MockResponse>>>>,
    /// Captured calls for verification.
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
    /// Programs that report as not installed.
    missing_tools: Arc<RwLock<HashSet<String>>>,
    /// Simulated spawn failure.
    simulate_failure: Arc<RwLock<Option<String>>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next call to `program`.
    pub fn add_response(self, program: impl Into<String>, response: MockResponse) -> Self {
        self.responses
            .write()
            .entry(program.into())
            .or_default()
            .push_back(response);
        self
    }

    /// Report `program` as missing from PATH.
    pub fn without_tool(self, program: impl Into<String>) -> Self {
        self.missing_tools.write().insert(program.into());
        self
    }

    /// Fail every call with a spawn-level error.
    pub fn simulate_failure(self, message: impl Into<String>) -> Self {
        *self.simulate_failure.write() = Some(message.into());
        self
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get calls to a specific program.
    pub fn get_program_calls(&self, program: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.program == program)
            .cloned()
            .collect()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Clear all captured calls.
    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    fn next_response(&self, program: &str) -> MockResponse {
        self.responses
            .write()
            .get_mut(program)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| MockResponse::success(""))
    }
}

impl CommandRunner for MockRunner {
    fn run(&self, spec: &CommandSpec) -> RunnerResult<ExecutionResult> {
        self.captured_calls.write().push(CapturedCall {
            program: spec.program.clone(),
            args: spec.args.clone(),
            workdir: spec.workdir.clone(),
            env: spec.env.clone(),
        });

        if let Some(msg) = self.simulate_failure.read().clone() {
            return Err(RunnerError::ExecutionFailed(msg));
        }

        let response = self.next_response(&spec.program);
        let now = Utc::now();
        Ok(ExecutionResult {
            program: spec.program.clone(),
            exit_code: response.exit_code,
            stdout: response.stdout,
            stderr: response.stderr,
            started_at: now,
            finished_at: now,
            duration_ms: 0,
        })
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        if self.missing_tools.read().contains(program) {
            None
        } else {
            Some(PathBuf::from("/usr/bin").join(program))
        }
    }
}
