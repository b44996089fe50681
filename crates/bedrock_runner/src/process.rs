//! Process-based command runner.
//!
//! Commands run synchronously. When log streaming is requested, stdout and
//! stderr are drained by background reader threads that forward each line
//! to `tracing` while the calling thread blocks on process completion.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::config::CommandSpec;
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, ExecutionResult};

/// Log output from a running process.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub stream: LogStream,
    pub message: String,
}

/// Log stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// Log handler callback type.
pub type LogHandler = Arc<dyn Fn(LogLine) + Send + Sync>;

/// Process runner options.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunnerOptions {
    /// Log commands instead of executing them
    pub dry_run: bool,
}

impl ProcessRunnerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Runs commands as child processes of the current process.
#[derive(Default)]
pub struct ProcessRunner {
    options: ProcessRunnerOptions,
    log_handler: Option<LogHandler>,
}

impl ProcessRunner {
    pub fn new(options: ProcessRunnerOptions) -> Self {
        Self {
            options,
            log_handler: None,
        }
    }

    /// Set a log handler that receives every streamed line.
    pub fn with_log_handler(mut self, handler: LogHandler) -> Self {
        self.log_handler = Some(handler);
        self
    }

    /// Check if dry-run mode is enabled.
    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    fn build_command(spec: &CommandSpec) -> Command {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.workdir {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }

    /// Spawn a thread that collects one output stream, optionally forwarding
    /// each line to the log.
    fn drain<R: Read + Send + 'static>(
        &self,
        reader: R,
        stream: LogStream,
        forward: bool,
    ) -> JoinHandle<String> {
        let log_handler = self.log_handler.clone();
        std::thread::spawn(move || {
            let reader = BufReader::new(reader);
            let mut output = String::new();
            for line in reader.lines().map_while(Result::ok) {
                output.push_str(&line);
                output.push('\n');
                if !forward {
                    continue;
                }
                match stream {
                    LogStream::Stdout => info!("{}", line),
                    LogStream::Stderr => warn!("{}", line),
                }
                if let Some(handler) = &log_handler {
                    handler(LogLine {
                        timestamp: Utc::now(),
                        stream,
                        message: line,
                    });
                }
            }
            output
        })
    }

    fn execute(&self, spec: &CommandSpec) -> RunnerResult<(i32, String, String)> {
        let mut child = Self::build_command(spec)
            .spawn()
            .map_err(|source| RunnerError::SpawnFailed {
                program: spec.program.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RunnerError::ExecutionFailed("stdout was not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RunnerError::ExecutionFailed("stderr was not captured".to_string()))?;

        let stdout_handle = self.drain(stdout, LogStream::Stdout, spec.stream_logs);
        let stderr_handle = self.drain(stderr, LogStream::Stderr, spec.stream_logs);

        let status = child.wait().map_err(|e| {
            RunnerError::ExecutionFailed(format!("Failed to wait for {}: {}", spec.program, e))
        })?;

        let stdout_output = stdout_handle.join().unwrap_or_default();
        let stderr_output = stderr_handle.join().unwrap_or_default();

        Ok((status.code().unwrap_or(-1), stdout_output, stderr_output))
    }
}

impl CommandRunner for ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> RunnerResult<ExecutionResult> {
        let cmd_str = spec.command_line();

        if self.options.dry_run {
            info!("[DRY-RUN] Would execute: {}", cmd_str);
            let now = Utc::now();
            return Ok(ExecutionResult {
                program: spec.program.clone(),
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                started_at: now,
                finished_at: now,
                duration_ms: 0,
            });
        }

        debug!("Executing: {}", cmd_str);

        let started_at = Utc::now();
        let (exit_code, stdout, stderr) = self.execute(spec)?;
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;

        if exit_code == 0 {
            debug!("{} completed in {}ms", spec.program, duration_ms);
        } else {
            error!(
                "{} failed with exit code {} after {}ms",
                spec.program, exit_code, duration_ms
            );
        }

        Ok(ExecutionResult {
            program: spec.program.clone(),
            exit_code,
            stdout,
            stderr,
            started_at,
            finished_at,
            duration_ms,
        })
    }

    fn locate(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run_mode() {
        let runner = ProcessRunner::new(ProcessRunnerOptions::new().dry_run());
        assert!(runner.is_dry_run());

        let result = runner
            .run(&CommandSpec::new("definitely-not-a-real-binary").arg("--flag"))
            .unwrap();
        assert!(result.success());
        assert!(result.stdout.is_empty());
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let runner = ProcessRunner::default();
        let err = runner
            .run(&CommandSpec::new("definitely-not-a-real-binary"))
            .unwrap_err();
        assert!(matches!(err, RunnerError::SpawnFailed { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_captures_stdout_and_exit_code() {
        let runner = ProcessRunner::default();
        let result = runner
            .run(&CommandSpec::new("sh").args(["-c", "echo hello; echo oops >&2; exit 4"]))
            .unwrap();

        assert_eq!(result.exit_code, 4);
        assert_eq!(result.stdout, "hello\n");
        assert_eq!(result.stderr, "oops\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_streaming_invokes_log_handler() {
        let lines = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = Arc::clone(&lines);
        let runner = ProcessRunner::default().with_log_handler(Arc::new(move |line: LogLine| {
            sink.lock().push((line.stream, line.message));
        }));

        runner
            .run(&CommandSpec::new("sh").args(["-c", "echo one; echo two"]).stream())
            .unwrap();

        let lines = lines.lock();
        assert_eq!(
            *lines,
            vec![
                (LogStream::Stdout, "one".to_string()),
                (LogStream::Stdout, "two".to_string())
            ]
        );
    }
}
