//! Error types for the runner module.

use thiserror::Error;

/// Result type alias for runner operations.
pub type RunnerResult<T> = Result<T, RunnerError>;

/// Errors that can occur while running external commands.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Required tool not found on PATH: {0}")]
    ToolNotFound(String),

    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    #[error("{program} exited with code {code}: {message}")]
    NonZeroExit {
        program: String,
        code: i32,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
