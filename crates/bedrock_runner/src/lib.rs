//! # bedrock_runner
//!
//! Subprocess execution for the bedrock environment tooling.
//!
//! Every external tool the engine drives (`terraform`, `az`, `ssh-keygen`)
//! goes through the [`CommandRunner`] trait, so the engine can be exercised
//! against [`MockRunner`] in tests.
//!
//! # Features
//!
//! - **Blocking execution**: each command runs to completion before the call returns
//! - **Live logging**: background readers forward output lines to `tracing`
//! - **Dry-run mode**: log commands without executing them
//! - **Secret masking**: sensitive arguments never reach the log
//! - **Mock runner**: records calls and replays canned responses
//!
//! # Example
//!
//! ```rust,no_run
//! use bedrock_runner::{CommandRunner, CommandSpec, ProcessRunner, ProcessRunnerOptions};
//!
//! let runner = ProcessRunner::new(ProcessRunnerOptions::default());
//! let result = runner
//!     .run_checked(&CommandSpec::new("terraform").arg("version"))
//!     .unwrap();
//! println!("{}", result.stdout);
//! ```

pub mod config;
pub mod error;
pub mod mock;
pub mod process;
pub mod runner;

pub use config::CommandSpec;
pub use error::{RunnerError, RunnerResult};
pub use mock::{CapturedCall, MockResponse, MockRunner};
pub use process::{LogHandler, LogLine, LogStream, ProcessRunner, ProcessRunnerOptions};
pub use runner::{CommandRunner, ExecutionResult};
