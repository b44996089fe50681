//! Command specification types.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const REDACTED: &str = "****";

/// A single external command invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandSpec {
    /// Program to execute (looked up on PATH)
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Working directory for the process
    pub workdir: Option<PathBuf>,
    /// Extra environment variables for the process
    pub env: HashMap<String, String>,
    /// Forward output lines to the log while the process runs
    pub stream_logs: bool,
    /// Argument values that must never be written to the log
    #[serde(skip)]
    pub sensitive: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add an argument whose value is masked in `command_line`.
    pub fn secret_arg(mut self, arg: impl Into<String>) -> Self {
        let arg = arg.into();
        if !arg.is_empty() {
            self.sensitive.push(arg.clone());
        }
        self.args.push(arg);
        self
    }

    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn stream(mut self) -> Self {
        self.stream_logs = true;
        self
    }

    /// Printable command line with sensitive values masked.
    pub fn command_line(&self) -> String {
        let mut cmd = self.program.clone();
        for arg in &self.args {
            let shown = if self.sensitive.iter().any(|s| s == arg) {
                REDACTED
            } else {
                arg.as_str()
            };
            if shown.contains(' ') {
                cmd.push_str(&format!(" '{}'", shown));
            } else {
                cmd.push(' ');
                cmd.push_str(shown);
            }
        }
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_builder() {
        let spec = CommandSpec::new("terraform")
            .arg("plan")
            .args(["-var-file=bedrock-config.tfvars", "-no-color"])
            .workdir("/tmp/env")
            .env("TF_IN_AUTOMATION", "1")
            .stream();

        assert_eq!(spec.program, "terraform");
        assert_eq!(spec.args.len(), 3);
        assert_eq!(spec.workdir, Some(PathBuf::from("/tmp/env")));
        assert_eq!(spec.env.get("TF_IN_AUTOMATION"), Some(&"1".to_string()));
        assert!(spec.stream_logs);
    }

    #[test]
    fn test_command_line_masks_secrets() {
        let spec = CommandSpec::new("az")
            .args(["storage", "container", "create", "--account-key"])
            .secret_arg("c2VjcmV0")
            .args(["--name", "demo container"]);

        let line = spec.command_line();
        assert!(!line.contains("c2VjcmV0"));
        assert!(line.contains("--account-key ****"));
        assert!(line.ends_with("'demo container'"));
    }
}
