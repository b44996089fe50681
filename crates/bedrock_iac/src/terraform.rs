//! Terraform invocation for generated environment directories.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use bedrock_runner::{CommandRunner, CommandSpec};

use crate::error::{IacError, IacResult};

pub const TERRAFORM: &str = "terraform";

/// Result of a Terraform operation.
#[derive(Debug)]
pub struct TerraformResult {
    pub success: bool,
    pub output: String,
    pub exit_code: i32,
}

/// The provisioning tool driven against a generated directory.
pub trait ProvisioningTool: Send + Sync {
    /// Initialize the working directory, optionally against a remote backend.
    fn init(&self, dir: &Path, backend_config: Option<&Path>) -> IacResult<TerraformResult>;

    /// Produce an execution plan using the given variable file.
    fn plan(&self, dir: &Path, var_file: &Path) -> IacResult<TerraformResult>;

    /// Apply the configuration without interactive approval.
    fn apply(&self, dir: &Path, var_file: &Path) -> IacResult<TerraformResult>;
}

/// Terraform runner that executes the local `terraform` binary.
pub struct TerraformRunner {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl TerraformRunner {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: TERRAFORM.to_string(),
        }
    }

    /// Use a different binary, e.g. a pinned `terraform` path.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn run_command(&self, working_dir: &Path, args: Vec<String>) -> IacResult<TerraformResult> {
        let spec = CommandSpec::new(&self.program)
            .args(args)
            .workdir(working_dir)
            .stream();

        debug!("Executing {}", spec.command_line());

        let result = self.runner.run(&spec)?;

        Ok(TerraformResult {
            success: result.success(),
            output: result.combined_output(),
            exit_code: result.exit_code,
        })
    }
}

/// Turn an unsuccessful result into the stage-specific error.
fn check(result: TerraformResult, stage: fn(String) -> IacError) -> IacResult<TerraformResult> {
    if result.success {
        return Ok(result);
    }
    let last_line = result
        .output
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no output")
        .trim()
        .to_string();
    Err(stage(format!("exit code {}: {}", result.exit_code, last_line)))
}

impl ProvisioningTool for TerraformRunner {
    fn init(&self, dir: &Path, backend_config: Option<&Path>) -> IacResult<TerraformResult> {
        info!("Running terraform init in {:?}", dir);
        let mut args = vec!["init".to_string()];
        if let Some(backend) = backend_config {
            args.push(format!("-backend-config={}", backend.display()));
        }
        check(self.run_command(dir, args)?, IacError::InitFailed)
    }

    fn plan(&self, dir: &Path, var_file: &Path) -> IacResult<TerraformResult> {
        info!("Running terraform plan in {:?}", dir);
        let args = vec!["plan".to_string(), format!("-var-file={}", var_file.display())];
        check(self.run_command(dir, args)?, IacError::PlanFailed)
    }

    fn apply(&self, dir: &Path, var_file: &Path) -> IacResult<TerraformResult> {
        info!("Running terraform apply in {:?}", dir);
        let args = vec![
            "apply".to_string(),
            format!("-var-file={}", var_file.display()),
            "-auto-approve".to_string(),
        ];
        check(self.run_command(dir, args)?, IacError::ApplyFailed)
    }
}
