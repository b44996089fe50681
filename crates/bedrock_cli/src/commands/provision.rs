//! Simulate and deploy commands: run Terraform against generated environments.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use tracing::info;

use bedrock_core::{BACKEND_FILE, PRIMARY_FILE};
use bedrock_iac::{check_tools, deploy_tools, EnvironmentKind, ProvisioningTool, TerraformRunner};
use bedrock_runner::{CommandRunner, ProcessRunner, ProcessRunnerOptions};

use super::GlobalOptions;

#[derive(Args, Debug, Clone)]
pub struct ProvisionArgs {
    /// Environment directory, or a cluster directory holding several environments
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Plan,
    Apply,
}

pub fn simulate(args: ProvisionArgs, globals: &GlobalOptions) -> Result<()> {
    provision(&args.path, globals, Stage::Plan)
}

pub fn deploy(args: ProvisionArgs, globals: &GlobalOptions) -> Result<()> {
    provision(&args.path, globals, Stage::Apply)
}

fn provision(path: &Path, globals: &GlobalOptions, stage: Stage) -> Result<()> {
    let dirs = environment_dirs(path)?;

    let options = if globals.dry_run {
        ProcessRunnerOptions::new().dry_run()
    } else {
        ProcessRunnerOptions::new()
    };
    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new(options));
    if !globals.dry_run {
        check_tools(runner.as_ref(), &deploy_tools())?;
    }

    let terraform = TerraformRunner::new(runner);
    for dir in &dirs {
        run_stage(&terraform, dir, stage)?;
    }

    let verb = match stage {
        Stage::Plan => "Planned",
        Stage::Apply => "Deployed",
    };
    println!();
    println!("✅ {} {} environment(s)", verb, dirs.len());
    Ok(())
}

/// Generated environment directories under `path`, dependencies first.
pub fn environment_dirs(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        bail!("Environment directory not found: {}", path.display());
    }
    if path.join(PRIMARY_FILE).is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut kinds = EnvironmentKind::all();
    kinds.sort_by_key(|k| !k.dependencies().is_empty());

    let dirs: Vec<PathBuf> = kinds
        .into_iter()
        .map(|kind| path.join(kind.as_str()))
        .filter(|dir| dir.join(PRIMARY_FILE).is_file())
        .collect();

    if dirs.is_empty() {
        bail!(
            "No {} found in {} or its environment subdirectories",
            PRIMARY_FILE,
            path.display()
        );
    }
    Ok(dirs)
}

/// `init` (against the backend file when one was generated), then plan or apply.
pub fn run_stage(tool: &dyn ProvisioningTool, dir: &Path, stage: Stage) -> Result<()> {
    info!("Provisioning {}", dir.display());

    let backend = dir
        .join(BACKEND_FILE)
        .is_file()
        .then(|| Path::new(BACKEND_FILE));
    tool.init(dir, backend)?;

    let var_file = Path::new(PRIMARY_FILE);
    match stage {
        Stage::Plan => tool.plan(dir, var_file)?,
        Stage::Apply => tool.apply(dir, var_file)?,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bedrock_iac::IacError;
    use bedrock_runner::{MockResponse, MockRunner};
    use std::fs;

    fn write_env(dir: &Path, with_backend: bool) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(PRIMARY_FILE), "cluster_name = \"demo\"\n").unwrap();
        if with_backend {
            fs::write(dir.join(BACKEND_FILE), "container_name = \"demo-container\"\n").unwrap();
        }
    }

    #[test]
    fn test_single_environment_dir() {
        let temp = tempfile::tempdir().unwrap();
        write_env(temp.path(), false);

        let dirs = environment_dirs(temp.path()).unwrap();
        assert_eq!(dirs, vec![temp.path().to_path_buf()]);
    }

    #[test]
    fn test_cluster_dir_orders_common_first() {
        let temp = tempfile::tempdir().unwrap();
        let keyvault = temp.path().join("azure-single-keyvault");
        let common = temp.path().join("azure-common-infra");
        write_env(&keyvault, true);
        write_env(&common, true);
        fs::create_dir_all(temp.path().join("azure-simple")).unwrap();

        let dirs = environment_dirs(temp.path()).unwrap();
        assert_eq!(dirs, vec![common, keyvault]);
    }

    #[test]
    fn test_missing_environment() {
        let temp = tempfile::tempdir().unwrap();
        assert!(environment_dirs(temp.path()).is_err());
        assert!(environment_dirs(&temp.path().join("absent")).is_err());
    }

    #[test]
    fn test_plan_uses_backend_file_when_present() {
        let temp = tempfile::tempdir().unwrap();
        write_env(temp.path(), true);
        let mock = MockRunner::new();
        let terraform = TerraformRunner::new(Arc::new(mock.clone()));

        run_stage(&terraform, temp.path(), Stage::Plan).unwrap();

        let calls = mock.get_program_calls("terraform");
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].args,
            vec!["init".to_string(), format!("-backend-config={}", BACKEND_FILE)]
        );
        assert_eq!(calls[1].args, vec!["plan".to_string(), format!("-var-file={}", PRIMARY_FILE)]);
        assert_eq!(calls[1].workdir.as_deref(), Some(temp.path()));
    }

    #[test]
    fn test_apply_without_backend_file() {
        let temp = tempfile::tempdir().unwrap();
        write_env(temp.path(), false);
        let mock = MockRunner::new();
        let terraform = TerraformRunner::new(Arc::new(mock.clone()));

        run_stage(&terraform, temp.path(), Stage::Apply).unwrap();

        let calls = mock.get_program_calls("terraform");
        assert_eq!(calls[0].args, vec!["init"]);
        assert_eq!(calls[1].args[0], "apply");
        assert_eq!(calls[1].args.last().map(String::as_str), Some("-auto-approve"));
    }

    #[test]
    fn test_init_failure_stops_before_plan() {
        let temp = tempfile::tempdir().unwrap();
        write_env(temp.path(), false);
        let mock = MockRunner::new().add_response("terraform", MockResponse::failure(1, "backend error"));
        let terraform = TerraformRunner::new(Arc::new(mock.clone()));

        let err = run_stage(&terraform, temp.path(), Stage::Plan).unwrap_err();
        assert!(matches!(err.downcast_ref::<IacError>(), Some(IacError::InitFailed(_))));
        assert_eq!(mock.get_program_calls("terraform").len(), 1);
    }
}
