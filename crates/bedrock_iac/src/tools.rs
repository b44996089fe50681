//! External tool availability checks.

use bedrock_runner::CommandRunner;
use tracing::info;

use crate::azure::AZ;
use crate::error::IacResult;
use crate::ssh::SSH_KEYGEN;
use crate::terraform::TERRAFORM;

/// Tools needed to initialize an environment.
pub fn init_tools(provision: bool) -> Vec<&'static str> {
    let mut tools = vec![SSH_KEYGEN];
    if provision {
        tools.insert(0, AZ);
    }
    tools
}

/// Tools needed to plan or apply a generated environment.
pub fn deploy_tools() -> Vec<&'static str> {
    vec![TERRAFORM]
}

/// Fail with `ToolNotFound` for the first tool missing from PATH.
pub fn check_tools(runner: &dyn CommandRunner, tools: &[&str]) -> IacResult<()> {
    let paths = runner.require_tools(tools)?;
    for (tool, path) in tools.iter().zip(paths) {
        info!("Using {}: {}", tool, path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IacError;
    use bedrock_runner::{MockRunner, RunnerError};

    #[test]
    fn test_init_tools() {
        assert_eq!(init_tools(true), vec!["az", "ssh-keygen"]);
        assert_eq!(init_tools(false), vec!["ssh-keygen"]);
    }

    #[test]
    fn test_check_tools_reports_missing() {
        let mock = MockRunner::new().without_tool("terraform");
        let err = check_tools(&mock, &deploy_tools()).unwrap_err();
        assert!(matches!(err, IacError::Runner(RunnerError::ToolNotFound(t)) if t == "terraform"));
        assert!(check_tools(&mock, &init_tools(true)).is_ok());
    }
}
