//! Azure resource provisioning through the `az` CLI.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use bedrock_runner::{CommandRunner, CommandSpec};

use crate::error::{IacError, IacResult};

pub const AZ: &str = "az";

/// Cloud operations needed while initializing an environment.
pub trait CloudClient: Send + Sync {
    /// Check whether a resource group exists.
    fn resource_group_exists(&self, name: &str) -> IacResult<bool>;

    fn create_resource_group(&self, name: &str, location: &str) -> IacResult<()>;

    fn create_storage_account(&self, name: &str, resource_group: &str, location: &str) -> IacResult<()>;

    /// Fetch the primary access key of a storage account.
    ///
    /// Without a resource group the account is looked up by name alone.
    fn fetch_storage_key(&self, account: &str, resource_group: Option<&str>) -> IacResult<String>;

    fn create_storage_container(&self, name: &str, account: &str, key: &str) -> IacResult<()>;
}

#[derive(Debug, Deserialize)]
struct StorageKey {
    #[serde(rename = "keyName", default)]
    key_name: String,
    value: String,
}

/// `CloudClient` backed by the Azure CLI.
pub struct AzureCliClient {
    runner: Arc<dyn CommandRunner>,
}

impl AzureCliClient {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn az(&self, spec: CommandSpec) -> IacResult<String> {
        debug!("Executing {}", spec.command_line());
        let result = self.runner.run(&spec)?;
        if !result.success() {
            let message = result
                .stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no error output")
                .trim()
                .to_string();
            return Err(IacError::CloudProvider(format!(
                "{} exited with {}: {}",
                spec.command_line(),
                result.exit_code,
                message
            )));
        }
        Ok(result.stdout)
    }
}

impl CloudClient for AzureCliClient {
    fn resource_group_exists(&self, name: &str) -> IacResult<bool> {
        let out = self.az(CommandSpec::new(AZ).args(["group", "exists", "--name", name]))?;
        match out.trim() {
            "true" => Ok(true),
            "false" => Ok(false),
            other => Err(IacError::UnexpectedOutput(format!(
                "az group exists returned '{}'",
                other
            ))),
        }
    }

    fn create_resource_group(&self, name: &str, location: &str) -> IacResult<()> {
        info!("Creating resource group {} in {}", name, location);
        self.az(CommandSpec::new(AZ).args([
            "group", "create", "--name", name, "--location", location, "-o", "none",
        ]))?;
        Ok(())
    }

    fn create_storage_account(&self, name: &str, resource_group: &str, location: &str) -> IacResult<()> {
        info!("Creating storage account {} in {}", name, resource_group);
        self.az(CommandSpec::new(AZ).args([
            "storage",
            "account",
            "create",
            "--name",
            name,
            "--resource-group",
            resource_group,
            "--location",
            location,
            "--sku",
            "Standard_LRS",
            "--encryption-services",
            "blob",
            "-o",
            "none",
        ]))?;
        Ok(())
    }

    fn fetch_storage_key(&self, account: &str, resource_group: Option<&str>) -> IacResult<String> {
        let mut spec = CommandSpec::new(AZ).args([
            "storage",
            "account",
            "keys",
            "list",
            "--account-name",
            account,
        ]);
        if let Some(group) = resource_group {
            spec = spec.args(["--resource-group", group]);
        }
        let out = self.az(spec.args(["-o", "json"]))?;
        let keys: Vec<StorageKey> = serde_json::from_str(&out)?;
        let key = keys.into_iter().next().ok_or_else(|| {
            IacError::UnexpectedOutput(format!("no access keys listed for {}", account))
        })?;
        debug!("Using storage key {} for {}", key.key_name, account);
        Ok(key.value)
    }

    fn create_storage_container(&self, name: &str, account: &str, key: &str) -> IacResult<()> {
        info!("Creating storage container {} in {}", name, account);
        let spec = CommandSpec::new(AZ)
            .args([
                "storage",
                "container",
                "create",
                "--name",
                name,
                "--account-name",
                account,
                "--account-key",
            ])
            .secret_arg(key)
            .args(["-o", "none"]);
        self.az(spec)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bedrock_runner::{MockResponse, MockRunner};

    #[test]
    fn test_resource_group_exists_parses_output() {
        let mock = MockRunner::new()
            .add_response(AZ, MockResponse::success("true\n"))
            .add_response(AZ, MockResponse::success("false\n"));
        let client = AzureCliClient::new(Arc::new(mock.clone()));

        assert!(client.resource_group_exists("demo-rg").unwrap());
        assert!(!client.resource_group_exists("demo-rg").unwrap());
        assert_eq!(mock.get_calls()[0].line(), "az group exists --name demo-rg");
    }

    #[test]
    fn test_resource_group_exists_rejects_garbage() {
        let mock = MockRunner::new().add_response(AZ, MockResponse::success("maybe"));
        let client = AzureCliClient::new(Arc::new(mock));
        assert!(matches!(
            client.resource_group_exists("x"),
            Err(IacError::UnexpectedOutput(_))
        ));
    }

    #[test]
    fn test_fetch_storage_key_takes_first_key() {
        let json = r#"[
            {"keyName": "key1", "permissions": "FULL", "value": "abc123=="},
            {"keyName": "key2", "permissions": "FULL", "value": "def456=="}
        ]"#;
        let mock = MockRunner::new().add_response(AZ, MockResponse::success(json));
        let client = AzureCliClient::new(Arc::new(mock));

        let key = client.fetch_storage_key("demostore", Some("demo-storage-rg")).unwrap();
        assert_eq!(key, "abc123==");
    }

    #[test]
    fn test_fetch_storage_key_without_resource_group() {
        let json = r#"[{"keyName": "key1", "value": "abc123=="}]"#;
        let mock = MockRunner::new().add_response(AZ, MockResponse::success(json));
        let client = AzureCliClient::new(Arc::new(mock.clone()));

        client.fetch_storage_key("corpstate", None).unwrap();

        let calls = mock.get_program_calls(AZ);
        assert_eq!(
            calls[0].line(),
            "az storage account keys list --account-name corpstate -o json"
        );
    }

    #[test]
    fn test_fetch_storage_key_empty_list() {
        let mock = MockRunner::new().add_response(AZ, MockResponse::success("[]"));
        let client = AzureCliClient::new(Arc::new(mock));
        assert!(client.fetch_storage_key("a", Some("b")).is_err());
    }

    #[test]
    fn test_create_container_passes_key() {
        let mock = MockRunner::new();
        let client = AzureCliClient::new(Arc::new(mock.clone()));
        client
            .create_storage_container("demo-container", "demo", "s3cret")
            .unwrap();

        let call = &mock.get_calls()[0];
        assert!(call.args.contains(&"s3cret".to_string()));
        assert!(call.args.contains(&"demo-container".to_string()));
    }

    #[test]
    fn test_non_zero_exit_is_cloud_error() {
        let mock = MockRunner::new().add_response(
            AZ,
            MockResponse::failure(1, "ERROR: Please run 'az login' to setup account.\n"),
        );
        let client = AzureCliClient::new(Arc::new(mock));
        let err = client.create_resource_group("demo-rg", "westus2").unwrap_err();
        match err {
            IacError::CloudProvider(msg) => assert!(msg.contains("az login")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
