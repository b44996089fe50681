//! Recording doubles for the cloud and key-generation collaborators.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::azure::CloudClient;
use crate::error::{IacError, IacResult};
use crate::ssh::KeyGenerator;

/// A cloud call captured by `MockCloudClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloudCall {
    ResourceGroupExists { name: String },
    CreateResourceGroup { name: String, location: String },
    CreateStorageAccount { name: String, resource_group: String, location: String },
    FetchStorageKey { account: String, resource_group: Option<String> },
    CreateStorageContainer { name: String, account: String },
}

impl CloudCall {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::ResourceGroupExists { .. } => "resource_group_exists",
            Self::CreateResourceGroup { .. } => "create_resource_group",
            Self::CreateStorageAccount { .. } => "create_storage_account",
            Self::FetchStorageKey { .. } => "fetch_storage_key",
            Self::CreateStorageContainer { .. } => "create_storage_container",
        }
    }
}

/// Mock cloud client for testing.
#[derive(Clone)]
pub struct MockCloudClient {
    calls: Arc<RwLock<Vec<CloudCall>>>,
    existing_groups: Arc<RwLock<HashSet<String>>>,
    failing: Arc<RwLock<HashSet<&'static str>>>,
    storage_key: String,
}

impl Default for MockCloudClient {
    fn default() -> Self {
        Self {
            calls: Arc::default(),
            existing_groups: Arc::default(),
            failing: Arc::default(),
            storage_key: "bW9jay1zdG9yYWdlLWtleQ==".to_string(),
        }
    }
}

impl MockCloudClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `name` as an existing resource group.
    pub fn with_resource_group(self, name: impl Into<String>) -> Self {
        self.existing_groups.write().insert(name.into());
        self
    }

    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Make the named operation fail, e.g. `"create_storage_container"`.
    pub fn fail_on(self, operation: &'static str) -> Self {
        self.failing.write().insert(operation);
        self
    }

    pub fn get_calls(&self) -> Vec<CloudCall> {
        self.calls.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().len()
    }

    /// Names of resource groups created so far.
    pub fn created_groups(&self) -> Vec<String> {
        self.calls
            .read()
            .iter()
            .filter_map(|c| match c {
                CloudCall::CreateResourceGroup { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: CloudCall) -> IacResult<()> {
        let op = call.operation();
        self.calls.write().push(call);
        if self.failing.read().contains(op) {
            return Err(IacError::CloudProvider(format!("simulated failure in {}", op)));
        }
        Ok(())
    }
}

impl CloudClient for MockCloudClient {
    fn resource_group_exists(&self, name: &str) -> IacResult<bool> {
        self.record(CloudCall::ResourceGroupExists { name: name.to_string() })?;
        Ok(self.existing_groups.read().contains(name))
    }

    fn create_resource_group(&self, name: &str, location: &str) -> IacResult<()> {
        self.record(CloudCall::CreateResourceGroup {
            name: name.to_string(),
            location: location.to_string(),
        })?;
        self.existing_groups.write().insert(name.to_string());
        Ok(())
    }

    fn create_storage_account(&self, name: &str, resource_group: &str, location: &str) -> IacResult<()> {
        self.record(CloudCall::CreateStorageAccount {
            name: name.to_string(),
            resource_group: resource_group.to_string(),
            location: location.to_string(),
        })
    }

    fn fetch_storage_key(&self, account: &str, resource_group: Option<&str>) -> IacResult<String> {
        self.record(CloudCall::FetchStorageKey {
            account: account.to_string(),
            resource_group: resource_group.map(str::to_string),
        })?;
        Ok(self.storage_key.clone())
    }

    fn create_storage_container(&self, name: &str, account: &str, _key: &str) -> IacResult<()> {
        self.record(CloudCall::CreateStorageContainer {
            name: name.to_string(),
            account: account.to_string(),
        })
    }
}

/// Mock key generator that writes nothing and returns a fixed key.
#[derive(Clone)]
pub struct MockKeyGenerator {
    public_key: String,
    fail: bool,
    calls: Arc<RwLock<Vec<PathBuf>>>,
}

impl Default for MockKeyGenerator {
    fn default() -> Self {
        Self {
            public_key: "ssh-rsa AAAAB3NzaC1yc2EAAAADAQABAAABAQC0mock bedrock@test".to_string(),
            fail: false,
            calls: Arc::default(),
        }
    }
}

impl MockKeyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    /// Private key paths requested so far.
    pub fn get_calls(&self) -> Vec<PathBuf> {
        self.calls.read().clone()
    }
}

impl KeyGenerator for MockKeyGenerator {
    fn generate(&self, dir: &Path, name: &str) -> IacResult<String> {
        self.calls.write().push(dir.join(name));
        if self.fail {
            return Err(IacError::KeyGeneration("simulated failure".to_string()));
        }
        Ok(self.public_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_cloud_records_calls() {
        let cloud = MockCloudClient::new().with_resource_group("demo-kv-rg");
        assert!(cloud.resource_group_exists("demo-kv-rg").unwrap());
        assert!(!cloud.resource_group_exists("other").unwrap());
        cloud.create_resource_group("other", "westus2").unwrap();
        assert!(cloud.resource_group_exists("other").unwrap());

        assert_eq!(cloud.call_count(), 4);
        assert_eq!(cloud.created_groups(), vec!["other"]);
    }

    #[test]
    fn test_mock_cloud_fail_on() {
        let cloud = MockCloudClient::new().fail_on("create_storage_account");
        cloud.create_resource_group("rg", "centralus").unwrap();
        assert!(cloud.create_storage_account("acct", "rg", "centralus").is_err());
        // failed calls are still recorded
        assert_eq!(cloud.call_count(), 2);
    }

    #[test]
    fn test_mock_key_generator() {
        let keys = MockKeyGenerator::new();
        let key = keys.generate(Path::new("/tmp/env"), "deploy-key").unwrap();
        assert_eq!(key, keys.public_key());
        assert_eq!(keys.get_calls(), vec![PathBuf::from("/tmp/env/deploy-key")]);
        assert!(MockKeyGenerator::failing()
            .generate(Path::new("/tmp"), "k")
            .is_err());
    }
}
