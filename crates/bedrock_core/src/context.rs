//! Configuration context for one environment instance.
//!
//! Values are resolved once, in this order of precedence:
//! explicit settings, process environment variables, values imported from a
//! resolved Common environment, and finally defaults derived from the
//! cluster identity. The resulting context is never mutated afterwards.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use bedrock_iac::EnvironmentKind;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dependency::CommonOutputs;
use crate::error::{CoreError, CoreResult};
use crate::identity::ClusterIdentity;
use crate::naming::ResourceNames;

pub const ENV_SUBSCRIPTION: &str = "ARM_SUBSCRIPTION_ID";
pub const ENV_CLIENT_ID: &str = "ARM_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "ARM_CLIENT_SECRET";
pub const ENV_TENANT: &str = "ARM_TENANT_ID";
pub const ENV_STORAGE_ACCOUNT: &str = "AZURE_STORAGE_ACCOUNT";
pub const ENV_STORAGE_KEY: &str = "AZURE_STORAGE_KEY";
pub const ENV_CONTAINER: &str = "AZURE_CONTAINER";

/// Built-in defaults.
pub mod defaults {
    pub const REGION: &str = "westus2";
    pub const REGION_WEST: &str = "westus2";
    pub const REGION_CENTRAL: &str = "centralus";
    pub const REGION_EAST: &str = "eastus2";
    pub const STORAGE_LOCATION: &str = "centralus";
    pub const ADDRESS_SPACE: &str = "10.39.0.0/24";
    pub const SUBNET_PREFIX: &str = "10.39.0.0/24";
    pub const VM_COUNT: u32 = 3;
    pub const VM_SIZE: &str = "Standard_D2s_v3";
    pub const MULTIPLE_VM_COUNT: u32 = 3;
    pub const MULTIPLE_VM_SIZE: &str = "Standard_D4s_v3";
    pub const GITOPS_SSH_URL: &str =
        "git@github.com:timfpark/fabrikate-cloud-native-manifests.git";
    pub const GITOPS_URL_BRANCH: &str = "master";
    pub const GITOPS_PATH: &str = "prod";
    pub const GITOPS_POLL_INTERVAL: &str = "5m";
    pub const DEPLOY_KEY_NAME: &str = "deploy-key";
}

/// Source of environment variable values.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Fixed set of variables, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MapEnv(HashMap<String, String>);

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Explicit caller input. Every field is optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    pub subscription: Option<String>,
    pub service_principal: Option<String>,
    pub secret: Option<String>,
    pub tenant_id: Option<String>,

    pub storage_account: Option<String>,
    pub access_key: Option<String>,
    pub container_name: Option<String>,

    pub resource_group: Option<String>,
    pub region: Option<String>,
    pub region_west: Option<String>,
    pub region_central: Option<String>,
    pub region_east: Option<String>,

    pub vnet_name: Option<String>,
    pub subnet_name: Option<String>,
    pub dns_prefix: Option<String>,
    pub keyvault_name: Option<String>,
    pub keyvault_resource_group: Option<String>,
    pub address_space: Option<String>,
    pub subnet_prefix: Option<String>,
    pub vm_count: Option<u32>,
    pub vm_size: Option<String>,

    pub gitops_ssh_url: Option<String>,
    pub gitops_url_branch: Option<String>,
    pub gitops_path: Option<String>,
    pub gitops_poll_interval: Option<String>,
    pub gitops_west_path: Option<String>,
    pub gitops_central_path: Option<String>,
    pub gitops_east_path: Option<String>,
    pub gitops_west_branch: Option<String>,
    pub gitops_central_branch: Option<String>,
    pub gitops_east_branch: Option<String>,

    /// Pre-existing Common environment to import instead of generating one.
    pub common_infra_path: Option<PathBuf>,
}

impl Settings {
    pub fn with_credentials(
        subscription: impl Into<String>,
        service_principal: impl Into<String>,
        secret: impl Into<String>,
        tenant_id: impl Into<String>,
    ) -> Self {
        Self {
            subscription: Some(subscription.into()),
            service_principal: Some(service_principal.into()),
            secret: Some(secret.into()),
            tenant_id: Some(tenant_id.into()),
            ..Self::default()
        }
    }

    /// Settings handed to a Common environment generated on behalf of this one.
    pub(crate) fn for_dependency(&self) -> Self {
        Self {
            resource_group: None,
            common_infra_path: None,
            ..self.clone()
        }
    }
}

/// Service principal credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub subscription: String,
    pub service_principal: String,
    pub secret: String,
    pub tenant_id: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("subscription", &self.subscription)
            .field("service_principal", &self.service_principal)
            .field("secret", &"****")
            .field("tenant_id", &self.tenant_id)
            .finish()
    }
}

/// Remote-state storage coordinates.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageBackend {
    pub account: String,
    pub access_key: String,
    pub container: String,
}

impl fmt::Debug for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageBackend")
            .field("account", &self.account)
            .field("access_key", &"****")
            .field("container", &self.container)
            .finish()
    }
}

/// Storage settings known before any provisioning happens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageSettings {
    pub account: Option<String>,
    pub access_key: Option<String>,
    pub container: Option<String>,
}

impl StorageSettings {
    /// The full backend, when nothing is left to provision.
    pub fn complete(&self) -> Option<StorageBackend> {
        Some(StorageBackend {
            account: self.account.clone()?,
            access_key: self.access_key.clone()?,
            container: self.container.clone()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionLocations {
    pub west: String,
    pub central: String,
    pub east: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOpsSettings {
    pub ssh_url: String,
    pub url_branch: String,
    pub path: String,
    pub poll_interval: String,
    pub west_path: String,
    pub central_path: String,
    pub east_path: String,
    pub west_branch: String,
    pub central_branch: String,
    pub east_branch: String,
}

/// Fully resolved settings for one environment instance.
#[derive(Debug, Clone)]
pub struct ConfigurationContext {
    pub identity: ClusterIdentity,
    pub kind: EnvironmentKind,
    pub credentials: Credentials,
    pub storage: StorageSettings,
    pub names: ResourceNames,
    /// Whether the primary resource group was supplied by the caller.
    pub resource_group_supplied: bool,
    pub region: String,
    pub regions: RegionLocations,
    pub vnet_name: String,
    pub subnet_name: String,
    pub dns_prefix: String,
    pub keyvault_name: String,
    pub keyvault_resource_group: String,
    pub address_space: String,
    pub subnet_prefix: String,
    pub vm_count: u32,
    pub vm_size: String,
    pub gitops: GitOpsSettings,
}

/// Merges explicit settings, environment variables, imports and defaults.
pub struct ContextResolver<'a> {
    env: &'a dyn EnvSource,
}

impl<'a> ContextResolver<'a> {
    pub fn new(env: &'a dyn EnvSource) -> Self {
        Self { env }
    }

    /// Explicit value if non-empty, otherwise the environment variable.
    fn lookup(&self, explicit: &Option<String>, env_var: &str) -> Option<String> {
        if let Some(value) = non_empty(explicit) {
            return Some(value);
        }
        let value = self.env.var(env_var).filter(|v| !v.trim().is_empty())?;
        debug!("Found {} in the environment", env_var);
        Some(value)
    }

    fn require(
        &self,
        explicit: &Option<String>,
        setting: &'static str,
        env_var: &'static str,
    ) -> CoreResult<String> {
        self.lookup(explicit, env_var)
            .ok_or(CoreError::PrerequisiteMissing { setting, env_var })
    }

    /// Resolve the four service principal settings; all are mandatory.
    pub fn credentials(&self, settings: &Settings) -> CoreResult<Credentials> {
        Ok(Credentials {
            subscription: self.require(&settings.subscription, "subscription", ENV_SUBSCRIPTION)?,
            service_principal: self.require(
                &settings.service_principal,
                "service_principal",
                ENV_CLIENT_ID,
            )?,
            secret: self.require(&settings.secret, "secret", ENV_CLIENT_SECRET)?,
            tenant_id: self.require(&settings.tenant_id, "tenant_id", ENV_TENANT)?,
        })
    }

    /// Storage coordinates: explicit, then environment, then the imported Common backend.
    pub fn storage(&self, settings: &Settings, imported: Option<&CommonOutputs>) -> StorageSettings {
        let inherited = imported.and_then(|c| c.storage.as_ref());
        StorageSettings {
            account: self
                .lookup(&settings.storage_account, ENV_STORAGE_ACCOUNT)
                .or_else(|| inherited.map(|s| s.account.clone())),
            access_key: self
                .lookup(&settings.access_key, ENV_STORAGE_KEY)
                .or_else(|| inherited.map(|s| s.access_key.clone())),
            container: self
                .lookup(&settings.container_name, ENV_CONTAINER)
                .or_else(|| inherited.map(|s| s.container.clone())),
        }
    }

    pub fn resolve(
        &self,
        identity: &ClusterIdentity,
        kind: EnvironmentKind,
        settings: &Settings,
        imported: Option<&CommonOutputs>,
    ) -> CoreResult<ConfigurationContext> {
        let credentials = self.credentials(settings)?;
        let storage = self.storage(settings, imported);

        let mut names = ResourceNames::derive(identity, kind);
        let mut resource_group = non_empty(&settings.resource_group);
        let mut keyvault_group = non_empty(&settings.keyvault_resource_group);
        if kind == EnvironmentKind::Common {
            // Common deploys into its keyvault group.
            resource_group = keyvault_group.clone().or(resource_group);
            keyvault_group = resource_group.clone();
        }
        let resource_group_supplied = resource_group.is_some();
        if let Some(rg) = resource_group {
            names = names.with_resource_group(rg);
        }
        if let Some(account) = &storage.account {
            names = names.with_storage_account(account.clone());
        }
        if let Some(container) = &storage.container {
            names = names.with_storage_container(container.clone());
        }

        let vnet_name = pick(
            &settings.vnet_name,
            imported.map(|c| c.vnet_name.as_str()),
            &names.vnet,
        );
        let subnet_name = pick(
            &settings.subnet_name,
            imported.map(|c| c.subnet_name.as_str()),
            &names.subnet,
        );
        let keyvault_name = pick(
            &settings.keyvault_name,
            imported.map(|c| c.keyvault_name.as_str()),
            &names.keyvault,
        );
        let keyvault_resource_group = pick(
            &keyvault_group,
            imported.map(|c| c.keyvault_resource_group.as_str()),
            &names.keyvault_resource_group,
        );

        let gitops_path = or_default(&settings.gitops_path, defaults::GITOPS_PATH);
        let gitops_branch = or_default(&settings.gitops_url_branch, defaults::GITOPS_URL_BRANCH);
        let gitops = GitOpsSettings {
            ssh_url: or_default(&settings.gitops_ssh_url, defaults::GITOPS_SSH_URL),
            poll_interval: or_default(&settings.gitops_poll_interval, defaults::GITOPS_POLL_INTERVAL),
            west_path: or_default(&settings.gitops_west_path, &gitops_path),
            central_path: or_default(&settings.gitops_central_path, &gitops_path),
            east_path: or_default(&settings.gitops_east_path, &gitops_path),
            west_branch: or_default(&settings.gitops_west_branch, &gitops_branch),
            central_branch: or_default(&settings.gitops_central_branch, &gitops_branch),
            east_branch: or_default(&settings.gitops_east_branch, &gitops_branch),
            path: gitops_path,
            url_branch: gitops_branch,
        };

        let (vm_count, vm_size) = match kind {
            EnvironmentKind::Multiple => (
                defaults::MULTIPLE_VM_COUNT,
                defaults::MULTIPLE_VM_SIZE.to_string(),
            ),
            _ => (
                settings.vm_count.unwrap_or(defaults::VM_COUNT),
                or_default(&settings.vm_size, defaults::VM_SIZE),
            ),
        };

        Ok(ConfigurationContext {
            identity: identity.clone(),
            kind,
            credentials,
            storage,
            resource_group_supplied,
            region: or_default(&settings.region, defaults::REGION),
            regions: RegionLocations {
                west: or_default(&settings.region_west, defaults::REGION_WEST),
                central: or_default(&settings.region_central, defaults::REGION_CENTRAL),
                east: or_default(&settings.region_east, defaults::REGION_EAST),
            },
            vnet_name,
            subnet_name,
            dns_prefix: pick(&settings.dns_prefix, None, &names.dns_prefix),
            keyvault_name,
            keyvault_resource_group,
            address_space: or_default(&settings.address_space, defaults::ADDRESS_SPACE),
            subnet_prefix: or_default(&settings.subnet_prefix, defaults::SUBNET_PREFIX),
            vm_count,
            vm_size,
            gitops,
            names,
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn or_default(value: &Option<String>, default: &str) -> String {
    non_empty(value).unwrap_or_else(|| default.to_string())
}

fn pick(explicit: &Option<String>, imported: Option<&str>, derived: &str) -> String {
    non_empty(explicit)
        .or_else(|| imported.filter(|v| !v.is_empty()).map(str::to_string))
        .unwrap_or_else(|| derived.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn identity() -> ClusterIdentity {
        ClusterIdentity::parse("demo").unwrap()
    }

    fn full_env() -> MapEnv {
        MapEnv::new()
            .with(ENV_SUBSCRIPTION, "sub-env")
            .with(ENV_CLIENT_ID, "sp-env")
            .with(ENV_CLIENT_SECRET, "secret-env")
            .with(ENV_TENANT, "tenant-env")
    }

    #[test]
    fn test_credentials_from_environment() {
        let env = full_env();
        let creds = ContextResolver::new(&env)
            .credentials(&Settings::default())
            .unwrap();
        assert_eq!(creds.subscription, "sub-env");
        assert_eq!(creds.tenant_id, "tenant-env");
    }

    #[test]
    fn test_explicit_beats_environment() {
        let env = full_env();
        let settings = Settings {
            subscription: Some("sub-flag".into()),
            ..Settings::default()
        };
        let creds = ContextResolver::new(&env).credentials(&settings).unwrap();
        assert_eq!(creds.subscription, "sub-flag");
        assert_eq!(creds.service_principal, "sp-env");
    }

    #[test]
    fn test_missing_subscription_is_fatal() {
        let env = MapEnv::new()
            .with(ENV_CLIENT_ID, "sp")
            .with(ENV_CLIENT_SECRET, "s")
            .with(ENV_TENANT, "t");
        let err = ContextResolver::new(&env)
            .credentials(&Settings::default())
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::PrerequisiteMissing { setting: "subscription", env_var: ENV_SUBSCRIPTION }
        ));
    }

    #[test]
    fn test_blank_values_count_as_missing() {
        let env = full_env().with(ENV_TENANT, "  ");
        let settings = Settings {
            tenant_id: Some(String::new()),
            ..Settings::default()
        };
        assert!(ContextResolver::new(&env).credentials(&settings).is_err());
    }

    #[test]
    fn test_defaults_derive_from_identity() {
        let env = full_env();
        let ctx = ContextResolver::new(&env)
            .resolve(&identity(), EnvironmentKind::Simple, &Settings::default(), None)
            .unwrap();
        assert_eq!(ctx.vnet_name, "demo-vnet");
        assert_eq!(ctx.subnet_name, "demo-subnet");
        assert_eq!(ctx.keyvault_name, "demo-kv");
        assert_eq!(ctx.keyvault_resource_group, "demo-kv-rg");
        assert_eq!(ctx.dns_prefix, "demo");
        assert_eq!(ctx.region, "westus2");
        assert_eq!(ctx.vm_count, 3);
        assert_eq!(ctx.gitops.path, "prod");
        assert!(!ctx.resource_group_supplied);
    }

    #[test]
    fn test_imported_values_sit_between_explicit_and_derived() {
        let env = full_env();
        let common = CommonOutputs {
            vnet_name: "shared-vnet".into(),
            subnet_name: "shared-subnet".into(),
            keyvault_name: "shared-kv".into(),
            keyvault_resource_group: "shared-kv-rg".into(),
            storage: Some(StorageBackend {
                account: "sharedstore".into(),
                access_key: "key==".into(),
                container: "shared-container".into(),
            }),
            path: PathBuf::from("/envs/shared/azure-common-infra"),
        };
        let settings = Settings {
            subnet_name: Some("explicit-subnet".into()),
            ..Settings::default()
        };
        let ctx = ContextResolver::new(&env)
            .resolve(&identity(), EnvironmentKind::Keyvault, &settings, Some(&common))
            .unwrap();

        assert_eq!(ctx.vnet_name, "shared-vnet");
        assert_eq!(ctx.subnet_name, "explicit-subnet");
        assert_eq!(ctx.keyvault_name, "shared-kv");
        assert_eq!(ctx.keyvault_resource_group, "shared-kv-rg");
        assert_eq!(ctx.storage.account.as_deref(), Some("sharedstore"));
        assert_eq!(ctx.names.storage_account, "sharedstore");
        assert!(ctx.storage.complete().is_some());
    }

    #[test]
    fn test_storage_environment_beats_import() {
        let env = full_env().with(ENV_STORAGE_ACCOUNT, "envstore");
        let ctx = ContextResolver::new(&env)
            .resolve(&identity(), EnvironmentKind::Common, &Settings::default(), None)
            .unwrap();
        assert_eq!(ctx.storage.account.as_deref(), Some("envstore"));
        assert!(ctx.storage.access_key.is_none());
        assert!(ctx.storage.complete().is_none());
    }

    #[test]
    fn test_resource_group_override() {
        let env = full_env();
        let settings = Settings {
            resource_group: Some("existing-rg".into()),
            ..Settings::default()
        };
        let ctx = ContextResolver::new(&env)
            .resolve(&identity(), EnvironmentKind::Simple, &settings, None)
            .unwrap();
        assert!(ctx.resource_group_supplied);
        assert_eq!(ctx.names.resource_group, "existing-rg");
    }

    #[test]
    fn test_common_resource_group_is_keyvault_group() {
        let env = full_env();
        let settings = Settings {
            resource_group: Some("global-rg".into()),
            ..Settings::default()
        };
        let ctx = ContextResolver::new(&env)
            .resolve(&identity(), EnvironmentKind::Common, &settings, None)
            .unwrap();
        assert!(ctx.resource_group_supplied);
        assert_eq!(ctx.names.resource_group, "global-rg");
        assert_eq!(ctx.keyvault_resource_group, "global-rg");

        let ctx = ContextResolver::new(&env)
            .resolve(&identity(), EnvironmentKind::Common, &Settings::default(), None)
            .unwrap();
        assert!(!ctx.resource_group_supplied);
        assert_eq!(ctx.names.resource_group, ctx.keyvault_resource_group);
    }

    #[test]
    fn test_multiple_uses_fixed_vm_shape_and_regional_gitops() {
        let env = full_env();
        let settings = Settings {
            vm_count: Some(7),
            gitops_path: Some("clusters".into()),
            gitops_east_path: Some("clusters/east".into()),
            ..Settings::default()
        };
        let ctx = ContextResolver::new(&env)
            .resolve(&identity(), EnvironmentKind::Multiple, &settings, None)
            .unwrap();
        assert_eq!(ctx.vm_count, 3);
        assert_eq!(ctx.vm_size, "Standard_D4s_v3");
        assert_eq!(ctx.gitops.west_path, "clusters");
        assert_eq!(ctx.gitops.east_path, "clusters/east");
        assert_eq!(ctx.regions.east, "eastus2");
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds = Credentials {
            subscription: "sub".into(),
            service_principal: "sp".into(),
            secret: "hunter2".into(),
            tenant_id: "tenant".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
