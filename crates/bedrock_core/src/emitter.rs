//! Variable-file emission.
//!
//! Each environment kind gets its own `identifier = "value"` settings map.
//! Maps are written once into the instance directory; an existing file is
//! never overwritten.

use std::path::{Path, PathBuf};

use bedrock_iac::EnvironmentKind;
use bedrock_templates::{write_assignments, write_toml_mirror, VarMap};
use serde::Serialize;
use tracing::info;

use crate::context::{defaults, ConfigurationContext, StorageBackend};
use crate::error::CoreResult;

pub const PRIMARY_FILE: &str = "bedrock-config.tfvars";
pub const BACKEND_FILE: &str = "bedrock-backend-config.tfvars";
pub const MIRROR_FILE: &str = "bedrock-sp-config.toml";

/// Files generated for one environment instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedArtifactSet {
    pub kind: EnvironmentKind,
    pub dir: PathBuf,
    pub primary: PathBuf,
    pub backend: Option<PathBuf>,
    pub mirror: Option<PathBuf>,
}

impl GeneratedArtifactSet {
    pub fn files(&self) -> Vec<&Path> {
        std::iter::once(self.primary.as_path())
            .chain(self.backend.as_deref())
            .chain(self.mirror.as_deref())
            .collect()
    }
}

struct Builder(VarMap);

impl Builder {
    fn new() -> Self {
        Self(VarMap::new())
    }

    fn set(mut self, key: &str, value: impl ToString) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    fn build(self) -> VarMap {
        self.0
    }
}

/// Settings map for the primary variable file.
pub fn primary_settings(ctx: &ConfigurationContext, ssh_public_key: &str) -> VarMap {
    let creds = &ctx.credentials;
    let gitops = &ctx.gitops;
    let names = &ctx.names;

    match ctx.kind {
        EnvironmentKind::Simple => Builder::new()
            .set("resource_group_name", &names.resource_group)
            .set("cluster_name", &names.cluster_name)
            .set("dns_prefix", &ctx.dns_prefix)
            .set("service_principal_id", &creds.service_principal)
            .set("service_principal_secret", &creds.secret)
            .set("ssh_public_key", ssh_public_key)
            .set("gitops_ssh_url", &gitops.ssh_url)
            .set("gitops_ssh_key", defaults::DEPLOY_KEY_NAME)
            .set("gitops_url_branch", &gitops.url_branch)
            .set("gitops_path", &gitops.path)
            .set("gitops_poll_interval", &gitops.poll_interval)
            .set("vnet_name", &ctx.vnet_name)
            .set("agent_vm_count", ctx.vm_count)
            .build(),

        EnvironmentKind::Common => Builder::new()
            .set("global_resource_group_name", &ctx.keyvault_resource_group)
            .set("global_resource_group_location", &ctx.region)
            .set("keyvault_name", &ctx.keyvault_name)
            .set("service_principal_id", &creds.service_principal)
            .set("service_principal_secret", &creds.secret)
            .set("subscription_id", &creds.subscription)
            .set("tenant_id", &creds.tenant_id)
            .set("address_space", &ctx.address_space)
            .set("subnet_prefix", &ctx.subnet_prefix)
            .set("subnet_name", &ctx.subnet_name)
            .set("vnet_name", &ctx.vnet_name)
            .build(),

        EnvironmentKind::Keyvault => Builder::new()
            .set("resource_group_name", &names.resource_group)
            .set("resource_group_location", &ctx.region)
            .set("cluster_name", &names.cluster_name)
            .set("dns_prefix", &ctx.dns_prefix)
            .set("agent_vm_count", ctx.vm_count)
            .set("agent_vm_size", &ctx.vm_size)
            .set("service_principal_id", &creds.service_principal)
            .set("service_principal_secret", &creds.secret)
            .set("ssh_public_key", ssh_public_key)
            .set("gitops_ssh_url", &gitops.ssh_url)
            .set("gitops_ssh_key", defaults::DEPLOY_KEY_NAME)
            .set("gitops_url_branch", &gitops.url_branch)
            .set("gitops_path", &gitops.path)
            .set("gitops_poll_interval", &gitops.poll_interval)
            .set("keyvault_resource_group", &ctx.keyvault_resource_group)
            .set("keyvault_name", &ctx.keyvault_name)
            .set("vnet_name", &ctx.vnet_name)
            .set("subnet_name", &ctx.subnet_name)
            .set("vnet_subnet_id", subnet_id(ctx))
            .set("address_space", &ctx.address_space)
            .set("subnet_prefixes", &ctx.subnet_prefix)
            .build(),

        EnvironmentKind::Multiple => {
            let builder = Builder::new()
                .set("cluster_name", &names.cluster_name)
                .set("dns_prefix", &ctx.dns_prefix)
                .set("agent_vm_count", ctx.vm_count)
                .set("agent_vm_size", &ctx.vm_size)
                .set("keyvault_resource_group", &ctx.keyvault_resource_group)
                .set("keyvault_name", &ctx.keyvault_name)
                .set("service_principal_id", &creds.service_principal)
                .set("service_principal_secret", &creds.secret)
                .set("ssh_public_key", ssh_public_key)
                .set("gitops_ssh_url", &gitops.ssh_url)
                .set("gitops_ssh_key", defaults::DEPLOY_KEY_NAME)
                .set("gitops_poll_interval", &gitops.poll_interval)
                .set("traffic_manager_profile_name", &names.traffic_manager_profile)
                .set("traffic_manager_dns_name", &names.traffic_manager_profile)
                .set("traffic_manager_resource_group_name", &names.resource_group)
                .set("gitops_west_path", &gitops.west_path)
                .set("gitops_central_path", &gitops.central_path)
                .set("gitops_east_path", &gitops.east_path)
                .set("gitops_west_url_branch", &gitops.west_branch)
                .set("gitops_central_url_branch", &gitops.central_branch)
                .set("gitops_east_url_branch", &gitops.east_branch);
            match &names.regional {
                Some(regional) => builder
                    .set("west_resource_group_name", &regional.west)
                    .set("central_resource_group_name", &regional.central)
                    .set("east_resource_group_name", &regional.east)
                    .build(),
                None => builder.build(),
            }
        }
    }
}

/// Fully qualified id of the Common subnet a keyvault cluster joins.
pub fn subnet_id(ctx: &ConfigurationContext) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.Network/virtualNetworks/{}/subnets/{}",
        ctx.credentials.subscription, ctx.keyvault_resource_group, ctx.vnet_name, ctx.subnet_name
    )
}

/// Remote-state coordinates for the backend variable file.
pub fn backend_settings(ctx: &ConfigurationContext, backend: &StorageBackend) -> VarMap {
    Builder::new()
        .set("storage_account_name", &backend.account)
        .set("access_key", backend.access_key.trim_end())
        .set("container_name", &backend.container)
        .set("key", &ctx.names.state_key)
        .build()
}

/// Service principal values for the TOML mirror.
pub fn mirror_settings(ctx: &ConfigurationContext) -> VarMap {
    let creds = &ctx.credentials;
    Builder::new()
        .set("subscription", &creds.subscription)
        .set("service_principal", &creds.service_principal)
        .set("secret", &creds.secret)
        .set("tenant_id", &creds.tenant_id)
        .build()
}

/// Write every artifact the instance's kind calls for into `dir`.
pub fn emit(
    dir: &Path,
    ctx: &ConfigurationContext,
    ssh_public_key: &str,
    backend: Option<&StorageBackend>,
) -> CoreResult<GeneratedArtifactSet> {
    let primary = dir.join(PRIMARY_FILE);
    info!("Creating config file {:?}", primary);
    write_assignments(&primary, &primary_settings(ctx, ssh_public_key))?;

    let backend = match backend.filter(|_| ctx.kind.requires_remote_state()) {
        Some(storage) => {
            let path = dir.join(BACKEND_FILE);
            write_assignments(&path, &backend_settings(ctx, storage))?;
            Some(path)
        }
        None => None,
    };

    let mirror = if ctx.kind.has_mirror() {
        let path = dir.join(MIRROR_FILE);
        write_toml_mirror(&path, &mirror_settings(ctx))?;
        Some(path)
    } else {
        None
    };

    Ok(GeneratedArtifactSet {
        kind: ctx.kind,
        dir: dir.to_path_buf(),
        primary,
        backend,
        mirror,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextResolver, MapEnv, Settings};
    use crate::dependency::CommonOutputs;
    use crate::identity::ClusterIdentity;
    use bedrock_templates::{read_assignments, read_toml_mirror};
    use tempfile::tempdir;

    const KEY: &str = "ssh-rsa AAAA test";

    fn context(kind: EnvironmentKind, imported: Option<&CommonOutputs>) -> ConfigurationContext {
        let env = MapEnv::new();
        let settings = Settings::with_credentials("sub-1", "sp-1", "secret-1", "tenant-1");
        ContextResolver::new(&env)
            .resolve(&ClusterIdentity::parse("demo").unwrap(), kind, &settings, imported)
            .unwrap()
    }

    fn backend() -> StorageBackend {
        StorageBackend {
            account: "demo".into(),
            access_key: "key==\n".into(),
            container: "demo-container".into(),
        }
    }

    #[test]
    fn test_simple_settings() {
        let map = primary_settings(&context(EnvironmentKind::Simple, None), KEY);
        assert_eq!(map["resource_group_name"], "demo-rg");
        assert_eq!(map["cluster_name"], "demo");
        assert_eq!(map["ssh_public_key"], KEY);
        assert_eq!(map["gitops_ssh_key"], "deploy-key");
        assert_eq!(map["agent_vm_count"], "3");
        assert_eq!(map["gitops_poll_interval"], "5m");
        assert!(!map.contains_key("keyvault_name"));
    }

    #[test]
    fn test_common_settings() {
        let map = primary_settings(&context(EnvironmentKind::Common, None), "");
        assert_eq!(map["global_resource_group_name"], "demo-kv-rg");
        assert_eq!(map["keyvault_name"], "demo-kv");
        assert_eq!(map["vnet_name"], "demo-vnet");
        assert_eq!(map["subnet_name"], "demo-subnet");
        assert_eq!(map["tenant_id"], "tenant-1");
        assert_eq!(map["subscription_id"], "sub-1");
        assert!(!map.contains_key("ssh_public_key"));
    }

    #[test]
    fn test_keyvault_subnet_id_uses_common_values() {
        let common = CommonOutputs {
            vnet_name: "shared-vnet".into(),
            subnet_name: "shared-subnet".into(),
            keyvault_name: "shared-kv".into(),
            keyvault_resource_group: "shared-kv-rg".into(),
            storage: None,
            path: PathBuf::new(),
        };
        let map = primary_settings(&context(EnvironmentKind::Keyvault, Some(&common)), KEY);
        assert_eq!(
            map["vnet_subnet_id"],
            "/subscriptions/sub-1/resourceGroups/shared-kv-rg/providers/Microsoft.Network/virtualNetworks/shared-vnet/subnets/shared-subnet"
        );
        assert_eq!(map["keyvault_name"], "shared-kv");
        assert_eq!(map["resource_group_location"], "westus2");
    }

    #[test]
    fn test_multiple_settings() {
        let map = primary_settings(&context(EnvironmentKind::Multiple, None), KEY);
        assert_eq!(map["agent_vm_count"], "3");
        assert_eq!(map["agent_vm_size"], "Standard_D4s_v3");
        assert_eq!(map["traffic_manager_profile_name"], "demo-tm");
        assert_eq!(map["traffic_manager_resource_group_name"], "demo-tm-rg");
        assert_eq!(map["west_resource_group_name"], "demo-west-rg");
        assert_eq!(map["central_resource_group_name"], "demo-central-rg");
        assert_eq!(map["east_resource_group_name"], "demo-east-rg");
        assert_eq!(map["gitops_east_path"], "prod");
        assert_eq!(map["gitops_west_url_branch"], "master");
    }

    #[test]
    fn test_backend_settings_trim_key() {
        let ctx = context(EnvironmentKind::Keyvault, None);
        let map = backend_settings(&ctx, &backend());
        assert_eq!(map["access_key"], "key==");
        assert_eq!(map["key"], "tfstate-azure-single-keyvault-demo");
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_emit_per_kind_artifacts() {
        let temp = tempdir().unwrap();
        for kind in EnvironmentKind::all() {
            let dir = temp.path().join(kind.as_str());
            std::fs::create_dir_all(&dir).unwrap();
            let ctx = context(kind, None);
            let set = emit(&dir, &ctx, KEY, Some(&backend())).unwrap();

            assert!(set.primary.is_file());
            assert_eq!(set.backend.is_some(), kind.requires_remote_state());
            assert_eq!(set.mirror.is_some(), kind.has_mirror());
            for file in set.files() {
                assert!(file.is_file());
            }
        }
    }

    #[test]
    fn test_emitted_files_read_back() {
        let temp = tempdir().unwrap();
        let ctx = context(EnvironmentKind::Common, None);
        let set = emit(temp.path(), &ctx, "", Some(&backend())).unwrap();

        let primary = read_assignments(&set.primary).unwrap();
        assert_eq!(primary["keyvault_name"], "demo-kv");
        let backend = read_assignments(set.backend.as_ref().unwrap()).unwrap();
        assert_eq!(backend["container_name"], "demo-container");
        let mirror = read_toml_mirror(set.mirror.as_ref().unwrap()).unwrap();
        assert_eq!(mirror["tenant_id"], "tenant-1");
    }

    #[test]
    fn test_emit_never_overwrites() {
        let temp = tempdir().unwrap();
        let ctx = context(EnvironmentKind::Simple, None);
        emit(temp.path(), &ctx, KEY, None).unwrap();
        assert!(emit(temp.path(), &ctx, KEY, None).is_err());
    }
}
