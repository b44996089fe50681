//! Resource name derivation.
//!
//! Every name is a pure function of the cluster identity and environment
//! kind. Caller overrides replace a derived name and are never recomputed.

use bedrock_iac::EnvironmentKind;
use serde::{Deserialize, Serialize};

use crate::identity::ClusterIdentity;

const STORAGE_ACCOUNT_MIN: usize = 3;
const STORAGE_ACCOUNT_MAX: usize = 24;

/// Per-region resource groups of a multi-cluster environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionalGroups {
    pub west: String,
    pub central: String,
    pub east: String,
    pub traffic_manager: String,
}

/// All names derived for one environment instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceNames {
    pub cluster_name: String,
    /// Primary resource group; the traffic manager group for multi-cluster.
    pub resource_group: String,
    pub regional: Option<RegionalGroups>,
    pub vnet: String,
    pub subnet: String,
    pub dns_prefix: String,
    pub keyvault: String,
    pub keyvault_resource_group: String,
    pub storage_account: String,
    pub storage_resource_group: String,
    pub storage_container: String,
    pub state_key: String,
    pub traffic_manager_profile: String,
}

impl ResourceNames {
    pub fn derive(identity: &ClusterIdentity, kind: EnvironmentKind) -> Self {
        let id = identity.as_str();
        let suffixed = |suffix: &str| format!("{}-{}", id, suffix);

        let regional = matches!(kind, EnvironmentKind::Multiple).then(|| RegionalGroups {
            west: suffixed("west-rg"),
            central: suffixed("central-rg"),
            east: suffixed("east-rg"),
            traffic_manager: suffixed("tm-rg"),
        });

        let resource_group = match kind {
            EnvironmentKind::Common => suffixed("kv-rg"),
            EnvironmentKind::Multiple => suffixed("tm-rg"),
            EnvironmentKind::Simple | EnvironmentKind::Keyvault => suffixed("rg"),
        };

        Self {
            cluster_name: id.to_string(),
            resource_group,
            regional,
            vnet: suffixed("vnet"),
            subnet: suffixed("subnet"),
            dns_prefix: id.to_string(),
            keyvault: suffixed("kv"),
            keyvault_resource_group: suffixed("kv-rg"),
            storage_account: storage_account_name(id),
            storage_resource_group: suffixed("storage-rg"),
            storage_container: suffixed("container"),
            state_key: format!("tfstate-{}-{}", kind.as_str(), id),
            traffic_manager_profile: suffixed("tm"),
        }
    }

    /// Replace the primary resource group.
    pub fn with_resource_group(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if let Some(regional) = self.regional.as_mut() {
            regional.traffic_manager = name.clone();
        }
        self.resource_group = name;
        self
    }

    pub fn with_storage_account(mut self, name: impl Into<String>) -> Self {
        self.storage_account = name.into();
        self
    }

    pub fn with_storage_container(mut self, name: impl Into<String>) -> Self {
        self.storage_container = name.into();
        self
    }

    /// Resource groups the environment deploys into, primary first.
    pub fn resource_groups(&self) -> Vec<&str> {
        match &self.regional {
            Some(r) => vec![
                r.traffic_manager.as_str(),
                r.west.as_str(),
                r.central.as_str(),
                r.east.as_str(),
            ],
            None => vec![self.resource_group.as_str()],
        }
    }
}

/// Storage account name: lowercase alphanumerics, 3 to 24 characters.
pub fn storage_account_name(identity: &str) -> String {
    let mut name: String = identity
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .take(STORAGE_ACCOUNT_MAX)
        .collect();
    while name.len() < STORAGE_ACCOUNT_MIN {
        name.push('0');
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> ClusterIdentity {
        ClusterIdentity::parse(name).unwrap()
    }

    #[test]
    fn test_simple_names() {
        let names = ResourceNames::derive(&id("demo"), EnvironmentKind::Simple);
        assert_eq!(names.resource_group, "demo-rg");
        assert_eq!(names.cluster_name, "demo");
        assert_eq!(names.vnet, "demo-vnet");
        assert_eq!(names.subnet, "demo-subnet");
        assert_eq!(names.keyvault, "demo-kv");
        assert_eq!(names.dns_prefix, "demo");
        assert_eq!(names.state_key, "tfstate-azure-simple-demo");
        assert!(names.regional.is_none());
    }

    #[test]
    fn test_common_uses_keyvault_group() {
        let names = ResourceNames::derive(&id("demo"), EnvironmentKind::Common);
        assert_eq!(names.resource_group, "demo-kv-rg");
        assert_eq!(names.resource_group, names.keyvault_resource_group);
    }

    #[test]
    fn test_multiple_regional_groups() {
        let names = ResourceNames::derive(&id("demo"), EnvironmentKind::Multiple);
        let regional = names.regional.clone().unwrap();
        assert_eq!(regional.west, "demo-west-rg");
        assert_eq!(regional.central, "demo-central-rg");
        assert_eq!(regional.east, "demo-east-rg");
        assert_eq!(regional.traffic_manager, "demo-tm-rg");
        assert_eq!(names.traffic_manager_profile, "demo-tm");
        assert_eq!(names.resource_groups().len(), 4);
    }

    #[test]
    fn test_every_name_shares_prefix() {
        for kind in EnvironmentKind::all() {
            let names = ResourceNames::derive(&id("shared-prefix"), kind);
            for name in [
                &names.resource_group,
                &names.vnet,
                &names.subnet,
                &names.keyvault,
                &names.keyvault_resource_group,
                &names.storage_resource_group,
                &names.storage_container,
            ] {
                assert!(name.starts_with("shared-prefix-"), "{name}");
            }
            assert!(names.storage_account.starts_with("sharedprefix"));
        }
    }

    #[test]
    fn test_derivation_is_stable() {
        for kind in EnvironmentKind::all() {
            let a = ResourceNames::derive(&id("stable-one"), kind);
            let b = ResourceNames::derive(&id("stable-one"), kind);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_storage_account_limits() {
        assert_eq!(storage_account_name("my-demo"), "mydemo");
        assert_eq!(storage_account_name("a"), "a00");
        let long = storage_account_name("abcdefghij-klmnopqrst-uvwxyz12");
        assert_eq!(long.len(), 24);
        assert!(long.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_overrides_win() {
        let names = ResourceNames::derive(&id("demo"), EnvironmentKind::Multiple)
            .with_resource_group("shared-rg")
            .with_storage_account("tfstate01")
            .with_storage_container("states");
        assert_eq!(names.resource_group, "shared-rg");
        assert_eq!(names.regional.unwrap().traffic_manager, "shared-rg");
        assert_eq!(names.storage_account, "tfstate01");
        assert_eq!(names.storage_container, "states");
    }
}
