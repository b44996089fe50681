//! Environment kind definitions.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IacError;

/// The fixed infrastructure topologies that can be scaffolded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EnvironmentKind {
    /// Standalone AKS cluster.
    #[serde(rename = "azure-simple")]
    Simple,
    /// Shared networking and key vault infrastructure.
    #[serde(rename = "azure-common-infra")]
    Common,
    /// AKS cluster wired to the common key vault.
    #[serde(rename = "azure-single-keyvault")]
    Keyvault,
    /// Three regional clusters behind a traffic manager.
    #[serde(rename = "azure-multiple-clusters")]
    Multiple,
}

impl EnvironmentKind {
    /// Name of the source template directory (and of the instance subdirectory).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "azure-simple",
            Self::Common => "azure-common-infra",
            Self::Keyvault => "azure-single-keyvault",
            Self::Multiple => "azure-multiple-clusters",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Simple => "Azure Simple",
            Self::Common => "Azure Common Infra",
            Self::Keyvault => "Azure Single Keyvault",
            Self::Multiple => "Azure Multiple Clusters",
        }
    }

    pub fn all() -> Vec<Self> {
        vec![Self::Simple, Self::Common, Self::Keyvault, Self::Multiple]
    }

    /// Kinds that must be resolved before this one.
    pub fn dependencies(&self) -> &'static [EnvironmentKind] {
        match self {
            Self::Keyvault | Self::Multiple => &[Self::Common],
            Self::Simple | Self::Common => &[],
        }
    }

    /// Whether the provisioning tool keeps its state in remote storage.
    pub fn requires_remote_state(&self) -> bool {
        !matches!(self, Self::Simple)
    }

    /// Whether a TOML mirror of the service principal is emitted.
    pub fn has_mirror(&self) -> bool {
        matches!(self, Self::Common | Self::Multiple)
    }

    /// Whether the cluster needs a GitOps deploy key.
    pub fn needs_deploy_key(&self) -> bool {
        !matches!(self, Self::Common)
    }
}

impl FromStr for EnvironmentKind {
    type Err = IacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "azure-simple" | "simple" => Ok(Self::Simple),
            "azure-common-infra" | "common" => Ok(Self::Common),
            "azure-single-keyvault" | "keyvault" => Ok(Self::Keyvault),
            "azure-multiple-clusters" | "multiple" | "multi" => Ok(Self::Multiple),
            other => Err(IacError::UnknownEnvironment(other.to_string())),
        }
    }
}

impl std::fmt::Display for EnvironmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
