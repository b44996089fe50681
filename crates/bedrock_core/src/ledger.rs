//! Record of cloud resources created during one initialization.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    ResourceGroup,
    StorageAccount,
    StorageContainer,
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ResourceGroup => "resource group",
            Self::StorageAccount => "storage account",
            Self::StorageContainer => "storage container",
        };
        f.write_str(s)
    }
}

/// A resource that now exists because of this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedResource {
    pub resource_type: ResourceType,
    pub name: String,
    /// Resource group or storage account the resource lives in.
    pub parent: Option<String>,
    pub location: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for CreatedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.resource_type, self.name)?;
        if let Some(parent) = &self.parent {
            write!(f, " in {}", parent)?;
        }
        if let Some(location) = &self.location {
            write!(f, " ({})", location)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ResourceLedger {
    resources: Vec<CreatedResource>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        resource_type: ResourceType,
        name: impl Into<String>,
        parent: Option<&str>,
        location: Option<&str>,
    ) {
        self.resources.push(CreatedResource {
            resource_type,
            name: name.into(),
            parent: parent.map(str::to_string),
            location: location.map(str::to_string),
            created_at: Utc::now(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn resources(&self) -> &[CreatedResource] {
        &self.resources
    }

    /// Warn about every recorded resource; nothing is deprovisioned.
    pub fn log_left_behind(&self) {
        for resource in &self.resources {
            warn!("Left behind: {}", resource);
        }
    }

    pub fn into_resources(self) -> Vec<CreatedResource> {
        self.resources
    }
}
