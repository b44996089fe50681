//! Error types for the core module.

use std::path::PathBuf;

use bedrock_iac::{EnvironmentKind, IacError};
use bedrock_templates::TemplateError;
use thiserror::Error;

use crate::ledger::CreatedResource;

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while initializing an environment.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Missing required setting '{setting}': pass it explicitly or set {env_var}")]
    PrerequisiteMissing {
        setting: &'static str,
        env_var: &'static str,
    },

    #[error("Invalid cluster name '{name}': {reason}")]
    InvalidIdentity { name: String, reason: String },

    #[error("External tool failure: {0}")]
    ExternalTool(#[from] IacError),

    #[error("File error: {0}")]
    Template(#[from] TemplateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to resolve {kind} dependency: {source}")]
    DependencyResolution {
        kind: EnvironmentKind,
        #[source]
        source: Box<CoreError>,
    },

    #[error("Circular dependency detected involving: {0}")]
    CircularDependency(String),

    #[error("Resource group not found: {0}")]
    ResourceGroupNotFound(String),

    #[error("Environment already exists at {0}")]
    EnvironmentExists(PathBuf),

    #[error("{source} ({} created resource(s) left behind)", .left_behind.len())]
    Provisioning {
        #[source]
        source: Box<CoreError>,
        left_behind: Vec<CreatedResource>,
    },
}

impl CoreError {
    /// The innermost error, looking through dependency and provisioning wrappers.
    pub fn root_cause(&self) -> &CoreError {
        match self {
            Self::DependencyResolution { source, .. } | Self::Provisioning { source, .. } => {
                source.root_cause()
            }
            other => other,
        }
    }

    /// Whether the failure was caused by caller input rather than the environment.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::PrerequisiteMissing { .. }
                | Self::InvalidIdentity { .. }
                | Self::ResourceGroupNotFound(_)
                | Self::EnvironmentExists(_)
        )
    }
}
