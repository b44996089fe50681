//! Error types for IaC module.

use thiserror::Error;

/// Result type alias for IaC operations.
pub type IacResult<T> = Result<T, IacError>;

/// Errors that can occur while driving external IaC collaborators.
#[derive(Error, Debug)]
pub enum IacError {
    #[error("Unknown environment: {0}")]
    UnknownEnvironment(String),

    #[error("Terraform init failed: {0}")]
    InitFailed(String),

    #[error("Terraform plan failed: {0}")]
    PlanFailed(String),

    #[error("Terraform apply failed: {0}")]
    ApplyFailed(String),

    #[error("Cloud provider error: {0}")]
    CloudProvider(String),

    #[error("Unexpected cloud provider output: {0}")]
    UnexpectedOutput(String),

    #[error("SSH key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Runner error: {0}")]
    Runner(#[from] bedrock_runner::RunnerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
