//! # bedrock_iac
//!
//! External collaborators used by the bedrock environment tooling.
//!
//! This crate wraps the command-line tools an environment needs around its
//! generated configuration: Terraform for init/plan/apply, the Azure CLI for
//! resource groups and remote-state storage, and `ssh-keygen` for GitOps
//! deploy keys. Each is reached through a trait so the orchestration can be
//! tested with the recording doubles in [`mock`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use bedrock_iac::{ProvisioningTool, TerraformRunner};
//! use bedrock_runner::ProcessRunner;
//!
//! let terraform = TerraformRunner::new(Arc::new(ProcessRunner::default()));
//! let dir = Path::new("bedrock/cluster/environments/demo/azure-simple");
//! terraform.init(dir, None).unwrap();
//! terraform.plan(dir, Path::new("bedrock-config.tfvars")).unwrap();
//! ```

pub mod azure;
pub mod environment;
pub mod error;
pub mod mock;
pub mod ssh;
pub mod terraform;
pub mod tools;

pub use azure::{AzureCliClient, CloudClient};
pub use environment::EnvironmentKind;
pub use error::{IacError, IacResult};
pub use mock::{CloudCall, MockCloudClient, MockKeyGenerator};
pub use ssh::{KeyGenerator, SshKeygen};
pub use terraform::{ProvisioningTool, TerraformResult, TerraformRunner};
pub use tools::{check_tools, deploy_tools, init_tools};
