//! # bedrock_core
//!
//! Environment initialization and configuration generation for bedrock.
//!
//! The engine scaffolds Infrastructure-as-Code environments for four fixed
//! topologies and writes the variable files the provisioning tool consumes.
//!
//! # Architecture
//!
//! - **Identity**: the cluster name every resource name is derived from
//! - **Context**: explicit settings merged with environment variables,
//!   imported Common values and derived defaults
//! - **Naming**: pure derivation of resource names
//! - **Dependency**: ordering of Common before the kinds that need it
//! - **Emitter**: per-kind settings maps written as variable files
//! - **Engine**: drives one initialization end to end
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use bedrock_core::{Collaborators, Engine, EngineConfig, ProcessEnv, Settings};
//! use bedrock_iac::{AzureCliClient, EnvironmentKind, SshKeygen};
//! use bedrock_runner::ProcessRunner;
//! use bedrock_templates::DirectoryStager;
//!
//! let runner = Arc::new(ProcessRunner::default());
//! let engine = Engine::new(
//!     EngineConfig::default(),
//!     Collaborators {
//!         stager: Arc::new(DirectoryStager::new()),
//!         cloud: Arc::new(AzureCliClient::new(runner.clone())),
//!         keys: Arc::new(SshKeygen::new(runner)),
//!         env: Arc::new(ProcessEnv),
//!     },
//! );
//!
//! let outcome = engine.init(EnvironmentKind::Keyvault, Some("demo"), &Settings::default())?;
//! println!("Created {}", outcome.environment_dir.display());
//! ```

pub mod context;
pub mod dependency;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod identity;
pub mod ledger;
pub mod naming;

pub use context::{
    defaults, ConfigurationContext, ContextResolver, Credentials, EnvSource, MapEnv, ProcessEnv,
    Settings, StorageBackend, StorageSettings,
};
pub use dependency::{CommonOutputs, CommonSource, DependencyGraph};
pub use emitter::{GeneratedArtifactSet, BACKEND_FILE, MIRROR_FILE, PRIMARY_FILE};
pub use engine::{Collaborators, Engine, EngineConfig, InitOutcome, DEFAULT_ENVIRONMENTS_ROOT};
pub use error::{CoreError, CoreResult};
pub use identity::{ClusterIdentity, MAX_IDENTITY_LEN};
pub use ledger::{CreatedResource, ResourceLedger, ResourceType};
pub use naming::ResourceNames;
