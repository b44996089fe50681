//! CLI command definitions and handlers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use bedrock_core::DEFAULT_ENVIRONMENTS_ROOT;

pub mod environment;
pub mod provision;

/// bedrock - scaffold and deploy Kubernetes cluster environments on Azure
#[derive(Parser)]
#[command(name = "bedrock")]
#[command(author, version, about)]
#[command(propagate_version = true)]
#[command(
    long_about = "bedrock generates Terraform configuration for four fixed cluster topologies.

Workflows:
  1. bedrock azure-simple --cluster-name demo        Scaffold a single cluster
  2. bedrock azure-single-keyvault                   Scaffold a cluster plus its shared Common infrastructure
  3. bedrock simulate <dir>                          terraform init + plan
  4. bedrock deploy <dir>                            terraform init + apply

Credentials default to ARM_SUBSCRIPTION_ID, ARM_CLIENT_ID, ARM_CLIENT_SECRET and ARM_TENANT_ID.

Exit codes:
  0  Success
  1  General error
  2  Invalid arguments or missing prerequisites
  5  IaC error"
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory instances are generated under
    #[arg(long, global = true, env = "BEDROCK_ROOT", default_value = DEFAULT_ENVIRONMENTS_ROOT)]
    pub root: PathBuf,

    /// Directory holding the environment templates (defaults to --root)
    #[arg(long, global = true, env = "BEDROCK_TEMPLATES")]
    pub templates: Option<PathBuf>,

    /// Print provisioning commands instead of running them
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn globals(&self) -> GlobalOptions {
        GlobalOptions {
            root: self.root.clone(),
            templates: self.templates.clone().unwrap_or_else(|| self.root.clone()),
            dry_run: self.dry_run,
        }
    }
}

/// Options shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    pub root: PathBuf,
    pub templates: PathBuf,
    pub dry_run: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scaffold a single AKS cluster
    AzureSimple(environment::EnvironmentArgs),

    /// Scaffold the shared network, keyvault and state storage
    AzureCommonInfra(environment::EnvironmentArgs),

    /// Scaffold a single cluster backed by Common infrastructure
    AzureSingleKeyvault(environment::EnvironmentArgs),

    /// Scaffold three regional clusters behind a traffic manager
    AzureMultipleClusters(environment::MultipleArgs),

    /// Run terraform init and plan on a generated environment
    Simulate(provision::ProvisionArgs),

    /// Run terraform init and apply on a generated environment
    Deploy(provision::ProvisionArgs),
}
