//! Environment scaffolding commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tracing::info;

use bedrock_core::{defaults, Collaborators, Engine, EngineConfig, InitOutcome, ProcessEnv, Settings};
use bedrock_iac::{check_tools, init_tools, AzureCliClient, EnvironmentKind, SshKeygen};
use bedrock_runner::{CommandRunner, ProcessRunner};
use bedrock_templates::DirectoryStager;

use super::GlobalOptions;

/// Flags shared by every environment kind.
#[derive(Args, Debug, Clone, Default)]
pub struct EnvironmentArgs {
    /// Cluster name; a random one is generated when omitted
    #[arg(short = 'n', long)]
    pub cluster_name: Option<String>,

    /// Azure subscription id [env: ARM_SUBSCRIPTION_ID]
    #[arg(long)]
    pub subscription: Option<String>,

    /// Service principal id [env: ARM_CLIENT_ID]
    #[arg(long)]
    pub sp: Option<String>,

    /// Service principal secret [env: ARM_CLIENT_SECRET]
    #[arg(long)]
    pub secret: Option<String>,

    /// Tenant id [env: ARM_TENANT_ID]
    #[arg(long)]
    pub tenant: Option<String>,

    /// Remote-state storage account [env: AZURE_STORAGE_ACCOUNT]
    #[arg(long)]
    pub storage_account: Option<String>,

    /// Remote-state storage access key [env: AZURE_STORAGE_KEY]
    #[arg(long)]
    pub access_key: Option<String>,

    /// Remote-state container [env: AZURE_CONTAINER]
    #[arg(long)]
    pub container_name: Option<String>,

    /// Existing resource group to use instead of creating one
    #[arg(long)]
    pub resource_group: Option<String>,

    #[arg(long)]
    pub region: Option<String>,

    #[arg(long = "vnet")]
    pub vnet_name: Option<String>,

    #[arg(long = "subnet")]
    pub subnet_name: Option<String>,

    #[arg(long)]
    pub dns_prefix: Option<String>,

    #[arg(long = "keyvault")]
    pub keyvault_name: Option<String>,

    #[arg(long = "keyvault-rg")]
    pub keyvault_resource_group: Option<String>,

    #[arg(long)]
    pub address_space: Option<String>,

    #[arg(long)]
    pub subnet_prefix: Option<String>,

    #[arg(long)]
    pub vm_count: Option<u32>,

    #[arg(long)]
    pub vm_size: Option<String>,

    #[arg(long)]
    pub gitops_ssh_url: Option<String>,

    #[arg(long)]
    pub gitops_url_branch: Option<String>,

    #[arg(long)]
    pub gitops_path: Option<String>,

    #[arg(long)]
    pub gitops_poll_interval: Option<String>,

    /// Reuse an existing azure-common-infra directory instead of generating one
    #[arg(long)]
    pub common_infra_path: Option<PathBuf>,

    /// Location of the remote-state storage resource group
    #[arg(long, default_value = defaults::STORAGE_LOCATION)]
    pub storage_location: String,

    /// Generate files only; never create cloud resources
    #[arg(long)]
    pub no_provision: bool,
}

impl EnvironmentArgs {
    pub fn settings(&self) -> Settings {
        Settings {
            subscription: self.subscription.clone(),
            service_principal: self.sp.clone(),
            secret: self.secret.clone(),
            tenant_id: self.tenant.clone(),
            storage_account: self.storage_account.clone(),
            access_key: self.access_key.clone(),
            container_name: self.container_name.clone(),
            resource_group: self.resource_group.clone(),
            region: self.region.clone(),
            vnet_name: self.vnet_name.clone(),
            subnet_name: self.subnet_name.clone(),
            dns_prefix: self.dns_prefix.clone(),
            keyvault_name: self.keyvault_name.clone(),
            keyvault_resource_group: self.keyvault_resource_group.clone(),
            address_space: self.address_space.clone(),
            subnet_prefix: self.subnet_prefix.clone(),
            vm_count: self.vm_count,
            vm_size: self.vm_size.clone(),
            gitops_ssh_url: self.gitops_ssh_url.clone(),
            gitops_url_branch: self.gitops_url_branch.clone(),
            gitops_path: self.gitops_path.clone(),
            gitops_poll_interval: self.gitops_poll_interval.clone(),
            common_infra_path: self.common_infra_path.clone(),
            ..Settings::default()
        }
    }
}

/// Flags for the three-region topology.
#[derive(Args, Debug, Clone, Default)]
pub struct MultipleArgs {
    #[command(flatten)]
    pub common: EnvironmentArgs,

    #[arg(long)]
    pub region_west: Option<String>,

    #[arg(long)]
    pub region_central: Option<String>,

    #[arg(long)]
    pub region_east: Option<String>,

    #[arg(long)]
    pub gitops_west_path: Option<String>,

    #[arg(long)]
    pub gitops_central_path: Option<String>,

    #[arg(long)]
    pub gitops_east_path: Option<String>,

    #[arg(long)]
    pub gitops_west_branch: Option<String>,

    #[arg(long)]
    pub gitops_central_branch: Option<String>,

    #[arg(long)]
    pub gitops_east_branch: Option<String>,
}

impl MultipleArgs {
    pub fn settings(&self) -> Settings {
        Settings {
            region_west: self.region_west.clone(),
            region_central: self.region_central.clone(),
            region_east: self.region_east.clone(),
            gitops_west_path: self.gitops_west_path.clone(),
            gitops_central_path: self.gitops_central_path.clone(),
            gitops_east_path: self.gitops_east_path.clone(),
            gitops_west_branch: self.gitops_west_branch.clone(),
            gitops_central_branch: self.gitops_central_branch.clone(),
            gitops_east_branch: self.gitops_east_branch.clone(),
            ..self.common.settings()
        }
    }
}

pub fn execute(kind: EnvironmentKind, args: EnvironmentArgs, globals: &GlobalOptions) -> Result<()> {
    let settings = args.settings();
    run(kind, &args, settings, globals)
}

pub fn execute_multiple(args: MultipleArgs, globals: &GlobalOptions) -> Result<()> {
    let settings = args.settings();
    run(EnvironmentKind::Multiple, &args.common, settings, globals)
}

fn run(
    kind: EnvironmentKind,
    args: &EnvironmentArgs,
    settings: Settings,
    globals: &GlobalOptions,
) -> Result<()> {
    let config = engine_config(args, globals);
    if globals.dry_run {
        info!("Dry run: no cloud resources will be created");
    }

    let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::default());
    check_tools(runner.as_ref(), &init_tools(config.provision))?;

    let engine = Engine::new(
        config,
        Collaborators {
            stager: Arc::new(DirectoryStager::new()),
            cloud: Arc::new(AzureCliClient::new(runner.clone())),
            keys: Arc::new(SshKeygen::new(runner)),
            env: Arc::new(ProcessEnv),
        },
    );

    let outcome = engine.init(kind, args.cluster_name.as_deref(), &settings)?;
    print_summary(&outcome);
    Ok(())
}

fn engine_config(args: &EnvironmentArgs, globals: &GlobalOptions) -> EngineConfig {
    let config = EngineConfig::new(&globals.root)
        .with_templates_root(&globals.templates)
        .with_storage_location(&args.storage_location);
    if args.no_provision || globals.dry_run {
        config.without_provisioning()
    } else {
        config
    }
}

fn print_summary(outcome: &InitOutcome) {
    println!();
    println!(
        "✅ {} environment '{}' initialized",
        outcome.kind.display_name(),
        outcome.identity
    );
    println!();

    for artifacts in &outcome.artifacts {
        println!("📁 {}", artifacts.dir.display());
        for file in artifacts.files() {
            println!("   {}", file.display());
        }
    }

    if !outcome.created_resources.is_empty() {
        println!();
        println!("☁️  Created resources:");
        for resource in &outcome.created_resources {
            println!("   {}", resource);
        }
    }

    if let Some(target) = outcome.target() {
        println!();
        println!("Next steps:");
        println!("   bedrock simulate {}", target.dir.display());
        println!("   bedrock deploy {}", target.dir.display());
    }
}
