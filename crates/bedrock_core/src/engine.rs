//! Environment initialization engine.
//!
//! One call to [`Engine::init`] resolves the cluster identity, checks the
//! service principal, then walks the dependency order: each instance is
//! staged from its template, its configuration context is resolved, cloud
//! prerequisites are created, a deploy key is generated and the variable
//! files are emitted. Every step blocks until it has finished.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bedrock_iac::{CloudClient, EnvironmentKind, KeyGenerator};
use bedrock_templates::TemplateStager;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::{defaults, ConfigurationContext, ContextResolver, EnvSource, Settings, StorageBackend};
use crate::dependency::{import_existing_common, CommonOutputs, CommonSource, DependencyGraph};
use crate::emitter::{self, GeneratedArtifactSet};
use crate::error::{CoreError, CoreResult};
use crate::identity::ClusterIdentity;
use crate::ledger::{CreatedResource, ResourceLedger, ResourceType};

pub const DEFAULT_ENVIRONMENTS_ROOT: &str = "bedrock/cluster/environments";

/// Filesystem layout and provisioning policy.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Instances are written to `<environments_root>/<identity>/<kind>/`.
    pub environments_root: PathBuf,
    /// Source templates live at `<templates_root>/<kind>/`.
    pub templates_root: PathBuf,
    /// Create resource groups and remote-state storage through the cloud client.
    pub provision: bool,
    pub storage_location: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENVIRONMENTS_ROOT)
    }
}

impl EngineConfig {
    pub fn new(environments_root: impl Into<PathBuf>) -> Self {
        let environments_root = environments_root.into();
        Self {
            templates_root: environments_root.clone(),
            environments_root,
            provision: true,
            storage_location: defaults::STORAGE_LOCATION.to_string(),
        }
    }

    pub fn with_templates_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.templates_root = root.into();
        self
    }

    pub fn without_provisioning(mut self) -> Self {
        self.provision = false;
        self
    }

    pub fn with_storage_location(mut self, location: impl Into<String>) -> Self {
        self.storage_location = location.into();
        self
    }

    pub fn identity_dir(&self, identity: &ClusterIdentity) -> PathBuf {
        self.environments_root.join(identity.as_str())
    }

    pub fn instance_dir(&self, identity: &ClusterIdentity, kind: EnvironmentKind) -> PathBuf {
        self.identity_dir(identity).join(kind.as_str())
    }

    pub fn template_dir(&self, kind: EnvironmentKind) -> PathBuf {
        self.templates_root.join(kind.as_str())
    }
}

/// External collaborators the engine drives.
#[derive(Clone)]
pub struct Collaborators {
    pub stager: Arc<dyn TemplateStager>,
    pub cloud: Arc<dyn CloudClient>,
    pub keys: Arc<dyn KeyGenerator>,
    pub env: Arc<dyn EnvSource>,
}

/// Result of a successful initialization.
#[derive(Debug, Clone, Serialize)]
pub struct InitOutcome {
    pub identity: ClusterIdentity,
    pub kind: EnvironmentKind,
    /// `<environments_root>/<identity>`
    pub environment_dir: PathBuf,
    /// Artifacts in creation order; dependencies come first.
    pub artifacts: Vec<GeneratedArtifactSet>,
    pub common: Option<CommonOutputs>,
    pub created_resources: Vec<CreatedResource>,
}

impl InitOutcome {
    pub fn artifacts_for(&self, kind: EnvironmentKind) -> Option<&GeneratedArtifactSet> {
        self.artifacts.iter().find(|a| a.kind == kind)
    }

    /// Artifacts of the requested environment itself.
    pub fn target(&self) -> Option<&GeneratedArtifactSet> {
        self.artifacts_for(self.kind)
    }
}

struct Instance {
    artifacts: GeneratedArtifactSet,
    outputs: CommonOutputs,
}

pub struct Engine {
    config: EngineConfig,
    stager: Arc<dyn TemplateStager>,
    cloud: Arc<dyn CloudClient>,
    keys: Arc<dyn KeyGenerator>,
    env: Arc<dyn EnvSource>,
}

impl Engine {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        Self {
            config,
            stager: collaborators.stager,
            cloud: collaborators.cloud,
            keys: collaborators.keys,
            env: collaborators.env,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Initialize an environment of `kind`, generating an identity when none is given.
    pub fn init(
        &self,
        kind: EnvironmentKind,
        identity: Option<&str>,
        settings: &Settings,
    ) -> CoreResult<InitOutcome> {
        let identity = ClusterIdentity::resolve(identity)?;
        info!("Initializing {} environment '{}'", kind, identity);

        // Credentials are checked before anything touches disk or the cloud.
        ContextResolver::new(self.env.as_ref()).credentials(settings)?;

        let order = DependencyGraph::for_kind(kind).resolution_order(kind)?;
        debug!("Resolution order: {:?}", order);

        let mut ledger = ResourceLedger::new();
        match self.run(&identity, kind, &order, settings, &mut ledger) {
            Ok((artifacts, common)) => {
                info!(
                    "To proceed, run 'bedrock simulate {}'",
                    self.config.instance_dir(&identity, kind).display()
                );
                Ok(InitOutcome {
                    environment_dir: self.config.identity_dir(&identity),
                    identity,
                    kind,
                    artifacts,
                    common,
                    created_resources: ledger.into_resources(),
                })
            }
            Err(err) if ledger.is_empty() => Err(err),
            Err(err) => {
                ledger.log_left_behind();
                Err(CoreError::Provisioning {
                    source: Box::new(err),
                    left_behind: ledger.into_resources(),
                })
            }
        }
    }

    fn run(
        &self,
        identity: &ClusterIdentity,
        kind: EnvironmentKind,
        order: &[EnvironmentKind],
        settings: &Settings,
        ledger: &mut ResourceLedger,
    ) -> CoreResult<(Vec<GeneratedArtifactSet>, Option<CommonOutputs>)> {
        let mut artifacts = Vec::new();
        let mut common = None;

        for &step in order {
            if step == kind {
                let instance = self.init_instance(identity, kind, settings, common.as_ref(), ledger)?;
                artifacts.push(instance.artifacts);
            } else if step == EnvironmentKind::Common {
                common = self
                    .resolve_common(identity, kind, settings, &mut artifacts, ledger)
                    .map_err(|source| CoreError::DependencyResolution {
                        kind: step,
                        source: Box::new(source),
                    })?;
            } else {
                let instance = self
                    .init_instance(identity, step, &settings.for_dependency(), None, ledger)
                    .map_err(|source| CoreError::DependencyResolution {
                        kind: step,
                        source: Box::new(source),
                    })?;
                artifacts.push(instance.artifacts);
            }
        }

        Ok((artifacts, common))
    }

    fn resolve_common(
        &self,
        identity: &ClusterIdentity,
        dependent: EnvironmentKind,
        settings: &Settings,
        artifacts: &mut Vec<GeneratedArtifactSet>,
        ledger: &mut ResourceLedger,
    ) -> CoreResult<Option<CommonOutputs>> {
        match CommonSource::select(dependent, settings) {
            CommonSource::Generate => {
                info!("Common Infra path is not set, creating one now");
                let instance = self.init_instance(
                    identity,
                    EnvironmentKind::Common,
                    &settings.for_dependency(),
                    None,
                    ledger,
                )?;
                artifacts.push(instance.artifacts);
                Ok(Some(instance.outputs))
            }
            CommonSource::Existing(path) => {
                let outputs = import_existing_common(&path, &self.config.identity_dir(identity))?;
                info!("Common Infra path is set to {:?}", outputs.path);
                Ok(Some(outputs))
            }
            CommonSource::Supplied => {
                info!("Key vault supplied, not creating a Common environment");
                Ok(None)
            }
        }
    }

    fn init_instance(
        &self,
        identity: &ClusterIdentity,
        kind: EnvironmentKind,
        settings: &Settings,
        imported: Option<&CommonOutputs>,
        ledger: &mut ResourceLedger,
    ) -> CoreResult<Instance> {
        let dir = self.config.instance_dir(identity, kind);
        if dir.exists() {
            return Err(CoreError::EnvironmentExists(dir));
        }

        info!("Creating new environment {:?}", dir);
        self.stager.stage(&self.config.template_dir(kind), &dir)?;

        let ctx = ContextResolver::new(self.env.as_ref()).resolve(identity, kind, settings, imported)?;
        self.prepare_resource_groups(&ctx, ledger)?;

        let backend = if kind.requires_remote_state() {
            Some(self.storage_backend(&ctx, ledger)?)
        } else {
            None
        };

        let ssh_public_key = if kind.needs_deploy_key() {
            self.keys.generate(&dir, defaults::DEPLOY_KEY_NAME)?
        } else {
            String::new()
        };

        let artifacts = emitter::emit(&dir, &ctx, ssh_public_key.trim_end(), backend.as_ref())?;
        info!("{} environment {:?} has been successfully created", kind.display_name(), dir);

        Ok(Instance {
            outputs: outputs_of(&ctx, backend, &dir),
            artifacts,
        })
    }

    /// Verify a supplied resource group and create the derived ones.
    fn prepare_resource_groups(
        &self,
        ctx: &ConfigurationContext,
        ledger: &mut ResourceLedger,
    ) -> CoreResult<()> {
        if !self.config.provision {
            warn!("Provisioning disabled, resource groups for '{}' must already exist", ctx.identity);
            return Ok(());
        }

        let names = &ctx.names;
        if ctx.resource_group_supplied {
            info!("Verifying resource group {}", names.resource_group);
            if !self.cloud.resource_group_exists(&names.resource_group)? {
                return Err(CoreError::ResourceGroupNotFound(names.resource_group.clone()));
            }
        }

        let mut groups: Vec<(&str, &str)> = Vec::new();
        if let Some(regional) = &names.regional {
            groups.push((regional.west.as_str(), ctx.regions.west.as_str()));
            groups.push((regional.central.as_str(), ctx.regions.central.as_str()));
            groups.push((regional.east.as_str(), ctx.regions.east.as_str()));
        }
        if !ctx.resource_group_supplied {
            let location = if names.regional.is_some() {
                ctx.regions.east.as_str()
            } else {
                ctx.region.as_str()
            };
            groups.push((names.resource_group.as_str(), location));
        }

        for (name, location) in groups {
            info!("Creating new resource group: {}", name);
            self.cloud.create_resource_group(name, location)?;
            ledger.record(ResourceType::ResourceGroup, name, None, Some(location));
        }
        Ok(())
    }

    /// Resolve remote-state storage, creating whatever is still missing.
    fn storage_backend(
        &self,
        ctx: &ConfigurationContext,
        ledger: &mut ResourceLedger,
    ) -> CoreResult<StorageBackend> {
        if let Some(backend) = ctx.storage.complete() {
            debug!("Using existing storage backend {}", backend.account);
            return Ok(backend);
        }

        let names = &ctx.names;
        if !self.config.provision {
            warn!(
                "Provisioning disabled, backend settings for '{}' are incomplete",
                ctx.identity
            );
            return Ok(StorageBackend {
                account: names.storage_account.clone(),
                access_key: ctx.storage.access_key.clone().unwrap_or_default(),
                container: names.storage_container.clone(),
            });
        }

        let location = self.config.storage_location.as_str();
        let storage_group = names.storage_resource_group.as_str();
        let account_created = ctx.storage.account.is_none();
        if account_created {
            info!("Creating storage account {}", names.storage_account);
            self.cloud.create_resource_group(storage_group, location)?;
            ledger.record(ResourceType::ResourceGroup, storage_group, None, Some(location));
            self.cloud
                .create_storage_account(&names.storage_account, storage_group, location)?;
            ledger.record(
                ResourceType::StorageAccount,
                &names.storage_account,
                Some(storage_group),
                Some(location),
            );
        }

        let access_key = match &ctx.storage.access_key {
            Some(key) if !account_created => key.clone(),
            // A supplied account lives in a group this tool knows nothing about.
            _ => {
                let group = account_created.then_some(storage_group);
                self.cloud.fetch_storage_key(&names.storage_account, group)?
            }
        };

        if account_created || ctx.storage.container.is_none() {
            info!("Creating storage container {}", names.storage_container);
            self.cloud.create_storage_container(
                &names.storage_container,
                &names.storage_account,
                &access_key,
            )?;
            ledger.record(
                ResourceType::StorageContainer,
                &names.storage_container,
                Some(names.storage_account.as_str()),
                None,
            );
        }

        Ok(StorageBackend {
            account: names.storage_account.clone(),
            access_key: access_key.trim_end().to_string(),
            container: names.storage_container.clone(),
        })
    }
}

fn outputs_of(ctx: &ConfigurationContext, storage: Option<StorageBackend>, dir: &Path) -> CommonOutputs {
    CommonOutputs {
        vnet_name: ctx.vnet_name.clone(),
        subnet_name: ctx.subnet_name.clone(),
        keyvault_name: ctx.keyvault_name.clone(),
        keyvault_resource_group: ctx.keyvault_resource_group.clone(),
        storage,
        path: dir.to_path_buf(),
    }
}
