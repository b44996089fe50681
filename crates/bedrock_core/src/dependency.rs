//! Inter-environment dependencies.
//!
//! Keyvault and multi-cluster environments consume the networking and key
//! vault of a Common environment. The graph orders kinds so that Common is
//! always resolved first; the outputs of that resolution are handed to the
//! dependent as [`CommonOutputs`].

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use bedrock_iac::EnvironmentKind;
use bedrock_templates::{copy_tree_into, normalize_permissions, read_assignments, TemplateError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::{Settings, StorageBackend};
use crate::emitter::{BACKEND_FILE, PRIMARY_FILE};
use crate::error::{CoreError, CoreResult};

/// Directory holding the provisioning tool's local state.
pub const STATE_DIR: &str = ".terraform";

/// Ordering constraints between environment kinds.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// kind -> kinds it depends on
    edges: BTreeMap<EnvironmentKind, Vec<EnvironmentKind>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graph of `root` and everything it transitively requires.
    pub fn for_kind(root: EnvironmentKind) -> Self {
        let mut graph = Self::new();
        let mut pending = vec![root];
        let mut seen = HashSet::new();
        while let Some(kind) = pending.pop() {
            if !seen.insert(kind) {
                continue;
            }
            let deps = kind.dependencies().to_vec();
            pending.extend(deps.iter().copied());
            graph.edges.insert(kind, deps);
        }
        graph
    }

    pub fn add_dependency(&mut self, kind: EnvironmentKind, depends_on: EnvironmentKind) {
        self.edges.entry(depends_on).or_default();
        let deps = self.edges.entry(kind).or_default();
        if !deps.contains(&depends_on) {
            deps.push(depends_on);
        }
    }

    pub fn dependencies_of(&self, kind: EnvironmentKind) -> &[EnvironmentKind] {
        self.edges.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Kinds in resolution order, dependencies first, ending with `root`.
    pub fn resolution_order(&self, root: EnvironmentKind) -> CoreResult<Vec<EnvironmentKind>> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut visiting = HashSet::new();
        self.visit(root, &mut order, &mut visited, &mut visiting)?;
        Ok(order)
    }

    fn visit(
        &self,
        kind: EnvironmentKind,
        order: &mut Vec<EnvironmentKind>,
        visited: &mut HashSet<EnvironmentKind>,
        visiting: &mut HashSet<EnvironmentKind>,
    ) -> CoreResult<()> {
        if visited.contains(&kind) {
            return Ok(());
        }
        if !visiting.insert(kind) {
            return Err(CoreError::CircularDependency(kind.to_string()));
        }

        for dep in self.dependencies_of(kind) {
            self.visit(*dep, order, visited, visiting)?;
        }

        visiting.remove(&kind);
        visited.insert(kind);
        order.push(kind);
        Ok(())
    }
}

/// Where a dependent environment gets its Common values from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommonSource {
    /// Generate a fresh Common environment with the same identity.
    Generate,
    /// Import an already generated Common environment.
    Existing(PathBuf),
    /// The caller named the key vault and its group; nothing to resolve.
    Supplied,
}

impl CommonSource {
    pub fn select(kind: EnvironmentKind, settings: &Settings) -> Self {
        if let Some(path) = &settings.common_infra_path {
            return Self::Existing(path.clone());
        }
        let supplied = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        if kind == EnvironmentKind::Multiple
            && supplied(&settings.keyvault_name)
            && supplied(&settings.keyvault_resource_group)
        {
            return Self::Supplied;
        }
        Self::Generate
    }
}

/// Identifiers a dependent environment imports from Common.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonOutputs {
    pub vnet_name: String,
    pub subnet_name: String,
    pub keyvault_name: String,
    pub keyvault_resource_group: String,
    pub storage: Option<StorageBackend>,
    /// Directory of the Common instance.
    pub path: PathBuf,
}

impl CommonOutputs {
    /// Read the identifiers back from a Common primary variable file.
    pub fn from_var_file(path: &Path) -> CoreResult<Self> {
        let vars = read_assignments(path)?;
        let get = |key: &str| {
            vars.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .ok_or_else(|| TemplateError::MissingKey {
                    path: path.to_path_buf(),
                    key: key.to_string(),
                })
        };

        let outputs = Self {
            vnet_name: get("vnet_name")?,
            subnet_name: get("subnet_name")?,
            keyvault_name: get("keyvault_name")?,
            keyvault_resource_group: get("global_resource_group_name")?,
            storage: None,
            path: path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        debug!("Imported Common outputs: {:?}", outputs);
        Ok(outputs)
    }

    /// Read the remote-state coordinates from a Common backend variable file, if present.
    fn storage_from_backend_file(path: &Path) -> CoreResult<Option<StorageBackend>> {
        if !path.is_file() {
            return Ok(None);
        }
        let vars = read_assignments(path)?;
        let field = |key: &str| vars.get(key).filter(|v| !v.is_empty()).cloned();
        Ok(match (
            field("storage_account_name"),
            field("access_key"),
            field("container_name"),
        ) {
            (Some(account), Some(access_key), Some(container)) => Some(StorageBackend {
                account,
                access_key,
                container,
            }),
            _ => None,
        })
    }
}

/// Locate the Common instance directory given either the instance itself or
/// the identity directory containing it.
pub fn locate_common_dir(path: &Path) -> CoreResult<PathBuf> {
    let common_name = EnvironmentKind::Common.as_str();
    let candidates = [path.to_path_buf(), path.join(common_name)];
    candidates
        .into_iter()
        .find(|dir| {
            dir.file_name().and_then(|n| n.to_str()) == Some(common_name)
                && dir.join(PRIMARY_FILE).is_file()
        })
        .ok_or_else(|| TemplateError::NotFound(path.join(common_name).join(PRIMARY_FILE)).into())
}

/// Copy an existing Common environment next to a dependent one and import it.
///
/// `instance_root` is the identity directory of the dependent environment.
pub fn import_existing_common(source: &Path, instance_root: &Path) -> CoreResult<CommonOutputs> {
    let common_dir = locate_common_dir(source)?;
    info!("Copying Common environment from {:?}", common_dir);
    let copied = copy_tree_into(&common_dir, instance_root)?;

    let state_dir = copied.join(STATE_DIR);
    if state_dir.is_dir() {
        normalize_permissions(&state_dir)?;
    } else {
        info!("Provisioning tool has not been initialized for {:?}", copied);
    }

    let mut outputs = CommonOutputs::from_var_file(&copied.join(PRIMARY_FILE))?;
    outputs.storage = CommonOutputs::storage_from_backend_file(&copied.join(BACKEND_FILE))?;
    outputs.path = copied;
    Ok(outputs)
}
