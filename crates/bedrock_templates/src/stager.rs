//! Template tree staging.
//!
//! The stager handles:
//! - Source template existence checks
//! - Recursive copy of a template tree into a fresh instance directory
//! - Copying an already generated environment alongside another one
//! - Permission normalization of provisioning-tool state directories

use std::fs;
use std::path::{Path, PathBuf};

use fs_extra::dir::CopyOptions;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{TemplateError, TemplateResult};

/// Result of staging one template tree.
#[derive(Debug, Clone)]
pub struct StageResult {
    /// Directory the template was copied into.
    pub target_path: PathBuf,
    /// Files that were created.
    pub created_files: Vec<PathBuf>,
}

/// Copies a source template tree into a new directory.
pub trait TemplateStager: Send + Sync {
    /// Stage `source` into `target`. The target must not already hold files.
    fn stage(&self, source: &Path, target: &Path) -> TemplateResult<StageResult>;
}

/// Stager backed by the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct DirectoryStager {
    /// Entry names that are never copied.
    skip: Vec<String>,
}

impl DirectoryStager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Never copy entries with this file or directory name.
    pub fn skip(mut self, name: impl Into<String>) -> Self {
        self.skip.push(name.into());
        self
    }

    fn is_skipped(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| self.skip.iter().any(|s| s == n))
    }
}

impl TemplateStager for DirectoryStager {
    fn stage(&self, source: &Path, target: &Path) -> TemplateResult<StageResult> {
        if !source.is_dir() {
            return Err(TemplateError::NotFound(source.to_path_buf()));
        }
        ensure_outside(source, target)?;

        if target.exists() && fs::read_dir(target)?.next().is_some() {
            return Err(TemplateError::AlreadyExists(target.to_path_buf()));
        }

        info!("Staging template {:?} into {:?}", source, target);
        fs::create_dir_all(target)?;

        let mut created_files = Vec::new();
        let walker = WalkDir::new(source)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !self.is_skipped(e.path()));

        for entry in walker {
            let entry = entry?;
            let source_path = entry.path();
            let Ok(relative) = source_path.strip_prefix(source) else {
                continue;
            };
            let target_path = target.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target_path)?;
            } else {
                if let Some(parent) = target_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(source_path, &target_path)?;
                created_files.push(target_path);
            }
        }

        debug!("Copied {} files", created_files.len());
        Ok(StageResult {
            target_path: target.to_path_buf(),
            created_files,
        })
    }
}

/// Copy the directory `source` into `dest_parent`, keeping its name.
///
/// Returns the path of the new copy. An existing copy is left untouched.
pub fn copy_tree_into(source: &Path, dest_parent: &Path) -> TemplateResult<PathBuf> {
    let name = source
        .file_name()
        .ok_or_else(|| TemplateError::NotFound(source.to_path_buf()))?;
    let destination = dest_parent.join(name);

    if !source.is_dir() {
        return Err(TemplateError::NotFound(source.to_path_buf()));
    }
    ensure_outside(source, &destination)?;
    if destination.exists() {
        debug!("{:?} already present, not copying", destination);
        return Ok(destination);
    }

    fs::create_dir_all(dest_parent)?;
    let mut options = CopyOptions::new();
    options.copy_inside = false;
    fs_extra::dir::copy(source, dest_parent, &options)?;

    info!("Copied {:?} to {:?}", source, destination);
    Ok(destination)
}

/// Fail when `target` is `source` itself or any path below it.
fn ensure_outside(source: &Path, target: &Path) -> TemplateResult<()> {
    let template = source.canonicalize()?;
    let target = resolve_path(target)?;
    if target.starts_with(&template) {
        return Err(TemplateError::TargetInsideSource { template, target });
    }
    Ok(())
}

/// Canonical form of a path that may not exist yet.
///
/// The nearest existing ancestor is canonicalized and the missing
/// components are appended to it.
fn resolve_path(path: &Path) -> TemplateResult<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut existing = absolute.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => break,
        }
    }

    let mut resolved = existing.canonicalize()?;
    for name in missing.iter().rev() {
        resolved.push(name);
    }
    Ok(resolved)
}

/// Make every entry under `dir` readable and writable by everyone.
///
/// Returns the number of entries touched.
pub fn normalize_permissions(dir: &Path) -> TemplateResult<usize> {
    let mut touched = 0;
    for entry in WalkDir::new(dir) {
        let entry = entry?;
        set_open_permissions(entry.path())?;
        touched += 1;
    }
    debug!("Normalized permissions on {} entries under {:?}", touched, dir);
    Ok(touched)
}

#[cfg(unix)]
fn set_open_permissions(path: &Path) -> TemplateResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o777))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_open_permissions(path: &Path) -> TemplateResult<()> {
    let mut permissions = fs::metadata(path)?.permissions();
    permissions.set_readonly(false);
    fs::set_permissions(path, permissions)?;
    Ok(())
}
