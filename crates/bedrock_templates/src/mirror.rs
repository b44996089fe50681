//! TOML mirror of generated settings.
//!
//! The mirror carries the same `key = "value"` pairs in TOML so a generic
//! configuration loader can re-import them later.

use std::path::Path;

use crate::error::{TemplateError, TemplateResult};
use crate::varfile::{write_new, VarMap};

/// Render `vars` as a flat TOML table.
pub fn render_toml_mirror(vars: &VarMap) -> TemplateResult<String> {
    Ok(toml::to_string(vars)?)
}

/// Write the TOML mirror to a new file at `path`.
pub fn write_toml_mirror(path: &Path, vars: &VarMap) -> TemplateResult<()> {
    write_new(path, &render_toml_mirror(vars)?)
}

/// Load a TOML mirror written by [`write_toml_mirror`].
pub fn read_toml_mirror(path: &Path) -> TemplateResult<VarMap> {
    let content = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}
