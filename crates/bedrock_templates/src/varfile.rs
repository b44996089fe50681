//! Variable files in `identifier = "value"` form.
//!
//! Values are always written double-quoted with no escaping. The reader is a
//! line scanner, not a general parser: it splits each line on the first `=`
//! and trims both sides, so it tolerates reordered lines but not multi-line
//! values or comments.

use std::collections::{BTreeMap, HashMap};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tracing::debug;

use crate::error::{TemplateError, TemplateResult};

/// Settings map written to a variable file.
pub type VarMap = BTreeMap<String, String>;

/// Render one assignment per line.
pub fn render_assignments(vars: &VarMap) -> String {
    vars.iter()
        .map(|(key, value)| format!("{} = \"{}\"\n", key, value))
        .collect()
}

/// Write `vars` to a new file at `path`.
///
/// Fails with [`TemplateError::AlreadyExists`] instead of overwriting.
pub fn write_assignments(path: &Path, vars: &VarMap) -> TemplateResult<()> {
    write_new(path, &render_assignments(vars))?;
    debug!("Wrote {} settings to {:?}", vars.len(), path);
    Ok(())
}

/// Create `path` and write `content`, refusing to replace an existing file.
pub(crate) fn write_new(path: &Path, content: &str) -> TemplateResult<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|source| match source.kind() {
            ErrorKind::AlreadyExists => TemplateError::AlreadyExists(path.to_path_buf()),
            _ => TemplateError::Write {
                path: path.to_path_buf(),
                source,
            },
        })?;
    file.write_all(content.as_bytes())
        .map_err(|source| TemplateError::Write {
            path: path.to_path_buf(),
            source,
        })
}

/// Scan `key = value` lines. Values are returned trimmed but still quoted.
pub fn parse_assignments(content: &str) -> HashMap<String, String> {
    let mut assignments = HashMap::new();
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        assignments.insert(key.to_string(), value.trim().to_string());
    }
    assignments
}

/// Strip one pair of surrounding double quotes, if present.
pub fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Read a variable file and return its settings with quotes removed.
pub fn read_assignments(path: &Path) -> TemplateResult<HashMap<String, String>> {
    let content = std::fs::read_to_string(path).map_err(|source| TemplateError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_assignments(&content)
        .into_iter()
        .map(|(k, v)| {
            let v = unquote(&v).to_string();
            (k, v)
        })
        .collect())
}
