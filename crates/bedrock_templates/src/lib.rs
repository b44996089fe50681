//! # bedrock_templates
//!
//! Template staging and variable-file handling.
//!
//! This crate copies environment template trees into new instance
//! directories and reads and writes the settings files consumed by the
//! provisioning tool:
//!
//! - `identifier = "value"` variable files (writer and line scanner)
//! - TOML mirrors for re-import by a generic configuration loader
//! - Permission normalization for provisioning-tool state directories
//!
//! ## Example
//!
//! ```rust,no_run
//! use bedrock_templates::{DirectoryStager, TemplateStager, VarMap, write_assignments};
//! use std::path::Path;
//!
//! let staged = DirectoryStager::new()
//!     .stage(
//!         Path::new("bedrock/cluster/environments/azure-simple"),
//!         Path::new("bedrock/cluster/environments/demo/azure-simple"),
//!     )
//!     .unwrap();
//!
//! let mut vars = VarMap::new();
//! vars.insert("cluster_name".into(), "demo".into());
//! write_assignments(&staged.target_path.join("bedrock-config.tfvars"), &vars).unwrap();
//! ```

pub mod error;
pub mod mirror;
pub mod stager;
pub mod varfile;

pub use error::{TemplateError, TemplateResult};
pub use mirror::{read_toml_mirror, render_toml_mirror, write_toml_mirror};
pub use stager::{copy_tree_into, normalize_permissions, DirectoryStager, StageResult, TemplateStager};
pub use varfile::{
    parse_assignments, read_assignments, render_assignments, unquote, write_assignments, VarMap,
};
