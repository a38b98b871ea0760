//! Dependency and replacement tables combined from the host and module manifests

use super::{ModFile, ParseMode};
use crate::error::{ManifestError, ManifestResult};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

/// Module paths and replacements a generation run resolves against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CombinedDeps {
    /// Host dependencies first, then the module's, in file order
    pub deps: Vec<String>,
    /// `old module path -> new module path`
    pub replacements: BTreeMap<String, String>,
}

/// Combine the host repository's go.mod with the module's own go.mod.
///
/// The host manifest is parsed strictly and is authoritative for replacements
/// whenever it is given. The module manifest is parsed leniently in that case,
/// since it belongs to a third party. A missing module manifest is not an
/// error and yields the host results alone.
pub fn combined_deps_and_replacements(
    host: Option<&Path>,
    module: &Path,
) -> ManifestResult<CombinedDeps> {
    let host_file = match host {
        Some(path) => Some(ModFile::read(path, ParseMode::Strict).map_err(|source| {
            ManifestError::Host {
                path: path.to_path_buf(),
                source: Box::new(source),
            }
        })?),
        None => None,
    };

    let module_mode = if host_file.is_some() {
        ParseMode::Lax
    } else {
        ParseMode::Strict
    };

    let mut combined = CombinedDeps::default();
    if let Some(host_file) = &host_file {
        combined.deps = host_file.required_paths();
        combined.replacements = host_file.replacements();
    }

    let module_file = match ModFile::read(module, module_mode) {
        Ok(file) => file,
        Err(err) if err.is_not_found() => {
            debug!("module manifest {} not found, using host dependencies only", module.display());
            return Ok(combined);
        }
        Err(source) => {
            return Err(ManifestError::Module {
                path: module.to_path_buf(),
                source: Box::new(source),
            });
        }
    };

    combined.deps.extend(module_file.required_paths());
    if host_file.is_none() {
        combined.replacements = module_file.replacements();
    }
    Ok(combined)
}
