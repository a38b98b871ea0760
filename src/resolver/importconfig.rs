//! `.importconfig` files: compiler import configs annotated with the target
//! that produced them.
//!
//! ```text
//! # please:target //third_party/go:errors
//! packagefile github.com/pkg/errors=plz-out/gen/third_party/go/errors.a
//! ```

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const TARGET_COMMENT: &str = "# please:target ";
const PACKAGE_FILE: &str = "packagefile ";

/// Parsed contents of one import config
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportConfig {
    /// Target that provides every package listed, if annotated
    pub target: Option<String>,
    /// `(import path, archive file)` in file order
    pub packages: Vec<(String, String)>,
}

impl ImportConfig {
    pub fn read(path: &Path) -> io::Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    pub fn parse(data: &str) -> Self {
        let mut config = ImportConfig::default();
        for line in data.lines() {
            let line = line.trim_end();
            if let Some(target) = line.strip_prefix(TARGET_COMMENT) {
                let target = target.trim();
                // Plain labels refer to the host repo from inside a subrepo
                config.target = Some(if target.starts_with("///") {
                    target.to_string()
                } else {
                    format!("@{target}")
                });
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            if let Some(entry) = line.strip_prefix(PACKAGE_FILE) {
                let (import, file) = entry.split_once('=').unwrap_or((entry, ""));
                config
                    .packages
                    .push((import.trim().to_string(), file.trim().to_string()));
            }
        }
        config
    }

    pub fn import_paths(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(|(import, _)| import.as_str())
    }

    /// `import path -> archive file`
    pub fn package_files(&self) -> HashMap<String, String> {
        self.packages.iter().cloned().collect()
    }
}

/// Walk `root` for `*.importconfig` files and collect `import path -> target`
/// for every annotated config.
pub fn harvest_overrides(root: &Path) -> io::Result<HashMap<String, String>> {
    let mut overrides = HashMap::new();
    for path in find_import_configs(root) {
        let config = ImportConfig::read(&path)?;
        let Some(target) = config.target.as_deref() else {
            continue;
        };
        debug!("{} provides {} import(s) via {target}", path.display(), config.packages.len());
        for import in config.import_paths() {
            overrides.insert(import.to_string(), target.to_string());
        }
    }
    Ok(overrides)
}

/// Unreadable entries, including a missing `root`, are skipped
fn find_import_configs(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("skipping while looking for import configs: {e}");
                None
            }
        })
        .filter(|entry| {
            entry.file_type().is_file()
                && entry.path().extension().is_some_and(|ext| ext == "importconfig")
        })
        .map(|entry| entry.into_path())
        .collect()
}
