//! Sidecar path rewriting and root package detection

use crate::error::DriverResult;
use crate::packageinfo::Package;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Turns the repo-relative paths in sidecars into absolute paths.
///
/// Build actions cannot know where their inputs will end up, so each file is
/// probed in the repository itself, then the subrepo output area, and
/// otherwise assumed to be generated output.
pub struct PathRewriter {
    root: PathBuf,
    subrepo_dir: PathBuf,
    gen_dir: PathBuf,
}

impl PathRewriter {
    pub fn new(root: impl Into<PathBuf>, subrepo_dir: &Path, gen_dir: &Path) -> Self {
        let root = root.into();
        Self {
            subrepo_dir: root.join(subrepo_dir),
            gen_dir: root.join(gen_dir),
            root,
        }
    }

    pub fn rewrite(&self, file: &str) -> String {
        if Path::new(file).is_absolute() {
            return file.to_string();
        }
        let located = [&self.root, &self.subrepo_dir]
            .into_iter()
            .map(|base| base.join(file))
            .find(|candidate| candidate.symlink_metadata().is_ok())
            .unwrap_or_else(|| self.gen_dir.join(file));
        located.to_string_lossy().into_owned()
    }

    /// Rewrite a package's files and export file in place
    pub fn rewrite_package(&self, pkg: &mut Package) -> DriverResult<()> {
        for file in pkg.go_files.iter_mut().chain(pkg.other_files.iter_mut()) {
            *file = self.rewrite(file);
        }
        pkg.compiled_go_files = pkg.go_files.clone();
        if let Some(export) = pkg.export()? {
            pkg.export_file = self.rewrite(&export.repo_path);
        }
        Ok(())
    }

    /// Repository-relative form of a rewritten path, with the output areas
    /// stripped again
    fn relative<'a>(&self, file: &'a str) -> &'a str {
        let path = Path::new(file);
        for base in [&self.gen_dir, &self.subrepo_dir, &self.root] {
            if let Ok(rel) = path.strip_prefix(base) {
                return rel.to_str().unwrap_or(file);
            }
        }
        file
    }

    /// IDs of the packages that were asked for, first seen first.
    ///
    /// A package is a root when one of its Go files lives in a requested
    /// directory, or when its import path is one of those directories.
    pub fn detect_roots(&self, pkgs: &[Package], dirs: &BTreeSet<String>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut roots = Vec::new();
        for pkg in pkgs {
            let requested = dirs.contains(&pkg.pkg_path)
                || pkg
                    .go_files
                    .iter()
                    .any(|file| dirs.contains(parent_dir(self.relative(file))));
            if requested && seen.insert(pkg.id.as_str()) {
                roots.push(pkg.id.clone());
            }
        }
        roots
    }
}

/// Directory part of a slash-separated path, empty at the top level
pub fn parent_dir(file: &str) -> &str {
    file.rsplit_once('/').map_or("", |(dir, _)| dir)
}
