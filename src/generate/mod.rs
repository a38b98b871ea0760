//! BUILD file generation for Go modules
//!
//! [`Generator::generate`] turns a downloaded module into a subrepo: it reads
//! the module manifests, writes a `.plzconfig` descriptor, walks the source
//! tree writing one rule per package and finally exposes the requested
//! install set through an `installs` filegroup in the root build file.
//! [`Generator::update`] refreshes rules in an existing tree.

pub mod draft;
pub mod update;

pub use draft::{LIBRARY_KINDS, PRIMARY_KINDS, RuleDraft, RuleKind, order_linker_flags};

use crate::buildfile::{BuildFile, Call, Expr, Stmt};
use crate::config::Settings;
use crate::error::{GenerateError, GenerateResult};
use crate::gopkg::{BuildContext, Package};
use crate::modfile::combined_deps_and_replacements;
use crate::resolver::{
    ImportTargetResolver, build_target, harvest_overrides, name_for_lib_in_pkg,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Everything a generation run needs to know about the module
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Root of the module's source tree
    pub src_root: PathBuf,
    /// Module path, e.g. `github.com/stretchr/testify`
    pub module: String,
    pub version: Option<String>,
    /// go.mod of the host repository, authoritative for replace directives
    pub host_mod_file: Option<PathBuf>,
    pub third_party_folder: String,
    pub build_file_names: Vec<String>,
    /// Modules known in addition to the manifests' requirements
    pub module_deps: Vec<String>,
    /// Packages exposed by the `installs` filegroup; `dir/...` for a subtree
    pub install: Vec<String>,
    pub labels: Vec<String>,
    pub plugin_target: String,
    /// Root searched for `.importconfig` override files
    pub import_config_root: PathBuf,
}

impl GenerateOptions {
    /// Options seeded from settings; the caller fills in the module specifics
    pub fn from_settings(settings: &Settings, src_root: impl Into<PathBuf>, module: impl Into<String>) -> Self {
        Self {
            src_root: src_root.into(),
            module: module.into(),
            version: None,
            host_mod_file: None,
            third_party_folder: settings.generate.third_party_folder.clone(),
            build_file_names: settings.generate.build_file_names.clone(),
            module_deps: Vec::new(),
            install: Vec::new(),
            labels: settings.generate.labels.clone(),
            plugin_target: settings.generate.plugin_target.clone(),
            import_config_root: settings.generate.import_config_root.clone(),
        }
    }

    /// `module@version`, or the bare module without a version
    pub fn module_arg(&self) -> String {
        match &self.version {
            Some(version) if !version.is_empty() => format!("{}@{version}", self.module),
            _ => self.module.clone(),
        }
    }
}

pub struct Generator {
    options: GenerateOptions,
    context: BuildContext,
    resolver: ImportTargetResolver,
}

impl Generator {
    pub fn new(options: GenerateOptions, context: BuildContext) -> Self {
        let resolver = ImportTargetResolver::new(&options.module, &options.third_party_folder)
            .with_modules(options.module_deps.iter().cloned());
        Self {
            options,
            context,
            resolver,
        }
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub fn resolver(&self) -> &ImportTargetResolver {
        &self.resolver
    }

    /// Generate build files for the whole module
    pub fn generate(&mut self) -> GenerateResult<()> {
        self.load_manifests()?;
        self.write_config()?;
        self.generate_all()?;
        self.write_install_filegroup()
    }

    /// Rebuild the resolver from the go.mod manifests and `.importconfig`
    /// overrides
    pub fn load_manifests(&mut self) -> GenerateResult<()> {
        let module_mod = self.options.src_root.join("go.mod");
        let combined =
            combined_deps_and_replacements(self.options.host_mod_file.as_deref(), &module_mod)?;
        debug!(
            "{} dependencies and {} replacements from go.mod",
            combined.deps.len(),
            combined.replacements.len()
        );

        let root = &self.options.import_config_root;
        let overrides = harvest_overrides(root).map_err(|e| GenerateError::io(root, e))?;
        self.resolver = ImportTargetResolver::new(&self.options.module, &self.options.third_party_folder)
            .with_modules(self.options.module_deps.iter().cloned().chain(combined.deps))
            .with_replacements(combined.replacements)
            .with_overrides(overrides);
        Ok(())
    }

    /// Write the `.plzconfig` descriptor at the module root
    pub fn write_config(&self) -> GenerateResult<()> {
        let mut config = String::new();
        // Writing to a String cannot fail
        let _ = writeln!(config, "[Plugin \"go\"]");
        let _ = writeln!(config, "Target={}", self.options.plugin_target);
        let _ = writeln!(config, "ImportPath={}", self.options.module);
        for tag in &self.context.build_tags {
            let _ = writeln!(config, "BuildTags={tag}");
        }
        let path = self.options.src_root.join(".plzconfig");
        std::fs::write(&path, config).map_err(|e| GenerateError::io(path, e))
    }

    fn generate_all(&self) -> GenerateResult<()> {
        let root = &self.options.src_root;
        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if !entry.file_type().is_dir() || entry.depth() == 0 {
                    return true;
                }
                let name = entry.file_name().to_string_lossy();
                name != "testdata" && !name.starts_with('_')
            });

        for entry in walker {
            let entry = entry.map_err(|e| GenerateError::Walk {
                path: root.clone(),
                reason: e.to_string(),
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let package = self.package_dir(entry.path());
            match self.generate_package(&package) {
                Err(GenerateError::Import(e)) if e.is_no_go() => {
                    debug!("skipping {}: {e}", entry.path().display());
                }
                other => other?,
            }
        }
        Ok(())
    }

    /// Import the package at `package` (relative to the module root) and
    /// write its rule
    pub fn generate_package(&self, package: &str) -> GenerateResult<()> {
        let pkg = self.import_package(package)?;
        let Some(draft) = self.library_draft(&pkg, package) else {
            debug!("{package}: no library sources");
            return Ok(());
        };
        self.write_package_build_file(package, &draft, &pkg.archive_files)
    }

    fn import_package(&self, package: &str) -> GenerateResult<Package> {
        Ok(self.context.import_dir(&self.pkg_dir(package))?)
    }

    pub(crate) fn library_draft(&self, pkg: &Package, package: &str) -> Option<RuleDraft> {
        let name = name_for_lib_in_pkg(&self.options.module, package);
        RuleDraft::library(pkg, name, &self.options.module_arg(), &self.resolver)
    }

    /// Merge the rule for `draft` into the package's build file
    fn write_package_build_file(
        &self,
        package: &str,
        draft: &RuleDraft,
        archives: &[String],
    ) -> GenerateResult<()> {
        let dir = self.pkg_dir(package);
        let mut file = BuildFile::load_or_create(&dir, &self.options.build_file_names)?;

        file.ensure_first(Stmt::expr(Expr::call(
            "subinclude",
            vec![Expr::string(draft.kind.subinclude())],
        )));

        let existing = file.rules_of_kind(PRIMARY_KINDS).count();
        if existing > 1 {
            return Err(GenerateError::TooManyPrimaryRules {
                path: file.path.clone(),
                kind: draft.kind.to_string(),
            });
        }
        if existing == 0 {
            file.push_rule(Call::rule(draft.kind.as_str(), &draft.name));
        }
        if let Some(rule) = file.rules_mut().find(|r| is_primary(r)) {
            rule.set_kind(draft.kind.as_str());
            rule.set_attr("name", Expr::string(&draft.name));
            draft.populate(rule);
            self.decorate(rule, draft.kind);
        }

        if !archives.is_empty() {
            let srcs = Expr::string_list(archives.iter().cloned());
            match file.rule_mut("a_files") {
                Some(group) => group.set_attr("srcs", srcs),
                None => {
                    let mut group = Call::rule("filegroup", "a_files");
                    group.set_attr("srcs", srcs);
                    file.push_rule(group);
                }
            }
        }

        file.save()?;
        info!("wrote {}", file.path.display());
        Ok(())
    }

    /// Attributes every generated primary rule carries
    fn decorate(&self, rule: &mut Call, kind: RuleKind) {
        rule.set_attr("visibility", Expr::string_list(["PUBLIC"]));
        rule.set_string_list("labels", &self.options.labels);
        if kind == RuleKind::GoLibrary {
            rule.set_attr("cover", Expr::ident("False"));
        } else {
            rule.del_attr("cover");
        }
    }

    /// Add or refresh the `installs` filegroup in the root build file
    fn write_install_filegroup(&self) -> GenerateResult<()> {
        let targets = self.install_targets()?;
        let mut file =
            BuildFile::load_or_create(&self.options.src_root, &self.options.build_file_names)?;

        let exported = Expr::string_list(targets);
        match file.rule_mut("installs") {
            Some(rule) => rule.set_attr("exported_deps", exported),
            None => {
                let mut rule = Call::rule("filegroup", "installs");
                rule.set_attr("exported_deps", exported);
                file.push_rule(rule);
            }
        }
        if let Some(rule) = file.rule_mut("installs") {
            rule.set_attr("visibility", Expr::string_list(["PUBLIC"]));
        }
        file.save()?;
        Ok(())
    }

    /// Library targets for the install patterns, in pattern order
    pub fn install_targets(&self) -> GenerateResult<Vec<String>> {
        let mut targets = Vec::new();
        for pattern in &self.options.install {
            if let Some(subtree) = subtree_pattern(pattern) {
                targets.extend(self.targets_in_dir(subtree)?);
                continue;
            }
            match self.lib_target_for_package(pattern)? {
                Some(target) => targets.push(target),
                None => {
                    return Err(GenerateError::InstallNotFound {
                        pattern: pattern.clone(),
                    });
                }
            }
        }
        Ok(targets)
    }

    fn targets_in_dir(&self, subtree: &str) -> GenerateResult<Vec<String>> {
        let dir = self.options.src_root.join(subtree);
        let mut targets = Vec::new();
        for entry in WalkDir::new(&dir).sort_by_file_name() {
            let entry = entry.map_err(|e| GenerateError::Walk {
                path: dir.clone(),
                reason: e.to_string(),
            })?;
            if entry.file_type().is_file() && self.is_build_file(entry.path()) {
                if let Some(target) = self.lib_target_for_build_file(entry.path())? {
                    targets.push(target);
                }
            }
        }
        Ok(targets)
    }

    fn lib_target_for_package(&self, package: &str) -> GenerateResult<Option<String>> {
        let dir = self.options.src_root.join(package);
        match BuildFile::find(&dir, &self.options.build_file_names) {
            Some(path) => self.lib_target_for_build_file(&path),
            None => Ok(None),
        }
    }

    /// The library target declared in a build file; more than one is an error
    fn lib_target_for_build_file(&self, path: &Path) -> GenerateResult<Option<String>> {
        let file = BuildFile::load(path)?;
        let libs: Vec<&Call> = file.rules_of_kind(LIBRARY_KINDS).collect();
        match libs.as_slice() {
            [] => Ok(None),
            [lib] => {
                let package = path
                    .parent()
                    .map(|dir| self.package_dir(dir))
                    .unwrap_or_default();
                Ok(lib.name().map(|name| build_target(name, &package, "")))
            }
            _ => Err(GenerateError::TooManyLibraries {
                path: path.to_path_buf(),
            }),
        }
    }

    pub(crate) fn is_build_file(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| self.options.build_file_names.iter().any(|n| n == name))
    }

    /// Filesystem directory of a module-relative package path
    pub(crate) fn pkg_dir(&self, package: &str) -> PathBuf {
        if package.is_empty() {
            self.options.src_root.clone()
        } else {
            self.options.src_root.join(package)
        }
    }

    /// Module-relative package path (`/`-separated) of a directory in the tree
    pub(crate) fn package_dir(&self, dir: &Path) -> String {
        let relative = dir.strip_prefix(&self.options.src_root).unwrap_or(dir);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .filter(|c| c != ".")
            .collect::<Vec<_>>()
            .join("/")
    }
}

fn is_primary(rule: &Call) -> bool {
    rule.kind().is_some_and(|k| PRIMARY_KINDS.contains(&k))
}

/// `dir/...` (or `...`) names the subtree at `dir`
fn subtree_pattern(pattern: &str) -> Option<&str> {
    if pattern == "..." || pattern == "./..." {
        return Some("");
    }
    pattern.strip_suffix("/...")
}
