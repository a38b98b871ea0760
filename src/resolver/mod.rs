//! Import-target resolution
//!
//! Maps a Go import path to the build target that provides it. Resolution is
//! best effort: imports that belong to no known module (the standard library,
//! or modules that have not been generated yet) resolve to `None` and the
//! caller simply leaves the dependency out.
//!
//! Order of precedence for an import path:
//! 1. the memo table
//! 2. explicit overrides harvested from `.importconfig` files
//! 3. replace directives, followed transitively
//! 4. the longest known module path owning the import

pub mod importconfig;
pub mod memo;
pub mod target;

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, trace, warn};

pub use importconfig::{ImportConfig, harvest_overrides};
pub use memo::ResolutionMemo;
pub use target::{
    TargetLabel, build_target, has_path_prefix, name_for_lib_in_pkg, subrepo_name, trim_path,
};

/// Resolver for one generation or load run.
pub struct ImportTargetResolver {
    module: String,
    third_party_folder: String,
    /// Declared dependencies followed by the module itself
    modules: Vec<String>,
    replacements: BTreeMap<String, String>,
    overrides: HashMap<String, String>,
    memo: ResolutionMemo<String>,
}

impl ImportTargetResolver {
    /// Resolver for `module`, whose dependencies live as subrepos under
    /// `third_party_folder`
    pub fn new(module: impl Into<String>, third_party_folder: impl Into<String>) -> Self {
        let module = module.into();
        Self {
            modules: vec![module.clone()],
            module,
            third_party_folder: third_party_folder.into(),
            replacements: BTreeMap::new(),
            overrides: HashMap::new(),
            memo: ResolutionMemo::new(),
        }
    }

    /// Add known module paths, kept ahead of the module itself
    pub fn with_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let own = self.modules.pop();
        self.modules.extend(modules.into_iter().map(Into::into));
        self.modules.extend(own);
        self
    }

    pub fn with_replacements(mut self, replacements: BTreeMap<String, String>) -> Self {
        self.replacements = replacements;
        self
    }

    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn add_override(&mut self, import_path: impl Into<String>, target: impl Into<String>) {
        self.overrides.insert(import_path.into(), target.into());
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// Number of memoised import paths
    pub fn cached(&self) -> usize {
        self.memo.len()
    }

    /// Target providing `import_path`, or `None` when no known module owns it
    pub fn resolve(&self, import_path: &str) -> Option<String> {
        if let Some(target) = self.memo.get(import_path) {
            return Some(target);
        }

        let mut visited = HashSet::new();
        let target = self.resolve_uncached(import_path, None, &mut visited)?;
        trace!("resolved {import_path} to {target}");
        Some(self.memo.insert(import_path, target))
    }

    /// Resolve every import, dropping the ones that have no target
    pub fn resolve_all<'a, I>(&self, imports: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        imports
            .into_iter()
            .filter_map(|import| {
                let target = self.resolve(import);
                if target.is_none() {
                    debug!("no target for import {import}, assuming it is provided by the SDK");
                }
                target
            })
            .collect()
    }

    /// Library target for `package` (relative to this module), local to the
    /// module's own repo
    pub fn local_target(&self, package: &str) -> String {
        build_target(&name_for_lib_in_pkg(&self.module, package), package, "")
    }

    // `replaced_module` is the module a replace directive pointed at, which
    // owns the path even when it is not a declared dependency.
    fn resolve_uncached(
        &self,
        import_path: &str,
        replaced_module: Option<&str>,
        visited: &mut HashSet<String>,
    ) -> Option<String> {
        if !visited.insert(import_path.to_string()) {
            warn!("replace directives form a cycle through {import_path}");
            return None;
        }
        if let Some(target) = self.overrides.get(import_path) {
            return Some(target.clone());
        }
        if let Some((replacement, module)) = self.replacement_for(import_path) {
            // Intermediate hops may already be known, but only the original is cached
            if let Some(target) = self.memo.get(&replacement) {
                return Some(target);
            }
            return self.resolve_uncached(&replacement, Some(&module), visited);
        }

        let module = self.owning_module(import_path, replaced_module)?;
        let subrepo = if module == self.module {
            String::new()
        } else {
            subrepo_name(&self.third_party_folder, module)
        };
        let package = trim_path(import_path, module);
        let name = name_for_lib_in_pkg(module, &package);
        Some(build_target(&name, &package, &subrepo))
    }

    /// Replacement for `import_path` together with the module it lands in.
    ///
    /// An exact entry wins; otherwise the longest replaced module owning the
    /// import has its prefix substituted.
    fn replacement_for(&self, import_path: &str) -> Option<(String, String)> {
        if let Some(new) = self.replacements.get(import_path) {
            if new != import_path {
                return Some((new.clone(), new.clone()));
            }
            return None;
        }

        let (old, new) = self
            .replacements
            .iter()
            .filter(|(old, new)| old != new && has_path_prefix(import_path, old))
            .max_by_key(|(old, _)| old.len())?;
        let rest = &import_path[old.len()..];
        Some((format!("{new}{rest}"), new.clone()))
    }

    fn owning_module<'a>(
        &'a self,
        import_path: &str,
        replaced_module: Option<&'a str>,
    ) -> Option<&'a str> {
        self.modules
            .iter()
            .map(String::as_str)
            .chain(replaced_module)
            .filter(|module| has_path_prefix(import_path, module))
            .max_by_key(|module| module.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(deps: &[&str]) -> ImportTargetResolver {
        ImportTargetResolver::new("github.com/this/module", "third_party/go")
            .with_modules(deps.iter().copied())
    }

    #[test]
    fn test_dep_target() {
        let cases: &[(&str, &[&str], &str, &str)] = &[
            ("local import", &[], "github.com/this/module/foo", "//foo"),
            ("local import in base", &[], "github.com/this/module", "//:module"),
            (
                "import to another module",
                &["github.com/some/module"],
                "github.com/some/module/foo",
                "///third_party/go/github.com_some_module//foo",
            ),
            (
                "import to longest match",
                &["github.com/some/module", "github.com/some/module/foo"],
                "github.com/some/module/foo/bar",
                "///third_party/go/github.com_some_module_foo//bar",
            ),
            (
                "root package matches module base",
                &["github.com/some/module"],
                "github.com/some/module",
                "///third_party/go/github.com_some_module//:module",
            ),
            ("all becomes lib locally", &[], "github.com/this/module/all", "//all:lib"),
            (
                "all becomes lib in another repo",
                &["github.com/some/module"],
                "github.com/some/module/all",
                "///third_party/go/github.com_some_module//all:lib",
            ),
        ];

        for (case, deps, import, expected) in cases {
            let r = resolver(deps);
            assert_eq!(r.resolve(import).as_deref(), Some(*expected), "{case}");
        }
    }

    #[test]
    fn longest_prefix_wins_regardless_of_order() {
        let r = ImportTargetResolver::new("example.com/me", "third_party/go")
            .with_modules(["a.com/m/sub", "a.com/m"]);
        assert_eq!(
            r.resolve("a.com/m/sub/x").as_deref(),
            Some("///third_party/go/a.com_m_sub//x")
        );
    }

    #[test]
    fn module_match_respects_path_components() {
        let r = resolver(&["a.com/mod"]);
        assert_eq!(r.resolve("a.com/module/x"), None);
    }

    #[test]
    fn unresolvable_import_is_none_and_not_cached() {
        let r = resolver(&["github.com/some/module"]);
        assert_eq!(r.resolve("fmt"), None);
        assert_eq!(r.cached(), 0);
        assert_eq!(
            r.resolve_all(&["fmt".to_string(), "github.com/this/module/x".to_string()]),
            vec!["//x"]
        );
    }

    #[test]
    fn override_takes_precedence() {
        let mut r = resolver(&["github.com/pkg/errors"]);
        r.add_override("github.com/pkg/errors", "@//third_party/go:errors");
        assert_eq!(
            r.resolve("github.com/pkg/errors").as_deref(),
            Some("@//third_party/go:errors")
        );
    }

    #[test]
    fn replace_chain_resolves_to_final_module_with_one_cache_entry() {
        let replacements = BTreeMap::from([
            ("x.com/a".to_string(), "y.com/b".to_string()),
            ("y.com/b".to_string(), "z.com/c".to_string()),
        ]);
        let r = ImportTargetResolver::new("example.com/me", "third_party/go")
            .with_modules(["x.com/a"])
            .with_replacements(replacements);

        assert_eq!(
            r.resolve("x.com/a/pkg").as_deref(),
            Some("///third_party/go/z.com_c//pkg")
        );
        assert_eq!(r.cached(), 1);
        // Stable on repeated lookups
        assert_eq!(
            r.resolve("x.com/a/pkg").as_deref(),
            Some("///third_party/go/z.com_c//pkg")
        );
        assert_eq!(r.cached(), 1);
    }

    #[test]
    fn replace_cycle_resolves_to_nothing() {
        let replacements = BTreeMap::from([
            ("x.com/a".to_string(), "y.com/b".to_string()),
            ("y.com/b".to_string(), "x.com/a".to_string()),
        ]);
        let r = ImportTargetResolver::new("example.com/me", "third_party/go")
            .with_modules(["x.com/a", "y.com/b"])
            .with_replacements(replacements);
        assert_eq!(r.resolve("x.com/a"), None);
    }

    #[test]
    fn local_target_names_module_root() {
        let r = resolver(&[]);
        assert_eq!(r.local_target(""), "//:module");
        assert_eq!(r.local_target("foo/bar"), "//foo/bar");
    }
}
