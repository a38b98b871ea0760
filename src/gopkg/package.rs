//! Importing a directory as a Go package

use super::constraint;
use super::context::{BuildContext, extension};
use super::source::{GoFileInfo, SourceScanner, split_quoted};
use crate::error::{ImportError, ImportResult};
use regex::Regex;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::trace;

/// Characters go/build accepts in `#cgo` arguments
static SAFE_CGO_ARG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+.,/0-9=A-Z_a-z:$@%! ~^]+$").expect("Invalid regex")
});

/// A Go package as seen under one build context.
///
/// File lists hold base names relative to `dir`, in directory order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Package {
    pub dir: PathBuf,
    pub name: String,

    pub go_files: Vec<String>,
    pub cgo_files: Vec<String>,
    /// Go files excluded by the build context
    pub ignored_go_files: Vec<String>,
    pub c_files: Vec<String>,
    pub cxx_files: Vec<String>,
    pub m_files: Vec<String>,
    pub h_files: Vec<String>,
    pub f_files: Vec<String>,
    pub s_files: Vec<String>,
    pub swig_files: Vec<String>,
    pub syso_files: Vec<String>,
    /// Prebuilt `.a` archives shipped in the directory
    pub archive_files: Vec<String>,

    pub test_go_files: Vec<String>,
    pub xtest_go_files: Vec<String>,

    pub cgo_cflags: Vec<String>,
    pub cgo_cppflags: Vec<String>,
    pub cgo_cxxflags: Vec<String>,
    pub cgo_fflags: Vec<String>,
    pub cgo_ldflags: Vec<String>,
    pub cgo_pkg_config: Vec<String>,

    /// Sorted, de-duplicated; `"C"` is not listed
    pub imports: Vec<String>,
    pub test_imports: Vec<String>,
    pub xtest_imports: Vec<String>,

    pub embed_patterns: Vec<String>,
    pub test_embed_patterns: Vec<String>,
    pub xtest_embed_patterns: Vec<String>,
}

impl Package {
    pub fn is_command(&self) -> bool {
        self.name == "main"
    }

    pub fn uses_cgo(&self) -> bool {
        !self.cgo_files.is_empty()
    }

    /// True when there is something to build besides tests
    pub fn has_sources(&self) -> bool {
        !self.go_files.is_empty() || !self.cgo_files.is_empty()
    }

    /// Go files compiled into the package (plain and cgo), sorted
    pub fn all_go_files(&self) -> Vec<String> {
        let mut files: Vec<String> = self
            .go_files
            .iter()
            .chain(&self.cgo_files)
            .cloned()
            .collect();
        files.sort();
        files
    }

    /// Non-Go sources belonging to the package, sorted
    pub fn other_files(&self) -> Vec<String> {
        let mut files: Vec<String> = [
            &self.c_files,
            &self.cxx_files,
            &self.m_files,
            &self.h_files,
            &self.f_files,
            &self.s_files,
            &self.swig_files,
            &self.syso_files,
        ]
        .into_iter()
        .flatten()
        .cloned()
        .collect();
        files.sort();
        files
    }
}

#[derive(Default)]
struct Collected {
    imports: BTreeSet<String>,
    test_imports: BTreeSet<String>,
    xtest_imports: BTreeSet<String>,
    embeds: BTreeSet<String>,
    test_embeds: BTreeSet<String>,
    xtest_embeds: BTreeSet<String>,
    first_file: String,
}

impl BuildContext {
    /// Import the Go package in `dir`.
    ///
    /// Returns [`ImportError::NoGoFiles`] when nothing in the directory is
    /// buildable under this context.
    pub fn import_dir(&self, dir: &Path) -> ImportResult<Package> {
        let mut names = Vec::new();
        let entries = std::fs::read_dir(dir).map_err(|source| ImportError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| ImportError::ReadDir {
                path: dir.to_path_buf(),
                source,
            })?;
            let is_file = entry.file_type().map(|t| !t.is_dir()).unwrap_or(false);
            if is_file {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();

        let mut scanner = SourceScanner::new()?;
        let mut pkg = Package {
            dir: dir.to_path_buf(),
            ..Package::default()
        };
        let mut collected = Collected::default();

        for name in names {
            if name.ends_with(".a") {
                pkg.archive_files.push(name.clone());
            }
            self.import_file(dir, name, &mut scanner, &mut pkg, &mut collected)?;
        }

        if pkg.go_files.is_empty()
            && pkg.cgo_files.is_empty()
            && pkg.test_go_files.is_empty()
            && pkg.xtest_go_files.is_empty()
        {
            return Err(ImportError::NoGoFiles {
                dir: dir.to_path_buf(),
                excluded: !pkg.ignored_go_files.is_empty(),
            });
        }

        pkg.imports = collected.imports.into_iter().collect();
        pkg.test_imports = collected.test_imports.into_iter().collect();
        pkg.xtest_imports = collected.xtest_imports.into_iter().collect();
        pkg.embed_patterns = collected.embeds.into_iter().collect();
        pkg.test_embed_patterns = collected.test_embeds.into_iter().collect();
        pkg.xtest_embed_patterns = collected.xtest_embeds.into_iter().collect();
        Ok(pkg)
    }

    fn import_file(
        &self,
        dir: &Path,
        name: String,
        scanner: &mut SourceScanner,
        pkg: &mut Package,
        collected: &mut Collected,
    ) -> ImportResult<()> {
        if name.starts_with('_') || name.starts_with('.') {
            return Ok(());
        }
        let Some(ext) = extension(&name) else {
            return Ok(());
        };
        let list = match ext {
            "go" => None,
            "c" => Some(&mut pkg.c_files),
            "cc" | "cpp" | "cxx" => Some(&mut pkg.cxx_files),
            "m" => Some(&mut pkg.m_files),
            "h" | "hh" | "hpp" | "hxx" => Some(&mut pkg.h_files),
            "f" | "F" | "for" | "f90" => Some(&mut pkg.f_files),
            "s" | "S" | "sx" => Some(&mut pkg.s_files),
            "swig" | "swigcxx" => Some(&mut pkg.swig_files),
            "syso" => {
                if self.good_os_arch_file(&name) {
                    pkg.syso_files.push(name);
                }
                return Ok(());
            }
            _ => return Ok(()),
        };

        let path = dir.join(&name);
        if !self.good_os_arch_file(&name) {
            if list.is_none() {
                pkg.ignored_go_files.push(name);
            }
            return Ok(());
        }
        let content = std::fs::read_to_string(&path).map_err(|source| ImportError::ReadFile {
            path: path.clone(),
            source,
        })?;
        if !self.should_build(&path, &content)? {
            trace!("{} excluded by build constraints", path.display());
            if list.is_none() {
                pkg.ignored_go_files.push(name);
            }
            return Ok(());
        }
        if let Some(list) = list {
            list.push(name);
            return Ok(());
        }

        let info = scanner.scan(&path, &content)?;
        self.add_go_file(&path, name, info, pkg, collected)
    }

    fn add_go_file(
        &self,
        path: &Path,
        name: String,
        info: GoFileInfo,
        pkg: &mut Package,
        collected: &mut Collected,
    ) -> ImportResult<()> {
        let mut package_name = info.package.clone();
        if package_name == "documentation" {
            pkg.ignored_go_files.push(name);
            return Ok(());
        }

        let is_test = name.ends_with("_test.go");
        let mut is_xtest = false;
        if is_test && package_name.ends_with("_test") && pkg.name != package_name {
            is_xtest = true;
            package_name.truncate(package_name.len() - "_test".len());
        }

        if pkg.name.is_empty() {
            pkg.name = package_name;
            collected.first_file = name.clone();
        } else if package_name != pkg.name {
            return Err(ImportError::MultiplePackages {
                dir: pkg.dir.clone(),
                names: vec![pkg.name.clone(), package_name],
                files: vec![collected.first_file.clone(), name],
            });
        }

        let is_cgo = info.uses_cgo() && !is_test;
        if is_cgo && !self.cgo_enabled {
            // Imports and embeds of excluded cgo files do not count
            pkg.ignored_go_files.push(name);
            return Ok(());
        }
        if is_cgo {
            if let Some(preamble) = &info.cgo_preamble {
                self.apply_cgo_directives(path, preamble, pkg)?;
            }
        }

        let imports = info.imports.into_iter().filter(|i| i != "C");
        if is_xtest {
            collected.xtest_imports.extend(imports);
            collected.xtest_embeds.extend(info.embeds);
            pkg.xtest_go_files.push(name);
        } else if is_test {
            collected.test_imports.extend(imports);
            collected.test_embeds.extend(info.embeds);
            pkg.test_go_files.push(name);
        } else {
            collected.imports.extend(imports);
            collected.embeds.extend(info.embeds);
            if is_cgo {
                pkg.cgo_files.push(name);
            } else {
                pkg.go_files.push(name);
            }
        }
        Ok(())
    }

    /// Apply `#cgo [conditions] VERB: args` lines from a cgo preamble
    fn apply_cgo_directives(&self, file: &Path, preamble: &str, pkg: &mut Package) -> ImportResult<()> {
        let invalid = |line: &str| ImportError::InvalidCgoDirective {
            file: file.to_path_buf(),
            line: line.to_string(),
        };
        let srcdir = pkg.dir.display().to_string();

        for raw in preamble.lines() {
            let line = raw.trim();
            let Some(rest) = line.strip_prefix("#cgo") else {
                continue;
            };
            if !rest.starts_with([' ', '\t']) {
                continue;
            }
            let (head, args) = rest.split_once(':').ok_or_else(|| invalid(line))?;
            let fields: Vec<&str> = head.split_whitespace().collect();
            let Some((verb, conditions)) = fields.split_last() else {
                return Err(invalid(line));
            };

            if !conditions.is_empty() {
                let mut matched = false;
                for cond in conditions {
                    let expr = constraint::parse_cgo_condition(cond).map_err(|_| invalid(line))?;
                    if self.eval(&expr) {
                        matched = true;
                        break;
                    }
                }
                if !matched {
                    continue;
                }
            }

            let args: Vec<String> = split_quoted(args)
                .map_err(|_| invalid(line))?
                .into_iter()
                .map(|arg| arg.replace("${SRCDIR}", &srcdir))
                .collect();
            if args.iter().any(|arg| !SAFE_CGO_ARG.is_match(arg)) {
                return Err(invalid(line));
            }

            let target = match *verb {
                "CFLAGS" => &mut pkg.cgo_cflags,
                "CPPFLAGS" => &mut pkg.cgo_cppflags,
                "CXXFLAGS" => &mut pkg.cgo_cxxflags,
                "FFLAGS" => &mut pkg.cgo_fflags,
                "LDFLAGS" => &mut pkg.cgo_ldflags,
                "pkg-config" => &mut pkg.cgo_pkg_config,
                _ => return Err(invalid(line)),
            };
            target.extend(args);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    fn ctx() -> BuildContext {
        BuildContext::for_platform("linux", "amd64")
    }

    #[test]
    fn imports_plain_package_with_tests() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.go", "package foo\n\nimport (\n\t\"fmt\"\n\t\"os\"\n)\n");
        write(dir.path(), "b.go", "package foo\n\nimport \"fmt\"\n");
        write(dir.path(), "a_test.go", "package foo\n\nimport \"testing\"\n");
        write(dir.path(), "x_test.go", "package foo_test\n\nimport \"example.com/foo\"\n");
        write(dir.path(), "skip_windows.go", "package foo\n");
        write(dir.path(), "ignored.go", "//go:build ignore\n\npackage main\n");
        write(dir.path(), "lib.a", "!<arch>\n");
        write(dir.path(), "impl.s", "TEXT ·f(SB),0,$0\n");

        let pkg = ctx().import_dir(dir.path()).unwrap();
        assert_eq!(pkg.name, "foo");
        assert!(!pkg.is_command());
        assert_eq!(pkg.go_files, vec!["a.go", "b.go"]);
        assert_eq!(pkg.test_go_files, vec!["a_test.go"]);
        assert_eq!(pkg.xtest_go_files, vec!["x_test.go"]);
        assert_eq!(pkg.ignored_go_files, vec!["ignored.go", "skip_windows.go"]);
        assert_eq!(pkg.imports, vec!["fmt", "os"]);
        assert_eq!(pkg.test_imports, vec!["testing"]);
        assert_eq!(pkg.xtest_imports, vec!["example.com/foo"]);
        assert_eq!(pkg.archive_files, vec!["lib.a"]);
        assert_eq!(pkg.s_files, vec!["impl.s"]);
    }

    #[test]
    fn conflicting_package_names() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.go", "package foo\n");
        write(dir.path(), "b.go", "package bar\n");
        let err = ctx().import_dir(dir.path()).unwrap_err();
        match err {
            ImportError::MultiplePackages { names, files, .. } => {
                assert_eq!(names, vec!["foo", "bar"]);
                assert_eq!(files, vec!["a.go", "b.go"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn no_go_files_reports_exclusion() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "only_windows.go", "package foo\n");
        let err = ctx().import_dir(dir.path()).unwrap_err();
        assert!(err.is_no_go());
        assert!(err.to_string().contains("build constraints exclude all Go files"));

        let empty = TempDir::new().unwrap();
        let err = ctx().import_dir(empty.path()).unwrap_err();
        assert!(matches!(err, ImportError::NoGoFiles { excluded: false, .. }));
    }

    #[test]
    fn cgo_directives_and_disabled_cgo() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "c.go",
            "package foo\n\n// #cgo CFLAGS: -I${SRCDIR}/include\n// #cgo linux LDFLAGS: -lm -lz\n// #cgo darwin LDFLAGS: -framework CoreFoundation\n// #cgo pkg-config: libpng\nimport \"C\"\n\nimport \"unsafe\"\n",
        );
        write(dir.path(), "plain.go", "package foo\n\nimport \"strings\"\n");
        write(dir.path(), "helper.c", "int f() { return 1; }\n");
        write(dir.path(), "helper.h", "int f();\n");

        let pkg = ctx().import_dir(dir.path()).unwrap();
        assert_eq!(pkg.cgo_files, vec!["c.go"]);
        assert_eq!(pkg.go_files, vec!["plain.go"]);
        assert_eq!(
            pkg.cgo_cflags,
            vec![format!("-I{}/include", dir.path().display())]
        );
        assert_eq!(pkg.cgo_ldflags, vec!["-lm", "-lz"]);
        assert_eq!(pkg.cgo_pkg_config, vec!["libpng"]);
        assert_eq!(pkg.imports, vec!["strings", "unsafe"]);
        assert_eq!(pkg.other_files(), vec!["helper.c", "helper.h"]);

        let no_cgo = BuildContext {
            cgo_enabled: false,
            ..ctx()
        };
        let pkg = no_cgo.import_dir(dir.path()).unwrap();
        assert!(pkg.cgo_files.is_empty());
        assert_eq!(pkg.ignored_go_files, vec!["c.go"]);
        assert_eq!(pkg.imports, vec!["strings"]);
    }

    #[test]
    fn unsafe_cgo_arguments_are_rejected() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "c.go",
            "package foo\n\n// #cgo LDFLAGS: -lm;rm\nimport \"C\"\n",
        );
        let err = ctx().import_dir(dir.path()).unwrap_err();
        assert!(matches!(err, ImportError::InvalidCgoDirective { .. }));
    }

    #[test]
    fn embed_patterns_are_sorted_and_unique() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "embed.go",
            "package web\n\nimport \"embed\"\n\n//go:embed templates/*\nvar a embed.FS\n\n//go:embed static templates/*\nvar b embed.FS\n",
        );
        let pkg = ctx().import_dir(dir.path()).unwrap();
        assert_eq!(pkg.embed_patterns, vec!["static", "templates/*"]);
    }

    #[test]
    fn main_package_is_a_command() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "main.go", "package main\n\nfunc main() {}\n");
        let pkg = ctx().import_dir(dir.path()).unwrap();
        assert!(pkg.is_command());
        assert!(pkg.has_sources());
    }
}
