//! In-place refresh of existing build files
//!
//! Unlike a full generation this respects hand-written build files: it only
//! repopulates the one library (or binary) rule and the one internal test rule
//! it finds, appending them when missing.

use super::{Generator, RuleDraft, RuleKind};
use crate::buildfile::BuildFile;
use crate::error::{GenerateError, GenerateResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

impl Generator {
    /// Update the packages at `paths`, each a directory, a build file or a
    /// `dir/...` subtree, relative to the source root
    pub fn update(&self, paths: &[String]) -> GenerateResult<()> {
        let mut done = HashSet::new();
        for path in paths {
            match path.strip_suffix("/...") {
                Some(subtree) => {
                    let root = self.options.src_root.join(subtree);
                    for entry in WalkDir::new(&root).sort_by_file_name() {
                        let entry = entry.map_err(|e| GenerateError::Walk {
                            path: root.clone(),
                            reason: e.to_string(),
                        })?;
                        if entry.file_type().is_file() && self.is_build_file(entry.path()) {
                            self.update_path(&mut done, entry.path())?;
                        }
                    }
                }
                None => self.update_path(&mut done, &self.options.src_root.join(path))?,
            }
        }
        Ok(())
    }

    fn update_path(&self, done: &mut HashSet<PathBuf>, path: &Path) -> GenerateResult<()> {
        if !done.insert(path.to_path_buf()) {
            return Ok(());
        }
        let is_build_file = self.is_build_file(path);
        let dir = if is_build_file {
            path.parent().unwrap_or(path)
        } else {
            path
        };

        let pkg = match self.context.import_dir(dir) {
            Ok(pkg) => pkg,
            Err(e) if e.is_no_go() => {
                debug!("skipping {}: {e}", dir.display());
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let package = self.package_dir(dir);
        let lib = self.library_draft(&pkg, &package);
        let test = RuleDraft::test(
            &pkg,
            lib.as_ref(),
            &crate::resolver::name_for_lib_in_pkg(&self.options.module, &package),
            &self.resolver,
        );

        let build_path = if is_build_file {
            path.to_path_buf()
        } else {
            BuildFile::find(dir, &self.options.build_file_names).ok_or_else(|| {
                GenerateError::MissingBuildFile {
                    dir: dir.to_path_buf(),
                }
            })?
        };
        let mut file = BuildFile::load(&build_path)?;

        let primary = if pkg.is_command() {
            [RuleKind::GoBinary, RuleKind::CgoBinary]
        } else {
            [RuleKind::GoLibrary, RuleKind::CgoLibrary]
        };
        let mut lib_done = false;
        let mut test_done = false;

        for rule in file.rules_mut() {
            let Some(kind) = rule.kind() else { continue };
            if primary.iter().any(|k| k.as_str() == kind) {
                if lib_done {
                    return Err(GenerateError::TooManyPrimaryRules {
                        path: build_path,
                        kind: kind.to_string(),
                    });
                }
                if let Some(lib) = &lib {
                    // The package may have gained or lost cgo files
                    rule.set_kind(lib.kind.as_str());
                    lib.populate(rule);
                }
                lib_done = true;
            } else if kind == "go_test" {
                if rule.attr("external").is_some() {
                    continue;
                }
                if test_done {
                    warn!("too many go_test rules in {}", build_path.display());
                    continue;
                }
                if let Some(test) = &test {
                    test.populate(rule);
                }
                test_done = true;
            }
        }

        if !lib_done {
            if let Some(lib) = &lib {
                file.push_rule(lib.to_call());
            }
        }
        if !test_done {
            if let Some(test) = &test {
                file.push_rule(test.to_call());
            }
        }
        file.save()?;
        info!("updated {}", file.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::generate::GenerateOptions;
    use crate::gopkg::BuildContext;
    use std::fs;
    use tempfile::TempDir;

    fn generator(root: &Path) -> Generator {
        let options = GenerateOptions::from_settings(&Settings::default(), root, "example.com/m");
        Generator::new(options, BuildContext::for_platform("linux", "amd64"))
    }

    #[test]
    fn appends_missing_rules() {
        let dir = TempDir::new().unwrap();
        let pkg = dir.path().join("foo");
        fs::create_dir(&pkg).unwrap();
        fs::write(pkg.join("foo.go"), "package foo\n\nimport \"example.com/m/bar\"\n").unwrap();
        fs::write(pkg.join("foo_test.go"), "package foo\n\nimport \"testing\"\n").unwrap();
        fs::write(pkg.join("BUILD"), "# hand written\n").unwrap();

        generator(dir.path()).update(&["foo".to_string()]).unwrap();
        let out = fs::read_to_string(pkg.join("BUILD")).unwrap();
        assert_eq!(
            out,
            "# hand written\n\ngo_library(\n    name = \"foo\",\n    srcs = [\"foo.go\"],\n    deps = [\"//bar\"],\n    _module = \"example.com/m\",\n)\n\ngo_test(\n    name = \"foo_test\",\n    srcs = [\"foo_test.go\"],\n    deps = [\":foo\"],\n)\n"
        );
    }

    #[test]
    fn second_library_rule_is_fatal() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("m.go"), "package m\n").unwrap();
        fs::write(
            dir.path().join("BUILD"),
            "go_library(name = 'a')\ngo_library(name = 'b')\n",
        )
        .unwrap();
        let err = generator(dir.path()).update(&["BUILD".to_string()]).unwrap_err();
        assert!(matches!(err, GenerateError::TooManyPrimaryRules { .. }));
    }

    #[test]
    fn external_and_extra_tests_are_left_alone() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("m.go"), "package m\n").unwrap();
        fs::write(dir.path().join("m_test.go"), "package m\n").unwrap();
        let build = "go_test(\n    name = \"ext\",\n    srcs = [\"x.go\"],\n    external = True,\n)\n\ngo_test(\n    name = \"t\",\n    srcs = [],\n)\n\ngo_test(\n    name = \"extra\",\n    srcs = [\"y.go\"],\n)\n";
        fs::write(dir.path().join("BUILD"), build).unwrap();

        generator(dir.path()).update(&["./...".to_string()]).unwrap();
        let out = fs::read_to_string(dir.path().join("BUILD")).unwrap();
        assert!(out.contains("name = \"ext\",\n    srcs = [\"x.go\"]"));
        assert!(out.contains("name = \"t\",\n    srcs = [\"m_test.go\"]"));
        assert!(out.contains("name = \"extra\",\n    srcs = [\"y.go\"]"));
        // The library did not exist and was appended
        assert!(out.contains("go_library(\n    name = \"m\""));
    }

    #[test]
    fn external_test_after_internal_one_is_not_an_extra() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("m.go"), "package m\n").unwrap();
        fs::write(dir.path().join("m_test.go"), "package m\n").unwrap();
        let build = "go_library(\n    name = \"m\",\n    srcs = [],\n)\n\ngo_test(\n    name = \"t\",\n    srcs = [],\n)\n\ngo_test(\n    name = \"ext\",\n    srcs = [\"x.go\"],\n    external = True,\n)\n";
        fs::write(dir.path().join("BUILD"), build).unwrap();

        generator(dir.path()).update(&["BUILD".to_string()]).unwrap();
        let out = fs::read_to_string(dir.path().join("BUILD")).unwrap();
        assert!(out.contains("name = \"t\",\n    srcs = [\"m_test.go\"]"));
        assert!(out.contains("name = \"ext\",\n    srcs = [\"x.go\"]"));
        assert_eq!(out.matches("go_test(").count(), 2);
    }

    #[test]
    fn library_becomes_cgo_library_when_package_uses_cgo() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("m.go"), "package m\n").unwrap();
        fs::write(
            dir.path().join("c.go"),
            "package m\n\n// #include <stdlib.h>\nimport \"C\"\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("BUILD"),
            "go_library(\n    name = \"m\",\n    srcs = [\"m.go\"],\n)\n",
        )
        .unwrap();

        generator(dir.path()).update(&["BUILD".to_string()]).unwrap();
        let out = fs::read_to_string(dir.path().join("BUILD")).unwrap();
        assert!(out.contains("cgo_library(\n    name = \"m\""));
        assert!(out.contains("srcs = [\"c.go\"]"));
        assert!(out.contains("go_srcs = [\"m.go\"]"));
        assert!(!out.contains("\ngo_library("));
        assert!(!out.starts_with("go_library("));
    }

    #[test]
    fn missing_build_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("m.go"), "package m\n").unwrap();
        let err = generator(dir.path()).update(&[".".to_string()]).unwrap_err();
        assert!(matches!(err, GenerateError::MissingBuildFile { .. }));
    }
}
