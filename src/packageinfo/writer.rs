//! Writers for `package-info` and `module-info` sidecars

use super::{ExportFile, Module, Package, PackageRef};
use crate::error::{PackageInfoError, PackageInfoResult};
use crate::gopkg::{BuildContext, SourceScanner};
use crate::resolver::{ImportConfig, trim_path};
use std::collections::{BTreeSet, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Inputs for describing a single package
#[derive(Debug, Clone, Default)]
pub struct PackageInfoOptions {
    /// Import path of the module or repository root
    pub import_path: String,
    /// Package directory relative to the repository root
    pub pkg: String,
    /// Subrepo root the package lives in, empty for the host repository
    pub subrepo: String,
    /// `module@version` the package belongs to, if any
    pub module: Option<String>,
    /// Import path -> package ID, overriding the import path as ID
    pub import_map: HashMap<String, String>,
    /// Go sources; when empty the package directory is imported instead
    pub srcs: Vec<String>,
    /// Archive produced for the package, relative to the repository root
    pub export_file: Option<String>,
}

/// Describe one package
pub fn package_info(options: &PackageInfoOptions, context: &BuildContext) -> PackageInfoResult<Package> {
    let within_subrepo = if options.subrepo.is_empty() {
        options.pkg.clone()
    } else {
        trim_path(&options.pkg, &options.subrepo)
    };
    let pkg_path = join_import_path(&options.import_path, &within_subrepo);

    let mut pkg = if options.srcs.is_empty() {
        let imported = context.import_dir(Path::new(dir_or_dot(&options.pkg)))?;
        let in_pkg = |files: Vec<String>| -> Vec<String> {
            files.into_iter().map(|f| join_rel(&options.pkg, &f)).collect()
        };
        Package {
            name: imported.name.clone(),
            go_files: in_pkg(imported.all_go_files()),
            other_files: in_pkg(imported.other_files()),
            embed_patterns: imported.embed_patterns.clone(),
            imports: imported
                .imports
                .iter()
                .map(|imp| (imp.clone(), PackageRef::new(imp.as_str())))
                .collect(),
            ..Package::default()
        }
    } else {
        scan_sources(&options.srcs)?
    };

    for (import, target) in pkg.imports.iter_mut() {
        if let Some(id) = options.import_map.get(import) {
            target.id = id.clone();
        }
    }

    let repo_path = match &options.export_file {
        Some(path) => path.clone(),
        None => join_rel(&options.pkg, &format!("{}.a", base_name(&pkg_path))),
    };
    let subrepo_path = if options.subrepo.is_empty() {
        repo_path.clone()
    } else {
        trim_path(&repo_path, &options.subrepo)
    };

    pkg.id = pkg_path.clone();
    pkg.pkg_path = pkg_path;
    pkg.compiled_go_files = pkg.go_files.clone();
    pkg.export_file = ExportFile::new(subrepo_path, repo_path).encode();
    pkg.module = options.module.as_deref().map(Module::parse);
    Ok(pkg)
}

/// Inputs for describing every package of a downloaded module
#[derive(Debug, Clone, Default)]
pub struct ModuleInfoOptions {
    pub module_path: String,
    /// Root of the module sources
    pub src_root: PathBuf,
    /// Import config listing the compiled archive of each package
    pub import_config: Option<PathBuf>,
    /// Packages to include, relative to the module root; empty for all
    pub packages: Vec<String>,
}

/// Describe the buildable packages of a module, sorted by directory
pub fn module_info(options: &ModuleInfoOptions, context: &BuildContext) -> PackageInfoResult<Vec<Package>> {
    let archives = match &options.import_config {
        Some(path) => ImportConfig::read(path)
            .map_err(|source| PackageInfoError::Io {
                path: path.clone(),
                source,
            })?
            .package_files(),
        None => HashMap::new(),
    };
    let wanted: BTreeSet<&str> = options
        .packages
        .iter()
        .map(|p| p.trim_start_matches("./").trim_end_matches('/'))
        .collect();

    let root = &options.src_root;
    let mut pkgs = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            if !entry.file_type().is_dir() || entry.depth() == 0 {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            name != "testdata" && !name.starts_with('_') && !name.starts_with('.')
        });
    for entry in walker {
        let entry = entry.map_err(|e| PackageInfoError::Io {
            path: root.clone(),
            source: e.into(),
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let rel = relative_slash_path(root, entry.path());
        if !wanted.is_empty() && !wanted.contains(dir_or_dot(&rel)) {
            continue;
        }
        let imported = match context.import_dir(entry.path()) {
            Ok(pkg) => pkg,
            Err(e) if e.is_no_go() => {
                debug!("skipping {}: {e}", entry.path().display());
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if !imported.has_sources() {
            continue;
        }

        let pkg_path = join_import_path(&options.module_path, &rel);
        let in_dir = |files: Vec<String>| -> Vec<String> {
            files.into_iter().map(|f| join_rel(&rel, &f)).collect()
        };
        let go_files = in_dir(imported.all_go_files());
        let export_file = archives
            .get(&pkg_path)
            .map(|archive| ExportFile::new(archive.as_str(), archive.as_str()).encode())
            .unwrap_or_default();
        pkgs.push(Package {
            id: pkg_path.clone(),
            name: imported.name.clone(),
            pkg_path,
            compiled_go_files: go_files.clone(),
            go_files,
            other_files: in_dir(imported.other_files()),
            embed_patterns: imported.embed_patterns.clone(),
            export_file,
            imports: imported
                .imports
                .iter()
                .map(|imp| (imp.clone(), PackageRef::new(imp.as_str())))
                .collect(),
            module: None,
        });
    }
    Ok(pkgs)
}

/// Write packages as the JSON array sidecars contain
pub fn write_packages(mut w: impl Write, pkgs: &[Package]) -> PackageInfoResult<()> {
    serde_json::to_writer_pretty(&mut w, pkgs)?;
    writeln!(w).map_err(|source| PackageInfoError::Io {
        path: PathBuf::from("<output>"),
        source,
    })
}

fn scan_sources(srcs: &[String]) -> PackageInfoResult<Package> {
    let mut scanner = SourceScanner::new()?;
    let mut name = String::new();
    let mut imports = BTreeSet::new();
    let mut embeds = BTreeSet::new();
    for src in srcs {
        let info = scanner.scan_file(Path::new(src))?;
        if name.is_empty() || name.ends_with("_test") {
            name = info.package.clone();
        }
        imports.extend(info.imports);
        embeds.extend(info.embeds);
    }
    Ok(Package {
        name,
        go_files: srcs.to_vec(),
        embed_patterns: embeds.into_iter().collect(),
        imports: imports
            .into_iter()
            .map(|imp| {
                let target = PackageRef::new(imp.as_str());
                (imp, target)
            })
            .collect(),
        ..Package::default()
    })
}

fn join_import_path(base: &str, rel: &str) -> String {
    let rel = rel.trim_matches('/');
    if rel.is_empty() || rel == "." {
        base.to_string()
    } else if base.is_empty() {
        rel.to_string()
    } else {
        format!("{base}/{rel}")
    }
}

fn join_rel(dir: &str, file: &str) -> String {
    if dir.is_empty() || dir == "." {
        file.to_string()
    } else {
        format!("{}/{file}", dir.trim_end_matches('/'))
    }
}

fn dir_or_dot(dir: &str) -> &str {
    if dir.is_empty() { "." } else { dir }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn context() -> BuildContext {
        BuildContext::for_platform("linux", "amd64")
    }

    #[test]
    fn test_join_import_path() {
        assert_eq!(join_import_path("example.com/m", ""), "example.com/m");
        assert_eq!(join_import_path("example.com/m", "."), "example.com/m");
        assert_eq!(join_import_path("example.com/m", "a/b"), "example.com/m/a/b");
        assert_eq!(join_import_path("", "a/b"), "a/b");
    }

    #[test]
    fn package_info_from_explicit_sources() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("a.go");
        fs::write(
            &src,
            "package foo\n\nimport (\n\t\"fmt\"\n\t\"example.com/m/bar\"\n)\n",
        )
        .unwrap();

        let mut options = PackageInfoOptions {
            import_path: "example.com/m".to_string(),
            pkg: "third_party/go/example.com_m/foo".to_string(),
            subrepo: "third_party/go/example.com_m".to_string(),
            module: Some("example.com/m@v1.0.0".to_string()),
            srcs: vec![src.to_string_lossy().into_owned()],
            ..PackageInfoOptions::default()
        };
        options
            .import_map
            .insert("example.com/m/bar".to_string(), "//bar:bar".to_string());

        let pkg = package_info(&options, &context()).unwrap();
        assert_eq!(pkg.id, "example.com/m/foo");
        assert_eq!(pkg.name, "foo");
        assert_eq!(pkg.compiled_go_files, pkg.go_files);
        assert_eq!(pkg.imports["fmt"].id, "fmt");
        assert_eq!(pkg.imports["example.com/m/bar"].id, "//bar:bar");
        assert_eq!(
            pkg.export().unwrap(),
            Some(ExportFile::new("foo/foo.a", "third_party/go/example.com_m/foo/foo.a"))
        );
        assert_eq!(pkg.module.unwrap().version, "v1.0.0");
    }

    #[test]
    fn module_info_lists_buildable_packages() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::write(root.join("m.go"), "package m\n").unwrap();
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("sub").join("s.go"), "package sub\n\nimport \"os\"\n").unwrap();
        fs::create_dir_all(root.join("testdata")).unwrap();
        fs::write(root.join("testdata").join("t.go"), "package t\n").unwrap();
        fs::create_dir_all(root.join("docs")).unwrap();
        let ic = root.join("pkgs.importconfig");
        fs::write(&ic, "packagefile example.com/m/sub=out/sub.a\n").unwrap();

        let options = ModuleInfoOptions {
            module_path: "example.com/m".to_string(),
            src_root: root.to_path_buf(),
            import_config: Some(ic),
            packages: Vec::new(),
        };
        let pkgs = module_info(&options, &context()).unwrap();
        let ids: Vec<&str> = pkgs.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["example.com/m", "example.com/m/sub"]);
        assert_eq!(pkgs[0].go_files, vec!["m.go"]);
        assert_eq!(pkgs[0].export_file, "");
        assert_eq!(pkgs[1].go_files, vec!["sub/s.go"]);
        assert_eq!(pkgs[1].export_file, "out/sub.a|out/sub.a");

        let only_sub = ModuleInfoOptions {
            packages: vec!["sub".to_string()],
            ..options
        };
        let pkgs = module_info(&only_sub, &context()).unwrap();
        assert_eq!(pkgs.len(), 1);
        assert_eq!(pkgs[0].name, "sub");
    }

    #[test]
    fn write_packages_emits_json_array() {
        let mut out = Vec::new();
        let pkg = Package {
            id: "x".to_string(),
            ..Package::default()
        };
        write_packages(&mut out, &[pkg]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with('['));
        let back: Vec<Package> = serde_json::from_str(&text).unwrap();
        assert_eq!(back[0].id, "x");
    }
}
