//! Package driver for the Go package-loading protocol
//!
//! Tools such as gopls call a driver (named by `GOPACKAGESDRIVER`) with a JSON
//! request on stdin and a list of files or directories, and expect the
//! packages those files belong to. This driver asks the build tool which
//! targets consume the files, builds their package info sidecars and answers
//! from those.

pub mod buildtool;
pub mod collect;
pub mod paths;

pub use buildtool::{BuildTool, GoTool, GoToolchain, Please, StderrMode};
pub use collect::{collect_sidecars, find_sidecars, read_sidecar};
pub use paths::{PathRewriter, parent_dir};

use crate::config::Settings;
use crate::error::{DriverError, DriverResult};
use crate::gopkg::BuildContext;
use crate::packageinfo::Package;
use bitflags::bitflags;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

bitflags! {
    /// What the caller wants to know about each package
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LoadMode: u64 {
        const NEED_NAME = 1 << 0;
        const NEED_FILES = 1 << 1;
        const NEED_COMPILED_GO_FILES = 1 << 2;
        const NEED_IMPORTS = 1 << 3;
        const NEED_DEPS = 1 << 4;
        const NEED_EXPORT_FILE = 1 << 5;
        const NEED_TYPES = 1 << 6;
        const NEED_SYNTAX = 1 << 7;
        const NEED_TYPES_INFO = 1 << 8;
        const NEED_TYPES_SIZES = 1 << 9;
        const NEED_MODULE = 1 << 13;
        const NEED_EMBED_FILES = 1 << 14;
        const NEED_EMBED_PATTERNS = 1 << 15;
    }
}

impl Default for LoadMode {
    fn default() -> Self {
        Self::empty()
    }
}

impl LoadMode {
    /// Modes that need type information, which sidecars do not carry
    pub fn wants_types(self) -> bool {
        self.intersects(Self::NEED_TYPES | Self::NEED_TYPES_INFO)
    }
}

fn deserialize_mode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<LoadMode, D::Error> {
    u64::deserialize(deserializer).map(LoadMode::from_bits_retain)
}

/// Request read from stdin
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DriverRequest {
    #[serde(deserialize_with = "deserialize_mode")]
    pub mode: LoadMode,
    pub env: Vec<String>,
    pub build_flags: Vec<String>,
    pub tests: bool,
    /// File path -> base64 contents; accepted but not applied
    pub overlay: BTreeMap<String, String>,
}

impl DriverRequest {
    /// Value of `key` in the request environment; the last assignment wins
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find_map(|kv| kv.strip_prefix(key)?.strip_prefix('='))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Sizes {
    pub word_size: u32,
    pub max_align: u32,
}

/// Response written to stdout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DriverResponse {
    pub not_handled: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub compiler: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub arch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Sizes>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roots: Vec<String>,
    pub packages: Vec<Package>,
}

impl DriverResponse {
    /// Tells the caller to fall back to its default loader
    pub fn not_handled() -> Self {
        Self {
            not_handled: true,
            ..Self::default()
        }
    }
}

/// Driver settings that do not come from the request
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub working_dir: PathBuf,
    pub workers: usize,
    pub sidecar_suffix: String,
    pub gen_dir: PathBuf,
    pub subrepo_dir: PathBuf,
}

impl DriverOptions {
    pub fn from_settings(settings: &Settings, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            workers: settings.driver.workers,
            sidecar_suffix: settings.driver.sidecar_suffix.clone(),
            gen_dir: settings.build_tool.gen_dir.clone(),
            subrepo_dir: settings.build_tool.subrepo_dir.clone(),
        }
    }
}

pub struct Driver<B, G> {
    options: DriverOptions,
    build_tool: B,
    go: G,
}

impl<B: BuildTool, G: GoToolchain> Driver<B, G> {
    pub fn new(options: DriverOptions, build_tool: B, go: G) -> Self {
        Self {
            options,
            build_tool,
            go,
        }
    }

    /// Load the packages of `files` (files or directories) through the build
    /// tool
    pub fn load(&self, request: &DriverRequest, files: &[String]) -> DriverResult<DriverResponse> {
        if files.is_empty() {
            return Ok(DriverResponse::not_handled());
        }
        let files = self.go_files(files, request.tests)?;
        let Some(first) = files.first() else {
            warn!("no Go files found in initial query");
            return Ok(DriverResponse::not_handled());
        };
        let anchor = first.parent().unwrap_or(self.options.working_dir.as_path());
        let root = match self.build_tool.repo_root(anchor) {
            Ok(root) => root,
            Err(e) => {
                warn!("could not find the repository root: {e}");
                return Ok(DriverResponse::not_handled());
            }
        };
        let relative = relative_files(&root, &files);
        self.warn_unsupported(request);

        let outputs = self.build_tool.build_package_info(&root, &relative)?;
        let sidecars: Vec<PathBuf> = outputs
            .iter()
            .filter(|out| out.ends_with(".json"))
            .map(|out| root.join(out))
            .collect();
        info!("collecting {} package info files", sidecars.len());
        let pkgs = collect_sidecars(&sidecars, self.options.workers)?;
        self.finish(request, &root, &relative, pkgs)
    }

    /// Load from sidecars already on disk under `search_dir`, without
    /// invoking the build tool
    pub fn load_offline(
        &self,
        request: &DriverRequest,
        search_dir: &Path,
        files: &[String],
    ) -> DriverResult<DriverResponse> {
        let files = self.go_files(files, request.tests)?;
        if files.is_empty() {
            warn!("no Go files found in initial query");
            return Ok(DriverResponse::not_handled());
        }
        let root = self.options.working_dir.clone();
        let relative = relative_files(&root, &files);
        self.warn_unsupported(request);

        let search_dir = root.join(search_dir);
        let sidecars = find_sidecars(&search_dir, &self.options.sidecar_suffix)?;
        info!("found {} package info files under {}", sidecars.len(), search_dir.display());
        let pkgs = collect_sidecars(&sidecars, self.options.workers)?;
        self.finish(request, &root, &relative, pkgs)
    }

    fn finish(
        &self,
        request: &DriverRequest,
        root: &Path,
        relative: &[String],
        mut pkgs: Vec<Package>,
    ) -> DriverResult<DriverResponse> {
        let rewriter = PathRewriter::new(root, &self.options.subrepo_dir, &self.options.gen_dir);
        for pkg in &mut pkgs {
            rewriter.rewrite_package(pkg)?;
        }
        let dirs: BTreeSet<String> = relative.iter().map(|f| parent_dir(f).to_string()).collect();
        let roots = rewriter.detect_roots(&pkgs, &dirs);
        debug!("{} root packages of {}", roots.len(), pkgs.len());

        // A runtime package means the standard library came with the sidecars
        if !pkgs.iter().any(|pkg| pkg.id == "runtime") {
            pkgs.extend(self.go.list_std()?);
        }

        let arch = request
            .env_var("GOARCH")
            .map(str::to_string)
            .unwrap_or_else(|| BuildContext::host().goarch);
        Ok(DriverResponse {
            not_handled: false,
            compiler: "gc".to_string(),
            arch,
            sizes: Some(Sizes {
                word_size: 8,
                max_align: 8,
            }),
            roots,
            packages: pkgs,
        })
    }

    fn warn_unsupported(&self, request: &DriverRequest) {
        if request.mode.wants_types() {
            warn!("type information was requested but is not provided by this driver");
        }
        if !request.overlay.is_empty() {
            debug!("ignoring {} overlay entries", request.overlay.len());
        }
    }

    /// Absolute Go files for the arguments, expanding directories
    fn go_files(&self, args: &[String], include_tests: bool) -> DriverResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for arg in args {
            let path = self.options.working_dir.join(arg);
            let meta = std::fs::metadata(&path).map_err(|e| DriverError::io(&path, e))?;
            if !meta.is_dir() {
                files.push(path);
                continue;
            }
            let mut in_dir = Vec::new();
            for entry in std::fs::read_dir(&path).map_err(|e| DriverError::io(&path, e))? {
                let entry = entry.map_err(|e| DriverError::io(&path, e))?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.ends_with(".go") && (include_tests || !name.ends_with("_test.go")) {
                    in_dir.push(entry.path());
                }
            }
            in_dir.sort();
            files.extend(in_dir);
        }
        Ok(files)
    }
}

/// Slash-separated paths of `files` relative to `root`
fn relative_files(root: &Path, files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .map(|file| {
            file.strip_prefix(root)
                .unwrap_or(file)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_mode_is_a_bitmask() {
        let request: DriverRequest = serde_json::from_str(
            r#"{"mode": 8223, "env": ["GOARCH=amd64", "GOARCH=arm64"], "tests": true, "overlay": {}}"#,
        )
        .unwrap();
        assert!(request.mode.contains(LoadMode::NEED_NAME | LoadMode::NEED_MODULE));
        assert!(!request.mode.wants_types());
        assert!(request.tests);
        assert_eq!(request.env_var("GOARCH"), Some("arm64"));
        assert_eq!(request.env_var("GOOS"), None);
    }

    #[test]
    fn unknown_mode_bits_are_kept() {
        let request: DriverRequest = serde_json::from_str(r#"{"mode": 4096}"#).unwrap();
        assert_eq!(request.mode.bits(), 4096);
    }

    #[test]
    fn not_handled_response_json() {
        let json = serde_json::to_value(DriverResponse::not_handled()).unwrap();
        assert_eq!(json, serde_json::json!({ "NotHandled": true, "Packages": [] }));
    }

    #[test]
    fn test_relative_files() {
        let files = vec![PathBuf::from("/repo/pkg/a.go"), PathBuf::from("/repo/b.go")];
        assert_eq!(relative_files(Path::new("/repo"), &files), vec!["pkg/a.go", "b.go"]);
    }
}
