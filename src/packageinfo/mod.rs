//! Package-info sidecar records
//!
//! Build actions describe each Go package they compile in a small JSON file
//! (a "sidecar") that the package driver later collects. The records use the
//! field names of the Go package-loading protocol so they can be handed to
//! tools unchanged.

pub mod writer;

pub use writer::{ModuleInfoOptions, PackageInfoOptions, module_info, package_info, write_packages};

use crate::error::{PackageInfoError, PackageInfoResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// One package, as written to a sidecar file and returned by the driver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Package {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pkg_path: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub go_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compiled_go_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub other_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embed_patterns: Vec<String>,
    /// Raw export file field; see [`ExportFile`] for its encoding
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub export_file: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub imports: BTreeMap<String, PackageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<Module>,
}

impl Package {
    /// Decode the export file field; `None` when the package has none
    pub fn export(&self) -> PackageInfoResult<Option<ExportFile>> {
        ExportFile::decode(&self.export_file)
    }
}

/// Reference to an imported package by ID only; the full record is
/// elsewhere in the package list
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageRef {
    pub id: String,
}

impl PackageRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Module {
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
}

impl Module {
    /// Parse `path@version` (the version is optional)
    pub fn parse(spec: &str) -> Self {
        match spec.split_once('@') {
            Some((path, version)) => Self {
                path: path.to_string(),
                version: version.to_string(),
            },
            None => Self {
                path: spec.to_string(),
                version: String::new(),
            },
        }
    }
}

/// The two locations of a compiled package archive.
///
/// Sidecars carry both in one string, `<subrepo path>|<repo path>`: the first
/// is relative to the subrepo the package was built in, the second to the
/// repository root's build output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub subrepo_path: String,
    pub repo_path: String,
}

impl ExportFile {
    pub fn new(subrepo_path: impl Into<String>, repo_path: impl Into<String>) -> Self {
        Self {
            subrepo_path: subrepo_path.into(),
            repo_path: repo_path.into(),
        }
    }

    pub fn encode(&self) -> String {
        format!("{}|{}", self.subrepo_path, self.repo_path)
    }

    pub fn decode(value: &str) -> PackageInfoResult<Option<Self>> {
        if value.is_empty() {
            return Ok(None);
        }
        match value.split_once('|') {
            Some((subrepo, repo)) => Ok(Some(Self::new(subrepo, repo))),
            None => Err(PackageInfoError::InvalidExportFile {
                value: value.to_string(),
            }),
        }
    }
}

/// A package record as printed by `go list -json`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GoListPackage {
    pub dir: String,
    pub import_path: String,
    pub name: String,
    pub export: String,
    pub go_files: Vec<String>,
    pub cgo_files: Vec<String>,
    pub c_files: Vec<String>,
    pub cxx_files: Vec<String>,
    pub h_files: Vec<String>,
    pub s_files: Vec<String>,
    pub syso_files: Vec<String>,
    pub imports: Vec<String>,
    pub embed_patterns: Vec<String>,
    pub module: Option<GoListModule>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct GoListModule {
    pub path: String,
    pub version: String,
}

/// Convert a `go list` record; file paths become absolute under its `Dir`
pub fn from_go_list(pkg: GoListPackage) -> Package {
    let dir = Path::new(&pkg.dir);
    let join = |files: &[String]| -> Vec<String> {
        files
            .iter()
            .map(|f| dir.join(f).to_string_lossy().into_owned())
            .collect()
    };

    let go_files = join(&pkg.go_files);
    let mut other_files = Vec::new();
    for files in [&pkg.c_files, &pkg.cxx_files, &pkg.h_files, &pkg.s_files, &pkg.syso_files] {
        other_files.extend(join(files));
    }

    Package {
        id: pkg.import_path.clone(),
        name: pkg.name,
        pkg_path: pkg.import_path,
        compiled_go_files: go_files.clone(),
        go_files,
        other_files,
        embed_patterns: pkg.embed_patterns,
        export_file: pkg.export,
        imports: pkg
            .imports
            .into_iter()
            .map(|imp| (imp.clone(), PackageRef::new(imp)))
            .collect(),
        module: pkg.module.map(|m| Module {
            path: m.path,
            version: m.version,
        }),
    }
}

/// Parse the concatenated JSON objects `go list -json` prints
pub fn parse_go_list(output: &str) -> PackageInfoResult<Vec<Package>> {
    serde_json::Deserializer::from_str(output)
        .into_iter::<GoListPackage>()
        .map(|pkg| -> PackageInfoResult<Package> { Ok(from_go_list(pkg?)) })
        .collect()
}
