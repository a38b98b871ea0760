//! Error types for the Go build integration tooling
//!
//! This module provides structured error types using thiserror. Each subsystem
//! has its own enum and result alias; binaries wrap them with anyhow context.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading go.mod manifests
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read manifest '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}:{line}: {reason}")]
    Syntax {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("failed to read host repo go.mod '{path}': {source}")]
    Host {
        path: PathBuf,
        #[source]
        source: Box<ManifestError>,
    },

    #[error("failed to read module go.mod '{path}': {source}")]
    Module {
        path: PathBuf,
        #[source]
        source: Box<ManifestError>,
    },
}

impl ManifestError {
    /// True when the manifest file simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }

    pub fn status_code(&self) -> String {
        match self {
            Self::Read { .. } => "MANIFEST_READ_ERROR",
            Self::Syntax { .. } => "MANIFEST_SYNTAX_ERROR",
            Self::Host { .. } => "HOST_MANIFEST_ERROR",
            Self::Module { .. } => "MODULE_MANIFEST_ERROR",
        }
        .to_string()
    }
}

/// Errors raised while importing a directory as a Go package
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to read directory '{path}': {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The directory has no buildable Go files under the current build context.
    #[error("no buildable Go source files in {dir}{}", excluded_suffix(.excluded))]
    NoGoFiles { dir: PathBuf, excluded: bool },

    #[error("found packages {names:?} in {dir} ({files:?})")]
    MultiplePackages {
        dir: PathBuf,
        names: Vec<String>,
        files: Vec<String>,
    },

    #[error("{file}: invalid build constraint: {reason}")]
    InvalidConstraint { file: PathBuf, reason: String },

    #[error("Failed to parse Go file '{file}': {reason}")]
    Parse { file: PathBuf, reason: String },

    #[error("Failed to initialize Go parser: {reason}")]
    ParserInit { reason: String },

    #[error("{file}: invalid #cgo line: {line}")]
    InvalidCgoDirective { file: PathBuf, line: String },
}

fn excluded_suffix(excluded: &bool) -> &'static str {
    if *excluded {
        " (build constraints exclude all Go files)"
    } else {
        ""
    }
}

impl ImportError {
    pub fn is_no_go(&self) -> bool {
        matches!(self, Self::NoGoFiles { .. })
    }

    pub fn status_code(&self) -> String {
        match self {
            Self::ReadDir { .. } | Self::ReadFile { .. } => "IMPORT_IO_ERROR",
            Self::NoGoFiles { .. } => "NO_GO_FILES",
            Self::MultiplePackages { .. } => "MULTIPLE_PACKAGES",
            Self::InvalidConstraint { .. } => "INVALID_BUILD_CONSTRAINT",
            Self::Parse { .. } => "GO_PARSE_ERROR",
            Self::ParserInit { .. } => "PARSER_INIT_ERROR",
            Self::InvalidCgoDirective { .. } => "INVALID_CGO_DIRECTIVE",
        }
        .to_string()
    }
}

/// Errors raised while reading, parsing or writing BUILD files
#[derive(Error, Debug)]
pub enum BuildFileError {
    #[error("Failed to read build file '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write build file '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}:{line}:{column}: {reason}")]
    Syntax {
        path: PathBuf,
        line: usize,
        column: usize,
        reason: String,
    },

    #[error("folders exist with the build file names in directory {dir} {names:?}")]
    NoCandidate { dir: PathBuf, names: Vec<String> },
}

impl BuildFileError {
    pub fn status_code(&self) -> String {
        match self {
            Self::Read { .. } => "BUILD_FILE_READ_ERROR",
            Self::Write { .. } => "BUILD_FILE_WRITE_ERROR",
            Self::Syntax { .. } => "BUILD_FILE_SYNTAX_ERROR",
            Self::NoCandidate { .. } => "BUILD_FILE_NAME_CONFLICT",
        }
        .to_string()
    }
}

/// Errors raised by the BUILD file generator
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    BuildFile(#[from] BuildFileError),

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to walk '{path}': {reason}")]
    Walk { path: PathBuf, reason: String },

    #[error("too many {kind} rules in {path}")]
    TooManyPrimaryRules { path: PathBuf, kind: String },

    #[error("more than one go library in installed package {path}")]
    TooManyLibraries { path: PathBuf },

    #[error("couldn't find install package {pattern}")]
    InstallNotFound { pattern: String },

    #[error("failed to find build file in {dir}")]
    MissingBuildFile { dir: PathBuf },
}

impl GenerateError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn status_code(&self) -> String {
        match self {
            Self::Manifest(e) => e.status_code(),
            Self::Import(e) => e.status_code(),
            Self::BuildFile(e) => e.status_code(),
            Self::Io { .. } | Self::Walk { .. } => "GENERATE_IO_ERROR".to_string(),
            Self::TooManyPrimaryRules { .. } | Self::TooManyLibraries { .. } => {
                "AMBIGUOUS_BUILD_FILE".to_string()
            }
            Self::InstallNotFound { .. } => "INSTALL_NOT_FOUND".to_string(),
            Self::MissingBuildFile { .. } => "MISSING_BUILD_FILE".to_string(),
        }
    }
}

/// Errors raised while writing or decoding package info sidecar files
#[derive(Error, Debug)]
pub enum PackageInfoError {
    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode package info: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid export file '{value}': expected '<subrepo path>|<repo path>'")]
    InvalidExportFile { value: String },
}

impl PackageInfoError {
    pub fn status_code(&self) -> String {
        match self {
            Self::Import(e) => e.status_code(),
            Self::Io { .. } => "PACKAGE_INFO_IO_ERROR".to_string(),
            Self::Json(_) => "PACKAGE_INFO_JSON_ERROR".to_string(),
            Self::InvalidExportFile { .. } => "INVALID_EXPORT_FILE".to_string(),
        }
    }
}

/// Errors raised by the package driver
#[derive(Error, Debug)]
pub enum DriverError {
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("'{command}' failed ({status}) Stderr:\n{stderr}")]
    Subprocess {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("failed to decode package info from {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error(transparent)]
    PackageInfo(#[from] PackageInfoError),

    #[error("invalid driver request: {0}")]
    Request(#[from] serde_json::Error),
}

impl DriverError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn status_code(&self) -> String {
        match self {
            Self::Io { .. } => "DRIVER_IO_ERROR".to_string(),
            Self::Spawn { .. } | Self::Subprocess { .. } => "SUBPROCESS_FAILED".to_string(),
            Self::Decode { .. } => "SIDECAR_DECODE_ERROR".to_string(),
            Self::PackageInfo(e) => e.status_code(),
            Self::Request(_) => "INVALID_REQUEST".to_string(),
        }
    }

    /// Recovery suggestions shown alongside the diagnostic
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Spawn { .. } => vec![
                "Check that the build tool and the go tool are on PATH",
                "Override the binaries with PLEASE_GO_BUILD_TOOL__BINARY or PLEASE_GO_GO__TOOL",
            ],
            Self::Subprocess { .. } => {
                vec!["Re-run the failing command by hand to see the full diagnostic"]
            }
            Self::Decode { .. } => vec!["Rebuild the package info targets; the sidecar may be stale"],
            _ => vec![],
        }
    }
}

/// Result type alias for manifest parsing
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Result type alias for Go package imports
pub type ImportResult<T> = Result<T, ImportError>;

/// Result type alias for build file operations
pub type BuildFileResult<T> = Result<T, BuildFileError>;

/// Result type alias for generator operations
pub type GenerateResult<T> = Result<T, GenerateError>;

/// Result type alias for package info operations
pub type PackageInfoResult<T> = Result<T, PackageInfoError>;

/// Result type alias for driver operations
pub type DriverResult<T> = Result<T, DriverError>;
