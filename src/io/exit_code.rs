//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success - operation completed (including "not handled" driver replies)
//! - `1`: General error - unspecified failure
//! - `2`: Blocking error - the repository is in a state that cannot be merged automatically
//! - `3-125`: Specific errors
//! - `126-255`: Reserved by shell

use crate::error::{
    BuildFileError, DriverError, GenerateError, ImportError, ManifestError, PackageInfoError,
};

/// Standard exit codes for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Ambiguous build file state that needs a human (code 2)
    BlockingError = 2,

    /// Failed to parse Go sources, manifests or build files (code 4)
    ParseError = 4,

    /// File I/O error (code 5)
    IoError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,

    /// The build tool or Go toolchain failed (code 7)
    SubprocessError = 7,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl ExitCode {
    /// Map an error chain produced by a CLI command to an exit code.
    ///
    /// The first error in the chain that belongs to this crate decides the code.
    pub fn from_error(error: &anyhow::Error) -> Self {
        for cause in error.chain() {
            if let Some(e) = cause.downcast_ref::<GenerateError>() {
                return Self::from_generate_error(e);
            }
            if let Some(e) = cause.downcast_ref::<DriverError>() {
                return Self::from_driver_error(e);
            }
            if let Some(e) = cause.downcast_ref::<PackageInfoError>() {
                return match e {
                    PackageInfoError::Import(e) => Self::from_import_error(e),
                    PackageInfoError::Io { .. } => ExitCode::IoError,
                    PackageInfoError::Json(_) | PackageInfoError::InvalidExportFile { .. } => {
                        ExitCode::ParseError
                    }
                };
            }
            if let Some(e) = cause.downcast_ref::<ManifestError>() {
                return Self::from_manifest_error(e);
            }
            if let Some(e) = cause.downcast_ref::<ImportError>() {
                return Self::from_import_error(e);
            }
            if let Some(e) = cause.downcast_ref::<BuildFileError>() {
                return Self::from_build_file_error(e);
            }
            if cause.downcast_ref::<figment::Error>().is_some() {
                return ExitCode::ConfigError;
            }
        }
        ExitCode::GeneralError
    }

    fn from_generate_error(error: &GenerateError) -> Self {
        match error {
            GenerateError::Manifest(e) => Self::from_manifest_error(e),
            GenerateError::Import(e) => Self::from_import_error(e),
            GenerateError::BuildFile(e) => Self::from_build_file_error(e),
            GenerateError::Io { .. } | GenerateError::Walk { .. } => ExitCode::IoError,
            GenerateError::TooManyPrimaryRules { .. } | GenerateError::TooManyLibraries { .. } => {
                ExitCode::BlockingError
            }
            GenerateError::InstallNotFound { .. } | GenerateError::MissingBuildFile { .. } => {
                ExitCode::ConfigError
            }
        }
    }

    fn from_driver_error(error: &DriverError) -> Self {
        match error {
            DriverError::Spawn { .. } | DriverError::Subprocess { .. } => ExitCode::SubprocessError,
            DriverError::Io { .. } => ExitCode::IoError,
            DriverError::Decode { .. } | DriverError::Request(_) => ExitCode::ParseError,
            DriverError::PackageInfo(_) => ExitCode::ParseError,
        }
    }

    fn from_manifest_error(error: &ManifestError) -> Self {
        match error {
            ManifestError::Read { .. } => ExitCode::IoError,
            ManifestError::Syntax { .. } => ExitCode::ParseError,
            ManifestError::Host { source, .. } | ManifestError::Module { source, .. } => {
                Self::from_manifest_error(source)
            }
        }
    }

    fn from_import_error(error: &ImportError) -> Self {
        match error {
            ImportError::ReadDir { .. } | ImportError::ReadFile { .. } => ExitCode::IoError,
            _ => ExitCode::ParseError,
        }
    }

    fn from_build_file_error(error: &BuildFileError) -> Self {
        match error {
            BuildFileError::Read { .. } | BuildFileError::Write { .. } => ExitCode::IoError,
            BuildFileError::Syntax { .. } => ExitCode::ParseError,
            BuildFileError::NoCandidate { .. } => ExitCode::ConfigError,
        }
    }

    /// Check if this exit code indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// Get a human-readable description of the exit code.
    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::BlockingError => "Blocking error - manual edit required",
            ExitCode::ParseError => "Parse error",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::SubprocessError => "Subprocess failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success as u8, 0);
        assert_eq!(ExitCode::GeneralError as u8, 1);
        assert_eq!(ExitCode::BlockingError as u8, 2);
        assert_eq!(ExitCode::SubprocessError as u8, 7);
    }

    #[test]
    fn test_ambiguous_build_file_is_blocking() {
        let err = anyhow::Error::new(GenerateError::TooManyPrimaryRules {
            path: PathBuf::from("foo/BUILD"),
            kind: "go_library".to_string(),
        })
        .context("failed to update foo");
        assert_eq!(ExitCode::from_error(&err), ExitCode::BlockingError);
    }

    #[test]
    fn test_subprocess_failure_maps_through_context() {
        let err = anyhow::Error::new(DriverError::Subprocess {
            command: "plz build -".to_string(),
            status: "exit status: 1".to_string(),
            stderr: "boom".to_string(),
        })
        .context("Failed to load packages");
        assert_eq!(ExitCode::from_error(&err), ExitCode::SubprocessError);
    }

    #[test]
    fn test_unknown_error_is_general() {
        let err = anyhow::anyhow!("something else");
        assert_eq!(ExitCode::from_error(&err), ExitCode::GeneralError);
        assert!(!ExitCode::from_error(&err).is_success());
    }
}
