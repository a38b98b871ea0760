//! Go tooling for the Please build system
//!
//! - [`generate`] writes BUILD files for a Go module's source tree
//! - [`packageinfo`] describes compiled packages in JSON sidecar files
//! - [`driver`] answers Go package-loading requests from those sidecars
//!
//! All three share the import resolution in [`resolver`], the Go package
//! importer in [`gopkg`] and the go.mod reader in [`modfile`].

pub mod buildfile;
pub mod config;
pub mod driver;
pub mod error;
pub mod generate;
pub mod gopkg;
pub mod io;
pub mod logging;
pub mod modfile;
pub mod packageinfo;
pub mod resolver;

// Explicit exports for better API clarity
pub use config::Settings;
pub use driver::{Driver, DriverRequest, DriverResponse, LoadMode};
pub use error::{
    BuildFileError, BuildFileResult, DriverError, DriverResult, GenerateError, GenerateResult,
    ImportError, ImportResult, ManifestError, ManifestResult, PackageInfoError, PackageInfoResult,
};
pub use generate::{GenerateOptions, Generator};
pub use gopkg::BuildContext;
pub use resolver::ImportTargetResolver;
