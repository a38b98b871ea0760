//! Go package importer
//!
//! A small replacement for Go's `go/build`: decides which files in a
//! directory make up a package for a given [`BuildContext`] and extracts
//! imports, cgo flags and embed patterns from them.

pub mod constraint;
pub mod context;
pub mod package;
pub mod source;

pub use constraint::Constraint;
pub use context::{BuildContext, KNOWN_ARCH, KNOWN_OS};
pub use package::Package;
pub use source::{GoFileInfo, SourceScanner};
