//! Input/Output handling for the command line entry points.
//!
//! Both binaries report hard errors as a single diagnostic line and exit with
//! one of the codes defined here.

pub mod exit_code;

pub use exit_code::ExitCode;
