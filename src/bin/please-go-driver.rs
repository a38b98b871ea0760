//! Go package driver for Please.
//!
//! Point `GOPACKAGESDRIVER` at this binary and tools built on the Go
//! package-loading protocol will ask it, instead of `go list`, which
//! packages their files belong to.

use anyhow::{Context, Result};
use clap::Parser;
use please_go::driver::{
    Driver, DriverOptions, DriverRequest, DriverResponse, GoTool, LoadMode, Please, StderrMode,
};
use please_go::io::ExitCode;
use please_go::logging::init_logging;
use please_go::Settings;
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;

/// Please Go package driver
#[derive(Parser)]
#[command(
    name = "please-go-driver",
    version = env!("CARGO_PKG_VERSION"),
    about = "Go package driver for the Please build system"
)]
struct Cli {
    /// Verbosity of output (error, warn, info, debug, trace)
    #[arg(short, long)]
    verbosity: Option<String>,

    /// Assume a default request and don't read one from stdin
    #[arg(short = 'n', long = "no_input")]
    no_input: bool,

    /// Working directory to run in
    #[arg(short = 'w', long = "working_dir")]
    working_dir: Option<PathBuf>,

    /// File to write the response to, in addition to stdout
    #[arg(short = 'o', long = "output_file", env = "PLZ_GOPACKAGESDRIVER_OUTPUT_FILE")]
    output_file: Option<PathBuf>,

    /// Read existing package info files under this directory instead of
    /// building them
    #[arg(long = "search_dir")]
    search_dir: Option<PathBuf>,

    /// Files or directories to load packages for
    files: Vec<String>,
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::Success.into(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from_error(&e).into()
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::load().map_err(|e| anyhow::Error::new(*e))?;
    init_logging(cli.verbosity.as_deref().unwrap_or(&settings.log_level));
    let working_dir = match cli.working_dir {
        Some(dir) => dir,
        None => std::env::current_dir().context("failed to get the working directory")?,
    };

    let request = if cli.no_input {
        DriverRequest {
            mode: LoadMode::NEED_EXPORT_FILE,
            ..DriverRequest::default()
        }
    } else {
        let request: DriverRequest = serde_json::from_reader(std::io::stdin().lock())
            .map_err(please_go::DriverError::from)
            .context("failed to read request")?;
        debug!("received driver request: {request:?}");
        request
    };

    let driver = Driver::new(
        DriverOptions::from_settings(&settings, working_dir),
        Please::new(&settings.build_tool.binary, StderrMode::detect()),
        GoTool::new(&settings.go.tool),
    );
    let response = match &cli.search_dir {
        Some(search_dir) => driver.load_offline(&request, search_dir, &cli.files),
        None => driver.load(&request, &cli.files),
    }
    .context("failed to load packages")?;

    write_response(&response, cli.output_file.as_deref())
}

fn write_response(response: &DriverResponse, output_file: Option<&std::path::Path>) -> Result<()> {
    let json = to_json(response)?;
    if let Some(path) = output_file {
        std::fs::write(path, &json)
            .with_context(|| format!("failed to write output file {}", path.display()))?;
    }
    let mut out = std::io::stdout().lock();
    out.write_all(&json)?;
    writeln!(out)?;
    Ok(())
}

/// JSON with four-space indentation
fn to_json(response: &DriverResponse) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    serde::Serialize::serialize(response, &mut serializer)?;
    Ok(buf)
}
