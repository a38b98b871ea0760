//! CLI entry point for the Please Go tooling.
//!
//! Subcommands generate BUILD files for Go modules, describe packages for the
//! package driver and filter sources by build constraints.

use anyhow::{Context, Result, anyhow};
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use please_go::gopkg::BuildContext;
use please_go::io::ExitCode;
use please_go::logging::init_logging;
use please_go::modfile::{ModFile, ParseMode};
use please_go::packageinfo::{
    ModuleInfoOptions, PackageInfoOptions, module_info, package_info, write_packages,
};
use please_go::{GenerateOptions, Generator, Settings};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

/// Go tooling for the Please build system
#[derive(Parser)]
#[command(
    name = "please-go",
    version = env!("CARGO_PKG_VERSION"),
    about = "Go tooling for the Please build system",
    long_about = "Generates BUILD files for Go modules, writes package info for the \
                  package driver and filters sources by build constraints.",
    next_line_help = true,
    styles = clap_cargo_style()
)]
struct Cli {
    /// Path to a custom please_go.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity of output (error, warn, info, debug, trace)
    #[arg(short, long, global = true)]
    verbosity: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Generate build targets for a Go module
    #[command(alias = "g")]
    Generate {
        /// Source root of the module to inspect
        #[arg(short = 'r', long = "src_root", default_value = ".")]
        src_root: PathBuf,

        /// Import path of the module; read from its go.mod when unset
        #[arg(long = "import_path")]
        import_path: Option<String>,

        /// Folder containing the third party subrepos
        #[arg(short = 't', long = "third_party_folder")]
        third_party_folder: Option<String>,

        /// Host repository go.mod, authoritative for dependencies and replacements
        #[arg(long = "mod_file")]
        mod_file: Option<PathBuf>,

        /// Name of the current module
        #[arg(long)]
        module: Option<String>,

        /// Version of the current module
        #[arg(long)]
        version: Option<String>,

        /// Packages to add to the installs filegroup (`dir/...` for a subtree)
        #[arg(long)]
        install: Vec<String>,

        /// Build tags to apply
        #[arg(long = "build_tag")]
        build_tags: Vec<String>,

        /// Labels to add to generated rules
        #[arg(long = "label")]
        labels: Vec<String>,

        /// Module requirements not listed in go.mod
        requirements: Vec<String>,
    },

    /// Refresh the rules of existing build files
    #[command(alias = "u")]
    Update {
        /// Source root the paths are relative to
        #[arg(short = 'r', long = "src_root", default_value = ".")]
        src_root: PathBuf,

        /// Import path of the module; read from its go.mod when unset
        #[arg(long = "import_path")]
        import_path: Option<String>,

        /// Host repository go.mod
        #[arg(long = "mod_file")]
        mod_file: Option<PathBuf>,

        /// Build tags to apply
        #[arg(long = "build_tag")]
        build_tags: Vec<String>,

        /// Directories, build files or `dir/...` subtrees to update
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Create an info file about a Go package
    #[command(name = "package-info", alias = "package_info", alias = "p")]
    PackageInfo {
        /// Go import path of the repository or module
        #[arg(short = 'i', long = "import_path", default_value = "")]
        import_path: String,

        /// Package directory within the repository
        #[arg(long, env = "PKG_DIR", default_value = "")]
        pkg: String,

        /// Existing import mappings, `import/path=ID`
        #[arg(short = 'm', long = "import_map", value_parser = parse_key_val)]
        import_map: Vec<(String, String)>,

        /// Subrepo root this package is within
        #[arg(short = 's', long, default_value = "")]
        subrepo: String,

        /// Module (`path@version`) this package belongs to
        #[arg(long = "mod")]
        module: Option<String>,

        /// Compiled archive of the package, relative to the repository root
        #[arg(long = "export_file")]
        export_file: Option<String>,

        /// Go sources; the package directory is scanned when none are given
        srcs: Vec<String>,
    },

    /// Create an info file about the packages of a go_module
    #[command(name = "module-info", alias = "module_info", alias = "m")]
    ModuleInfo {
        /// Import path of the module
        #[arg(short = 'm', long = "module_path")]
        module_path: String,

        /// Root of the module sources
        #[arg(long, env = "SRCS_SRCS")]
        srcs: PathBuf,

        /// Import config locating the compiled archives
        #[arg(long, env = "SRCS_IC")]
        importconfig: Option<PathBuf>,

        /// Packages to include in the module
        #[arg(short = 'p', long = "packages")]
        packages: Vec<String>,
    },

    /// Filter Go sources by build constraints
    #[command(alias = "f")]
    Filter {
        /// Additional build tags to apply
        #[arg(short = 't', long = "tags")]
        tags: Vec<String>,

        /// Source files to filter
        sources: Vec<String>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e:#}");
            return ExitCode::ConfigError.into();
        }
    };
    init_logging(cli.verbosity.as_deref().unwrap_or(&settings.log_level));

    match run(cli.command, &settings) {
        Ok(()) => ExitCode::Success.into(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from_error(&e).into()
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = match path {
        Some(path) => Settings::load_from(path)
            .map_err(|e| anyhow::Error::new(*e))
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Settings::load().map_err(|e| anyhow::Error::new(*e))?,
    };
    Ok(settings)
}

fn run(command: Commands, settings: &Settings) -> Result<()> {
    match command {
        Commands::Generate {
            src_root,
            import_path,
            third_party_folder,
            mod_file,
            module,
            version,
            install,
            build_tags,
            labels,
            requirements,
        } => {
            let module = module_path(&src_root, import_path.or(module))?;
            let mut options = GenerateOptions::from_settings(settings, &src_root, module);
            options.version = version;
            options.host_mod_file = mod_file;
            options.module_deps = requirements;
            options.install = install;
            options.labels.extend(labels);
            if let Some(folder) = third_party_folder {
                options.third_party_folder = folder;
            }
            let context = settings.go.build_context(&build_tags);
            let mut generator = Generator::new(options, context);
            generator
                .generate()
                .with_context(|| format!("failed to generate go rules in {}", src_root.display()))
        }
        Commands::Update {
            src_root,
            import_path,
            mod_file,
            build_tags,
            paths,
        } => {
            let module = module_path(&src_root, import_path)?;
            let mut options = GenerateOptions::from_settings(settings, &src_root, module);
            options.host_mod_file = mod_file;
            let mut generator = Generator::new(options, settings.go.build_context(&build_tags));
            generator.load_manifests()?;
            generator.update(&paths).context("failed to update build files")
        }
        Commands::PackageInfo {
            import_path,
            pkg,
            import_map,
            subrepo,
            module,
            export_file,
            srcs,
        } => {
            let options = PackageInfoOptions {
                import_path,
                pkg,
                subrepo,
                module,
                import_map: import_map.into_iter().collect::<HashMap<_, _>>(),
                srcs,
                export_file,
            };
            let pkg = package_info(&options, &settings.go.build_context(&[]))
                .context("failed to write package info")?;
            write_packages(std::io::stdout().lock(), &[pkg])?;
            Ok(())
        }
        Commands::ModuleInfo {
            module_path,
            srcs,
            importconfig,
            packages,
        } => {
            let options = ModuleInfoOptions {
                module_path,
                src_root: srcs,
                import_config: importconfig,
                packages,
            };
            let pkgs = module_info(&options, &settings.go.build_context(&[]))
                .context("failed to write module info")?;
            write_packages(std::io::stdout().lock(), &pkgs)?;
            Ok(())
        }
        Commands::Filter { tags, sources } => filter(&settings.go.build_context(&tags), &sources),
    }
}

/// Module import path: given explicitly, or from the `module` line of go.mod
fn module_path(src_root: &Path, explicit: Option<String>) -> Result<String> {
    if let Some(module) = explicit {
        return Ok(module);
    }
    let manifest = ModFile::read(&src_root.join("go.mod"), ParseMode::Lax)?;
    manifest
        .module
        .ok_or_else(|| anyhow!("no module path given and none declared in {}/go.mod", src_root.display()))
}

/// Print the sources that match the build context
fn filter(context: &BuildContext, sources: &[String]) -> Result<()> {
    let mut out = std::io::stdout().lock();
    for source in sources {
        let path = Path::new(source);
        let dir = path.parent().unwrap_or(Path::new(""));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        // Generated cgo files start with an underscore but always belong
        let keep = name.starts_with("_cgo_")
            || context
                .match_file(dir, &name)
                .with_context(|| format!("error checking {source}"))?;
        if keep {
            writeln!(out, "{source}")?;
        }
    }
    Ok(())
}
