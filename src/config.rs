//! Configuration module for the Go build tooling.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`please_go.toml`)
//! - Environment variable overrides
//! - CLI argument overrides (applied by the binaries)
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `PLEASE_GO_` and use double
//! underscores to separate nested levels:
//! - `PLEASE_GO_DRIVER__WORKERS=4` sets `driver.workers`
//! - `PLEASE_GO_BUILD_TOOL__BINARY=plz-next` sets `build_tool.binary`
//! - `PLEASE_GO_GO__CGO_ENABLED=false` sets `go.cgo_enabled`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::gopkg::BuildContext;

/// Name of the settings file looked up from the working directory upwards
pub const SETTINGS_FILE: &str = "please_go.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Default log level for both binaries
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Build tool invocation and output layout
    #[serde(default)]
    pub build_tool: BuildToolConfig,

    /// Go toolchain and build context
    #[serde(default)]
    pub go: GoConfig,

    /// BUILD file generation
    #[serde(default)]
    pub generate: GenerateConfig,

    /// Package driver
    #[serde(default)]
    pub driver: DriverConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BuildToolConfig {
    /// Build tool binary, resolved from PATH
    #[serde(default = "default_build_tool")]
    pub binary: String,

    /// Generated output area, relative to the repository root
    #[serde(default = "default_gen_dir")]
    pub gen_dir: PathBuf,

    /// Subrepo output area, relative to the repository root
    #[serde(default = "default_subrepo_dir")]
    pub subrepo_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GoConfig {
    /// Go binary used for `go list std`
    #[serde(default = "default_go_tool")]
    pub tool: String,

    /// Target OS; host OS (or `$GOOS`) when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goos: Option<String>,

    /// Target architecture; host arch (or `$GOARCH`) when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goarch: Option<String>,

    /// Minor Go version, enables release tags go1.1 through go1.N
    #[serde(default = "default_version_minor")]
    pub version_minor: u32,

    #[serde(default = "default_true")]
    pub cgo_enabled: bool,

    /// Extra build tags applied to every import
    #[serde(default)]
    pub build_tags: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GenerateConfig {
    /// Folder holding third party subrepos
    #[serde(default = "default_third_party_folder")]
    pub third_party_folder: String,

    /// Candidate build file names, first existing one wins
    #[serde(default = "default_build_file_names")]
    pub build_file_names: Vec<String>,

    /// Plugin target written into the module's `.plzconfig`
    #[serde(default = "default_plugin_target")]
    pub plugin_target: String,

    /// Labels applied to generated rules
    #[serde(default)]
    pub labels: Vec<String>,

    /// Directory searched for `.importconfig` override files
    #[serde(default = "default_import_config_root")]
    pub import_config_root: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DriverConfig {
    /// Concurrent sidecar readers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Suffix identifying package info sidecar files
    #[serde(default = "default_sidecar_suffix")]
    pub sidecar_suffix: String,
}

// Default value functions
fn default_log_level() -> String {
    "warn".to_string()
}
fn default_build_tool() -> String {
    "plz".to_string()
}
fn default_gen_dir() -> PathBuf {
    PathBuf::from("plz-out/gen")
}
fn default_subrepo_dir() -> PathBuf {
    PathBuf::from("plz-out/subrepos")
}
fn default_go_tool() -> String {
    "go".to_string()
}
fn default_version_minor() -> u32 {
    22
}
fn default_true() -> bool {
    true
}
fn default_third_party_folder() -> String {
    "third_party/go".to_string()
}
fn default_build_file_names() -> Vec<String> {
    vec!["BUILD".to_string(), "BUILD.plz".to_string()]
}
fn default_plugin_target() -> String {
    "@//plugins:go".to_string()
}
fn default_import_config_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_workers() -> usize {
    8
}
fn default_sidecar_suffix() -> String {
    "_pkg_info.json".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            build_tool: BuildToolConfig::default(),
            go: GoConfig::default(),
            generate: GenerateConfig::default(),
            driver: DriverConfig::default(),
        }
    }
}

impl Default for BuildToolConfig {
    fn default() -> Self {
        Self {
            binary: default_build_tool(),
            gen_dir: default_gen_dir(),
            subrepo_dir: default_subrepo_dir(),
        }
    }
}

impl Default for GoConfig {
    fn default() -> Self {
        Self {
            tool: default_go_tool(),
            goos: None,
            goarch: None,
            version_minor: default_version_minor(),
            cgo_enabled: true,
            build_tags: Vec::new(),
        }
    }
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            third_party_folder: default_third_party_folder(),
            build_file_names: default_build_file_names(),
            plugin_target: default_plugin_target(),
            labels: Vec::new(),
            import_config_root: default_import_config_root(),
        }
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            sidecar_suffix: default_sidecar_suffix(),
        }
    }
}

impl GoConfig {
    /// Build context for this configuration plus any extra tags
    pub fn build_context(&self, extra_tags: &[String]) -> BuildContext {
        let mut ctx = BuildContext::host();
        if let Some(goos) = self.goos.clone().or_else(|| std::env::var("GOOS").ok()) {
            ctx.goos = goos;
        }
        if let Some(goarch) = self.goarch.clone().or_else(|| std::env::var("GOARCH").ok()) {
            ctx.goarch = goarch;
        }
        ctx.cgo_enabled = self.cgo_enabled;
        ctx.release_minor = self.version_minor;
        ctx.build_tags = self
            .build_tags
            .iter()
            .chain(extra_tags)
            .cloned()
            .collect();
        ctx
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path =
            Self::find_settings_file().unwrap_or_else(|| PathBuf::from(SETTINGS_FILE));
        Self::figment(&config_path).extract().map_err(Box::new)
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Self::figment(path.as_ref()).extract().map_err(Box::new)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path))
            // Double underscore separates nested levels, single underscore stays in field names
            .merge(Env::prefixed("PLEASE_GO_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
    }

    /// Find the settings file by walking from the current directory up to root
    fn find_settings_file() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .map(|dir| dir.join(SETTINGS_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.build_tool.binary, "plz");
        assert_eq!(settings.build_tool.gen_dir, PathBuf::from("plz-out/gen"));
        assert_eq!(settings.driver.workers, 8);
        assert_eq!(settings.generate.build_file_names, vec!["BUILD", "BUILD.plz"]);
        assert_eq!(settings.generate.third_party_folder, "third_party/go");
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(SETTINGS_FILE);

        let toml_content = r#"
log_level = "debug"

[build_tool]
binary = "/opt/plz/bin/plz"

[go]
goos = "freebsd"
build_tags = ["netgo"]

[driver]
workers = 2
"#;
        fs::write(&config_path, toml_content).unwrap();

        let settings = Settings::load_from(&config_path).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.build_tool.binary, "/opt/plz/bin/plz");
        assert_eq!(settings.go.goos.as_deref(), Some("freebsd"));
        assert_eq!(settings.driver.workers, 2);
        // Untouched sections keep their defaults
        assert_eq!(settings.driver.sidecar_suffix, "_pkg_info.json");
        assert_eq!(settings.generate.plugin_target, "@//plugins:go");

        let ctx = settings.go.build_context(&["extra".to_string()]);
        assert_eq!(ctx.goos, "freebsd");
        assert_eq!(ctx.build_tags, vec!["netgo", "extra"]);
    }

    #[test]
    fn test_save_settings() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join(SETTINGS_FILE);

        let mut settings = Settings::default();
        settings.driver.workers = 3;
        settings.generate.labels = vec!["third_party".to_string()];

        settings.save(&config_path).unwrap();

        let loaded = Settings::load_from(&config_path).unwrap();
        assert_eq!(loaded.driver.workers, 3);
        assert_eq!(loaded.generate.labels, vec!["third_party"]);
    }

    #[test]
    fn test_env_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join(SETTINGS_FILE);
        fs::write(&config_path, "[driver]\nworkers = 5\nsidecar_suffix = \".info.json\"\n").unwrap();

        // Env var name is unique to this test to avoid races with parallel tests
        unsafe {
            std::env::set_var("PLEASE_GO_GENERATE__PLUGIN_TARGET", "@//tools:go");
        }
        let settings = Settings::load_from(&config_path).unwrap();
        unsafe {
            std::env::remove_var("PLEASE_GO_GENERATE__PLUGIN_TARGET");
        }

        assert_eq!(settings.generate.plugin_target, "@//tools:go");
        assert_eq!(settings.driver.workers, 5);
        assert_eq!(settings.driver.sidecar_suffix, ".info.json");
    }
}
