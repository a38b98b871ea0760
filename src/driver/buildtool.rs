//! Subprocess seams: the build tool and the Go toolchain

use crate::error::{DriverError, DriverResult};
use crate::packageinfo::{Package, parse_go_list};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;
use tracing::debug;

/// Queries and builds performed through the build tool
pub trait BuildTool {
    /// Root of the repository containing `dir`
    fn repo_root(&self, dir: &Path) -> DriverResult<PathBuf>;

    /// Build the package info of everything `files` (repo-relative) depend
    /// on and return the output paths the build reported
    fn build_package_info(&self, root: &Path, files: &[String]) -> DriverResult<Vec<String>>;
}

/// Source of standard library package records
pub trait GoToolchain {
    fn list_std(&self) -> DriverResult<Vec<Package>>;
}

/// What happens to a subprocess's standard error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StderrMode {
    /// Shown to the user as it happens
    Inherit,
    /// Buffered and attached to the error if the process fails
    Capture,
}

impl StderrMode {
    /// Inherit when our own stderr is a terminal, capture otherwise
    pub fn detect() -> Self {
        if is_terminal::is_terminal(std::io::stderr()) {
            Self::Inherit
        } else {
            Self::Capture
        }
    }
}

/// The Please build tool
pub struct Please {
    binary: String,
    stderr: StderrMode,
}

impl Please {
    pub fn new(binary: impl Into<String>, stderr: StderrMode) -> Self {
        Self {
            binary: binary.into(),
            stderr,
        }
    }

    fn command<I, S>(&self, root: &Path, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new(&self.binary);
        cmd.args(args).current_dir(root);
        cmd
    }
}

impl BuildTool for Please {
    fn repo_root(&self, dir: &Path) -> DriverResult<PathBuf> {
        let mut cmd = self.command(dir, ["query", "reporoot"]);
        let description = describe(&cmd);
        let output = cmd
            .stdin(Stdio::null())
            .output()
            .map_err(|source| DriverError::Spawn {
                command: description.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(DriverError::Subprocess {
                command: description,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(PathBuf::from(String::from_utf8_lossy(&output.stdout).trim()))
    }

    fn build_package_info(&self, root: &Path, files: &[String]) -> DriverResult<Vec<String>> {
        // whatinputs | deps | build, each stage reading the previous one's stdout
        let mut whatinputs = self.command(root, ["query", "whatinputs"]);
        whatinputs.args(files).stdin(Stdio::null());
        let mut whatinputs = Stage::spawn(whatinputs, self.stderr)?;

        let mut deps = self.command(
            root,
            ["query", "deps", "-", "--hidden", "--include", "go_pkg_info", "--include", "go_src"],
        );
        deps.stdin(whatinputs.take_stdout()?);
        let mut deps = Stage::spawn(deps, self.stderr)?;

        let mut build = self.command(root, ["build", "-"]);
        build.stdin(deps.take_stdout()?);
        let mut build = Stage::spawn(build, self.stderr)?;
        let output = read_in_background(build.take_stdout()?);

        debug!("waiting for {}", whatinputs.command);
        whatinputs.wait()?;
        debug!("waiting for {}", deps.command);
        deps.wait()?;
        debug!("waiting for {}", build.command);
        build.wait()?;

        let output = output.join().unwrap_or_default();
        Ok(output.split_whitespace().map(str::to_string).collect())
    }
}

/// The `go` tool
pub struct GoTool {
    binary: String,
}

impl GoTool {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl GoToolchain for GoTool {
    fn list_std(&self) -> DriverResult<Vec<Package>> {
        debug!("loading stdlib packages");
        let mut cmd = Command::new(&self.binary);
        cmd.args(["list", "-json", "std"]).stdin(Stdio::null());
        let description = describe(&cmd);
        let output = cmd.output().map_err(|source| DriverError::Spawn {
            command: description.clone(),
            source,
        })?;
        if !output.status.success() {
            return Err(DriverError::Subprocess {
                command: description,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(parse_go_list(&String::from_utf8_lossy(&output.stdout))?)
    }
}

/// One running process of a pipeline.
///
/// A stage that is dropped without being waited for is killed, so an early
/// failure never leaves later stages blocked on a pipe.
struct Stage {
    command: String,
    child: Option<Child>,
    stderr: Option<JoinHandle<String>>,
}

impl Stage {
    fn spawn(mut cmd: Command, stderr: StderrMode) -> DriverResult<Self> {
        let command = describe(&cmd);
        cmd.stdout(Stdio::piped());
        cmd.stderr(match stderr {
            StderrMode::Inherit => Stdio::inherit(),
            StderrMode::Capture => Stdio::piped(),
        });
        let mut child = cmd.spawn().map_err(|source| DriverError::Spawn {
            command: command.clone(),
            source,
        })?;
        // Dropping the command releases our copy of its stdin pipe, so the
        // stage sees EOF as soon as the upstream process exits
        drop(cmd);

        let stderr = child.stderr.take().map(read_in_background);
        Ok(Self {
            command,
            child: Some(child),
            stderr,
        })
    }

    fn take_stdout(&mut self) -> DriverResult<ChildStdout> {
        self.child
            .as_mut()
            .and_then(|child| child.stdout.take())
            .ok_or_else(|| DriverError::Subprocess {
                command: self.command.clone(),
                status: "no stdout".to_string(),
                stderr: String::new(),
            })
    }

    fn wait(&mut self) -> DriverResult<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child.wait().map_err(|source| DriverError::Spawn {
            command: self.command.clone(),
            source,
        })?;
        let stderr = self
            .stderr
            .take()
            .map(|handle| handle.join().unwrap_or_default())
            .unwrap_or_default();
        if status.success() {
            Ok(())
        } else {
            Err(DriverError::Subprocess {
                command: self.command.clone(),
                status: status.to_string(),
                stderr,
            })
        }
    }
}

impl Drop for Stage {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

fn read_in_background(mut stream: impl Read + Send + 'static) -> JoinHandle<String> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stream.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn describe(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|arg| arg.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let mut cmd = Command::new("plz");
        cmd.args(["query", "reporoot"]);
        assert_eq!(describe(&cmd), "plz query reporoot");
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let plz = Please::new("please-go-no-such-binary", StderrMode::Capture);
        let dir = tempfile::TempDir::new().unwrap();
        let err = plz.repo_root(dir.path()).unwrap_err();
        assert!(matches!(err, DriverError::Spawn { .. }));
    }

    #[cfg(unix)]
    fn fake_plz(dir: &Path, body: &str) -> Please {
        use std::os::unix::fs::PermissionsExt;
        let script = dir.join("fake-plz");
        std::fs::write(&script, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        Please::new(script.to_string_lossy(), StderrMode::Capture)
    }

    #[cfg(unix)]
    #[test]
    fn stages_stream_into_each_other() {
        let dir = tempfile::TempDir::new().unwrap();
        let plz = fake_plz(
            dir.path(),
            r#"case "$1 $2" in
"query whatinputs")
    i=0
    while [ $i -lt 20000 ]; do echo "//pkg:t$i"; i=$((i+1)); done
    ;;
"query deps")
    echo "$*" > deps_args
    cat
    echo "//pkg:extra"
    ;;
"build -")
    echo "plz-out/gen/count_$(wc -l | tr -d ' ').json"
    echo "plz-out/gen/a.go"
    ;;
esac
"#,
        );
        let outputs = plz
            .build_package_info(dir.path(), &["pkg/a.go".to_string()])
            .unwrap();
        assert_eq!(outputs, vec!["plz-out/gen/count_20001.json", "plz-out/gen/a.go"]);
        let deps_args = std::fs::read_to_string(dir.path().join("deps_args")).unwrap();
        assert_eq!(
            deps_args.trim(),
            "query deps - --hidden --include go_pkg_info --include go_src"
        );
    }

    #[cfg(unix)]
    #[test]
    fn failing_stage_reports_captured_stderr() {
        let dir = tempfile::TempDir::new().unwrap();
        let plz = fake_plz(dir.path(), "echo \"no such target\" >&2\nexit 3\n");
        let err = plz
            .build_package_info(dir.path(), &["a.go".to_string()])
            .unwrap_err();
        match err {
            DriverError::Subprocess { command, stderr, .. } => {
                assert!(command.ends_with("query whatinputs a.go"));
                assert_eq!(stderr.trim(), "no such target");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
