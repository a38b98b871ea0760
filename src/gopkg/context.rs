//! Build context: target platform, cgo and tag set used to decide which files
//! belong to a package.

use super::constraint::{self, Constraint};
use crate::error::{ImportError, ImportResult};
use std::path::Path;

pub const KNOWN_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "js", "linux",
    "nacl", "netbsd", "openbsd", "plan9", "solaris", "wasip1", "windows", "zos",
];

pub const KNOWN_ARCH: &[&str] = &[
    "386", "amd64", "amd64p32", "arm", "armbe", "arm64", "arm64be", "loong64", "mips", "mipsle",
    "mips64", "mips64le", "mips64p32", "mips64p32le", "ppc", "ppc64", "ppc64le", "riscv",
    "riscv64", "s390", "s390x", "sparc", "sparc64", "wasm",
];

const UNIX_OS: &[&str] = &[
    "aix", "android", "darwin", "dragonfly", "freebsd", "hurd", "illumos", "ios", "linux",
    "netbsd", "openbsd", "solaris",
];

/// Extensions that may belong to a package
const SOURCE_EXTENSIONS: &[&str] = &[
    "go", "c", "cc", "cpp", "cxx", "m", "h", "hh", "hpp", "hxx", "f", "F", "for", "f90", "s",
    "S", "sx", "swig", "swigcxx", "syso",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    pub goos: String,
    pub goarch: String,
    pub cgo_enabled: bool,
    /// Enables release tags `go1.1` through `go1.<release_minor>`
    pub release_minor: u32,
    pub build_tags: Vec<String>,
    pub compiler: String,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self::host()
    }
}

impl BuildContext {
    /// Context for the machine we are running on
    pub fn host() -> Self {
        Self {
            goos: host_goos().to_string(),
            goarch: host_goarch().to_string(),
            cgo_enabled: true,
            release_minor: 22,
            build_tags: Vec::new(),
            compiler: "gc".to_string(),
        }
    }

    /// Context for an explicit platform, mostly useful in tests
    pub fn for_platform(goos: &str, goarch: &str) -> Self {
        Self {
            goos: goos.to_string(),
            goarch: goarch.to_string(),
            ..Self::host()
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.build_tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Whether a single tag is satisfied
    pub fn match_tag(&self, tag: &str) -> bool {
        if tag.is_empty() {
            return false;
        }
        if tag == self.goos || tag == self.goarch || tag == self.compiler {
            return true;
        }
        match tag {
            "cgo" => return self.cgo_enabled,
            "unix" => return UNIX_OS.contains(&self.goos.as_str()),
            "linux" if self.goos == "android" => return true,
            "solaris" if self.goos == "illumos" => return true,
            "darwin" if self.goos == "ios" => return true,
            _ => {}
        }
        if let Some(minor) = tag.strip_prefix("go1.") {
            if let Ok(minor) = minor.parse::<u32>() {
                return (1..=self.release_minor).contains(&minor);
            }
        }
        self.build_tags.iter().any(|t| t == tag)
    }

    pub fn eval(&self, constraint: &Constraint) -> bool {
        constraint.eval(&mut |tag| self.match_tag(tag))
    }

    /// Filename rules: `*_GOOS`, `*_GOARCH` and `*_GOOS_GOARCH`, with a
    /// trailing `_test` ignored.
    pub fn good_os_arch_file(&self, name: &str) -> bool {
        let stem = name.split('.').next().unwrap_or(name);
        let Some(underscore) = stem.find('_') else {
            return true;
        };
        let mut parts: Vec<&str> = stem[underscore..].split('_').collect();
        if parts.last() == Some(&"test") {
            parts.pop();
        }
        let n = parts.len();
        if n >= 2 && KNOWN_OS.contains(&parts[n - 2]) && KNOWN_ARCH.contains(&parts[n - 1]) {
            return self.match_tag(parts[n - 1]) && self.match_tag(parts[n - 2]);
        }
        if n >= 1 && (KNOWN_OS.contains(&parts[n - 1]) || KNOWN_ARCH.contains(&parts[n - 1])) {
            return self.match_tag(parts[n - 1]);
        }
        true
    }

    /// Whether the header of `content` allows it to be built
    pub fn should_build(&self, file: &Path, content: &str) -> ImportResult<bool> {
        let constraint =
            constraint::header_constraint(content).map_err(|reason| ImportError::InvalidConstraint {
                file: file.to_path_buf(),
                reason,
            })?;
        Ok(constraint.is_none_or(|c| self.eval(&c)))
    }

    /// Whether `dir/name` would be part of the package under this context.
    ///
    /// Files importing "C" are excluded when cgo is disabled.
    pub fn match_file(&self, dir: &Path, name: &str) -> ImportResult<bool> {
        if name.starts_with('_') || name.starts_with('.') {
            return Ok(false);
        }
        let Some(ext) = extension(name) else {
            return Ok(false);
        };
        if !SOURCE_EXTENSIONS.contains(&ext) || !self.good_os_arch_file(name) {
            return Ok(false);
        }
        if ext == "syso" {
            return Ok(true);
        }

        let path = dir.join(name);
        let content = std::fs::read_to_string(&path).map_err(|source| ImportError::ReadFile {
            path: path.clone(),
            source,
        })?;
        if !self.should_build(&path, &content)? {
            return Ok(false);
        }
        if ext == "go" && !self.cgo_enabled && imports_c(&content) {
            return Ok(false);
        }
        Ok(true)
    }
}

pub(crate) fn extension(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(_, ext)| ext)
}

// Cheap textual check used where a full parse is unnecessary
fn imports_c(content: &str) -> bool {
    content.lines().any(|line| {
        let line = line.trim();
        line == "import \"C\"" || line == "\"C\"" || line.starts_with("import \"C\" ")
    })
}

fn host_goos() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    }
}

fn host_goarch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "loongarch64" => "loong64",
        "powerpc" => "ppc",
        "powerpc64" if cfg!(target_endian = "little") => "ppc64le",
        "powerpc64" => "ppc64",
        "mips64" if cfg!(target_endian = "little") => "mips64le",
        "mips" if cfg!(target_endian = "little") => "mipsle",
        "sparc64" => "sparc64",
        "wasm32" => "wasm",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn linux_amd64() -> BuildContext {
        BuildContext::for_platform("linux", "amd64")
    }

    #[test]
    fn test_match_tag() {
        let ctx = linux_amd64().with_tags(["netgo"]);
        for tag in ["linux", "amd64", "unix", "gc", "cgo", "go1.1", "go1.22", "netgo"] {
            assert!(ctx.match_tag(tag), "{tag}");
        }
        for tag in ["darwin", "arm64", "go1.23", "go1.0", "ignore", ""] {
            assert!(!ctx.match_tag(tag), "{tag}");
        }

        let android = BuildContext::for_platform("android", "arm64");
        assert!(android.match_tag("linux"));
        let illumos = BuildContext::for_platform("illumos", "amd64");
        assert!(illumos.match_tag("solaris"));
        let windows = BuildContext::for_platform("windows", "amd64");
        assert!(!windows.match_tag("unix"));
    }

    #[test]
    fn test_good_os_arch_file() {
        let ctx = linux_amd64();
        assert!(ctx.good_os_arch_file("file.go"));
        assert!(ctx.good_os_arch_file("file_linux.go"));
        assert!(ctx.good_os_arch_file("file_linux_amd64.go"));
        assert!(ctx.good_os_arch_file("file_linux_test.go"));
        assert!(ctx.good_os_arch_file("file_amd64.s"));
        assert!(!ctx.good_os_arch_file("file_windows.go"));
        assert!(!ctx.good_os_arch_file("file_linux_arm64.go"));
        assert!(!ctx.good_os_arch_file("file_darwin_test.go"));
        // Only the part after the first underscore counts
        assert!(ctx.good_os_arch_file("windows.go"));
        assert!(ctx.good_os_arch_file("my_helper.go"));
    }

    #[test]
    fn test_match_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.go"), "package a\n").unwrap();
        fs::write(dir.path().join("b.go"), "//go:build ignore\n\npackage a\n").unwrap();
        fs::write(dir.path().join("c.go"), "package a\n\nimport \"C\"\n").unwrap();
        fs::write(dir.path().join("d.txt"), "hello").unwrap();

        let ctx = linux_amd64();
        assert!(ctx.match_file(dir.path(), "a.go").unwrap());
        assert!(!ctx.match_file(dir.path(), "b.go").unwrap());
        assert!(ctx.match_file(dir.path(), "c.go").unwrap());
        assert!(!ctx.match_file(dir.path(), "d.txt").unwrap());
        assert!(!ctx.match_file(dir.path(), "_x.go").unwrap());

        let no_cgo = BuildContext {
            cgo_enabled: false,
            ..linux_amd64()
        };
        assert!(!no_cgo.match_file(dir.path(), "c.go").unwrap());

        let tagged = linux_amd64().with_tags(["ignore"]);
        assert!(tagged.match_file(dir.path(), "b.go").unwrap());
    }
}
