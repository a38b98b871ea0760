#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch source tree for integration tests
pub struct TestProject {
    pub dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn add_file(&self, path: &str, content: &str) -> PathBuf {
        let file_path = self.dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    pub fn add_dir(&self, path: &str) -> PathBuf {
        let dir_path = self.dir.path().join(path);
        fs::create_dir_all(&dir_path).expect("Failed to create dir");
        dir_path
    }

    pub fn read(&self, path: &str) -> String {
        fs::read_to_string(self.dir.path().join(path)).expect("Failed to read file")
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub mod go_sources {
    pub const GO_MOD: &str = "module example.com/m

go 1.21

require github.com/dep/x v1.0.0
";

    pub const ROOT_LIB: &str = r#"package m

import (
	"fmt"

	"github.com/dep/x/y"
)

func Hello() string { return fmt.Sprint(y.Name) }
"#;

    pub const WINDOWS_ONLY: &str = r#"//go:build windows

package m

import "golang.org/x/sys/windows"
"#;

    pub const TOOL_MAIN: &str = r#"package main

import "example.com/m"

func main() { println(m.Hello()) }
"#;

    pub const ALL_PKG: &str = "package all\n";
}
