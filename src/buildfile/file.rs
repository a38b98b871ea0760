//! BUILD files on disk

use super::expr::{Call, Stmt, StmtKind};
use super::parser;
use super::print::format_stmts;
use crate::error::{BuildFileError, BuildFileResult};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildFile {
    pub path: PathBuf,
    pub stmts: Vec<Stmt>,
}

impl BuildFile {
    /// An empty file that will be created at `path` on save
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stmts: Vec::new(),
        }
    }

    pub fn parse(path: impl Into<PathBuf>, src: &str) -> BuildFileResult<Self> {
        let path = path.into();
        let stmts = parser::parse(src).map_err(|e| BuildFileError::Syntax {
            path: path.clone(),
            line: e.line,
            column: e.column,
            reason: e.reason,
        })?;
        Ok(Self { path, stmts })
    }

    pub fn load(path: &Path) -> BuildFileResult<Self> {
        let src = std::fs::read_to_string(path).map_err(|source| BuildFileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &src)
    }

    /// Open the build file in `dir`, trying `names` in order.
    ///
    /// The first name that does not exist yields a new empty file; names taken
    /// by directories are skipped. If every name is a directory there is
    /// nowhere to write and this fails.
    pub fn load_or_create(dir: &Path, names: &[String]) -> BuildFileResult<Self> {
        for name in names {
            let path = dir.join(name);
            match std::fs::symlink_metadata(&path) {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new(path)),
                Err(source) => return Err(BuildFileError::Read { path, source }),
                Ok(meta) if meta.is_dir() => continue,
                Ok(_) => return Self::load(&path),
            }
        }
        Err(BuildFileError::NoCandidate {
            dir: dir.to_path_buf(),
            names: names.to_vec(),
        })
    }

    /// Path of an existing build file in `dir`, if any
    pub fn find(dir: &Path, names: &[String]) -> Option<PathBuf> {
        names
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Top-level rule calls
    pub fn rules(&self) -> impl Iterator<Item = &Call> {
        self.stmts.iter().filter_map(Stmt::as_call)
    }

    pub fn rules_mut(&mut self) -> impl Iterator<Item = &mut Call> {
        self.stmts.iter_mut().filter_map(Stmt::as_call_mut)
    }

    pub fn rules_of_kind<'a>(&'a self, kinds: &'a [&str]) -> impl Iterator<Item = &'a Call> + 'a {
        self.rules()
            .filter(move |rule| rule.kind().is_some_and(|k| kinds.contains(&k)))
    }

    /// Rule with the given `name` attribute
    pub fn rule_mut(&mut self, name: &str) -> Option<&mut Call> {
        self.rules_mut().find(|rule| rule.name() == Some(name))
    }

    pub fn push_rule(&mut self, rule: Call) {
        self.stmts.push(Stmt::call(rule));
    }

    /// Put `stmt` first unless an identical statement is already present
    pub fn ensure_first(&mut self, stmt: Stmt) {
        let exists = self
            .stmts
            .iter()
            .any(|s| s.kind == stmt.kind && !matches!(s.kind, StmtKind::Comment(_)));
        if !exists {
            // Keep a leading comment block (licence headers) above the insertion
            let at = usize::from(matches!(
                self.stmts.first().map(|s| &s.kind),
                Some(StmtKind::Comment(_))
            ));
            self.stmts.insert(at, stmt);
        }
    }

    pub fn format(&self) -> String {
        format_stmts(&self.stmts)
    }

    /// Write the formatted file atomically
    pub fn save(&self) -> BuildFileResult<()> {
        let write_error = |source| BuildFileError::Write {
            path: self.path.clone(),
            source,
        };
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(write_error)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(write_error)?;
        tmp.write_all(self.format().as_bytes()).map_err(write_error)?;
        tmp.persist(&self.path).map_err(|e| write_error(e.error))?;
        Ok(())
    }
}
