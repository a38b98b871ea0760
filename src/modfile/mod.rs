//! go.mod manifest parsing
//!
//! Two parse modes are supported:
//! - strict: every directive must be well formed and known, used for manifests
//!   this tool owns (the host repository, or a module generated on its own)
//! - lax: only `module`, `go`, `require` and `retract` are interpreted and
//!   anything else, including `replace` and malformed lines, is skipped. Used
//!   for third party manifests that are not under our control.

pub mod deps;

use crate::error::{ManifestError, ManifestResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub use deps::{CombinedDeps, combined_deps_and_replacements};

/// How forgiving the parser is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    Strict,
    Lax,
}

/// A `require` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Require {
    pub path: String,
    pub version: String,
    pub indirect: bool,
}

/// A `replace` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replace {
    pub old_path: String,
    pub old_version: Option<String>,
    pub new_path: String,
    pub new_version: Option<String>,
}

impl Replace {
    /// Replacements pointing at a directory rather than another module
    pub fn is_local(&self) -> bool {
        self.new_version.is_none() && is_local_path(&self.new_path)
    }
}

/// Parsed representation of a go.mod file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModFile {
    pub module: Option<String>,
    pub go_version: Option<String>,
    pub require: Vec<Require>,
    pub replace: Vec<Replace>,
}

impl ModFile {
    /// Read and parse a manifest from disk
    pub fn read(path: &Path, mode: ParseMode) -> ManifestResult<Self> {
        let data = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &data, mode)
    }

    /// Parse manifest text; `path` is only used for diagnostics
    pub fn parse(path: &Path, data: &str, mode: ParseMode) -> ManifestResult<Self> {
        let lines = tokenize(path, data)?;
        let mut parser = Parser {
            path: path.to_path_buf(),
            mode,
            file: ModFile::default(),
        };

        let mut iter = lines.into_iter();
        while let Some(line) = iter.next() {
            let verb = line.tokens[0].text.clone();
            let is_block_start = line.tokens.len() == 2 && line.tokens[1].is_open();
            let is_empty_block = line.tokens.len() == 3
                && line.tokens[1].is_open()
                && line.tokens[2].is_close();

            if is_empty_block {
                parser.check_verb(&verb, line.number)?;
                continue;
            }
            if is_block_start {
                parser.check_verb(&verb, line.number)?;
                let mut closed = false;
                for entry in iter.by_ref() {
                    if entry.tokens.len() == 1 && entry.tokens[0].is_close() {
                        closed = true;
                        break;
                    }
                    parser.directive(&verb, &entry.tokens, entry.indirect, entry.number)?;
                }
                if !closed && mode == ParseMode::Strict {
                    return Err(parser.syntax(line.number, "unterminated block"));
                }
                continue;
            }
            parser.check_verb(&verb, line.number)?;
            parser.directive(&verb, &line.tokens[1..], line.indirect, line.number)?;
        }
        Ok(parser.file)
    }

    /// Module paths named by `require`, in file order
    pub fn required_paths(&self) -> Vec<String> {
        self.require.iter().map(|r| r.path.clone()).collect()
    }

    /// `old path -> new path` for module replacements. Directory replacements
    /// are left out so the import keeps resolving to the original module.
    pub fn replacements(&self) -> BTreeMap<String, String> {
        self.replace
            .iter()
            .filter(|r| !r.is_local())
            .map(|r| (r.old_path.clone(), r.new_path.clone()))
            .collect()
    }
}

const KNOWN_VERBS: &[&str] = &[
    "module",
    "go",
    "toolchain",
    "godebug",
    "require",
    "exclude",
    "replace",
    "retract",
    "tool",
    "ignore",
];

// Verbs worth reading even from a dependency's manifest
const LAX_VERBS: &[&str] = &["module", "go", "require", "retract"];

struct Parser {
    path: PathBuf,
    mode: ParseMode,
    file: ModFile,
}

impl Parser {
    fn syntax(&self, line: usize, reason: impl Into<String>) -> ManifestError {
        ManifestError::Syntax {
            path: self.path.clone(),
            line,
            reason: reason.into(),
        }
    }

    fn check_verb(&self, verb: &str, line: usize) -> ManifestResult<()> {
        if self.mode == ParseMode::Strict && !KNOWN_VERBS.contains(&verb) {
            return Err(self.syntax(line, format!("unknown directive: {verb}")));
        }
        Ok(())
    }

    fn directive(
        &mut self,
        verb: &str,
        args: &[Token],
        indirect: bool,
        line: usize,
    ) -> ManifestResult<()> {
        if self.mode == ParseMode::Lax && !LAX_VERBS.contains(&verb) {
            return Ok(());
        }
        let result = self.apply(verb, args, indirect, line);
        match (result, self.mode) {
            // Best effort: a lax parse drops what it cannot understand
            (Err(_), ParseMode::Lax) => Ok(()),
            (result, _) => result,
        }
    }

    fn apply(
        &mut self,
        verb: &str,
        args: &[Token],
        indirect: bool,
        line: usize,
    ) -> ManifestResult<()> {
        match verb {
            "module" => {
                let [path] = args else {
                    return Err(self.syntax(line, "usage: module module/path"));
                };
                self.file.module = Some(path.text.clone());
            }
            "go" => {
                let [version] = args else {
                    return Err(self.syntax(line, "usage: go 1.23"));
                };
                self.file.go_version = Some(version.text.clone());
            }
            "require" => {
                let [path, version] = args else {
                    return Err(self.syntax(line, "usage: require module/path v1.2.3"));
                };
                self.file.require.push(Require {
                    path: path.text.clone(),
                    version: version.text.clone(),
                    indirect,
                });
            }
            "replace" => {
                let replace = self.parse_replace(args, line)?;
                self.file.replace.push(replace);
            }
            "exclude" => {
                if args.len() != 2 {
                    return Err(self.syntax(line, "usage: exclude module/path v1.2.3"));
                }
            }
            "toolchain" | "tool" | "ignore" => {
                if args.len() != 1 {
                    return Err(self.syntax(line, format!("usage: {verb} <value>")));
                }
            }
            "godebug" | "retract" => {
                if args.is_empty() {
                    return Err(self.syntax(line, format!("usage: {verb} <value>")));
                }
            }
            other => return Err(self.syntax(line, format!("unknown directive: {other}"))),
        }
        Ok(())
    }

    fn parse_replace(&self, args: &[Token], line: usize) -> ManifestResult<Replace> {
        const USAGE: &str = "usage: replace module/path [v1.2.3] => other/module v1.4\n\t or replace module/path [v1.2.3] => ../local/directory";

        let arrow = args
            .iter()
            .position(|t| t.text == "=>" && !t.quoted)
            .ok_or_else(|| self.syntax(line, USAGE))?;
        let (old, new) = (&args[..arrow], &args[arrow + 1..]);
        if old.is_empty() || old.len() > 2 || new.is_empty() || new.len() > 2 {
            return Err(self.syntax(line, USAGE));
        }

        let replace = Replace {
            old_path: old[0].text.clone(),
            old_version: old.get(1).map(|t| t.text.clone()),
            new_path: new[0].text.clone(),
            new_version: new.get(1).map(|t| t.text.clone()),
        };
        if replace.new_version.is_none() && !is_local_path(&replace.new_path) {
            return Err(self.syntax(
                line,
                "replacement module without version must be directory path (rooted or starting with ./ or ../)",
            ));
        }
        Ok(replace)
    }
}

fn is_local_path(path: &str) -> bool {
    path == "."
        || path == ".."
        || path.starts_with("./")
        || path.starts_with("../")
        || path.starts_with('/')
        || Path::new(path).is_absolute()
}

#[derive(Debug, Clone)]
struct Token {
    text: String,
    quoted: bool,
}

impl Token {
    fn is_open(&self) -> bool {
        !self.quoted && self.text == "("
    }

    fn is_close(&self) -> bool {
        !self.quoted && self.text == ")"
    }
}

#[derive(Debug)]
struct Line {
    number: usize,
    tokens: Vec<Token>,
    /// Trailing `// indirect` comment
    indirect: bool,
}

fn tokenize(path: &Path, data: &str) -> ManifestResult<Vec<Line>> {
    let mut lines = Vec::new();

    for (idx, raw) in data.lines().enumerate() {
        let number = idx + 1;
        let mut tokens = Vec::new();
        let mut comment = None;
        let mut chars = raw.char_indices().peekable();

        while let Some(&(pos, c)) = chars.peek() {
            if c.is_whitespace() {
                chars.next();
                continue;
            }
            if raw[pos..].starts_with("//") {
                comment = Some(raw[pos + 2..].trim());
                break;
            }
            match c {
                '"' => {
                    chars.next();
                    let mut text = String::new();
                    let mut closed = false;
                    while let Some((_, c)) = chars.next() {
                        match c {
                            '\\' => {
                                if let Some((_, escaped)) = chars.next() {
                                    text.push(escaped);
                                }
                            }
                            '"' => {
                                closed = true;
                                break;
                            }
                            c => text.push(c),
                        }
                    }
                    if !closed {
                        return Err(ManifestError::Syntax {
                            path: path.to_path_buf(),
                            line: number,
                            reason: "unterminated quoted string".to_string(),
                        });
                    }
                    tokens.push(Token { text, quoted: true });
                }
                '`' => {
                    chars.next();
                    let mut text = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '`' {
                            closed = true;
                            break;
                        }
                        text.push(c);
                    }
                    if !closed {
                        return Err(ManifestError::Syntax {
                            path: path.to_path_buf(),
                            line: number,
                            reason: "unterminated raw string".to_string(),
                        });
                    }
                    tokens.push(Token { text, quoted: true });
                }
                '(' | ')' => {
                    chars.next();
                    tokens.push(Token {
                        text: c.to_string(),
                        quoted: false,
                    });
                }
                _ => {
                    let mut text = String::new();
                    while let Some(&(pos, c)) = chars.peek() {
                        if c.is_whitespace()
                            || c == '('
                            || c == ')'
                            || c == '"'
                            || c == '`'
                            || raw[pos..].starts_with("//")
                        {
                            break;
                        }
                        text.push(c);
                        chars.next();
                    }
                    tokens.push(Token {
                        text,
                        quoted: false,
                    });
                }
            }
        }

        if !tokens.is_empty() {
            let indirect = comment.is_some_and(|c| {
                c == "indirect" || c.starts_with("indirect;")
            });
            lines.push(Line {
                number,
                tokens,
                indirect,
            });
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GO_MOD: &str = r#"
module github.com/test/project

go 1.21

require (
    github.com/gin-gonic/gin v1.9.1
    github.com/lib/pq v1.10.7 // indirect
)

require golang.org/x/mod v0.14.0

replace github.com/old/module => github.com/new/module v1.2.0

replace (
    github.com/lib/pq v1.10.7 => ../local/pq
)
"#;

    #[test]
    fn parses_requires_and_replaces_strictly() {
        let file = ModFile::parse(Path::new("go.mod"), GO_MOD, ParseMode::Strict).unwrap();
        assert_eq!(file.module.as_deref(), Some("github.com/test/project"));
        assert_eq!(file.go_version.as_deref(), Some("1.21"));
        assert_eq!(
            file.required_paths(),
            vec![
                "github.com/gin-gonic/gin",
                "github.com/lib/pq",
                "golang.org/x/mod"
            ]
        );
        assert!(file.require[1].indirect);
        assert!(!file.require[0].indirect);
        assert_eq!(file.replace.len(), 2);
        assert_eq!(file.replace[1].old_version.as_deref(), Some("v1.10.7"));

        // The directory replacement is not a module mapping
        let replacements = file.replacements();
        assert_eq!(replacements.len(), 1);
        assert_eq!(
            replacements.get("github.com/old/module").map(String::as_str),
            Some("github.com/new/module")
        );
    }

    #[test]
    fn lax_mode_skips_replace_and_unknown_directives() {
        let data = "module example.com/dep\n\nfrobnicate everything\nrequire example.com/a v1.0.0\nrequire broken\nreplace example.com/a => example.com/b v1.0.0\n";
        let file = ModFile::parse(Path::new("go.mod"), data, ParseMode::Lax).unwrap();
        assert_eq!(file.required_paths(), vec!["example.com/a"]);
        assert!(file.replace.is_empty());
    }

    #[test]
    fn strict_mode_rejects_unknown_directive() {
        let data = "module example.com/dep\nfrobnicate everything\n";
        let err = ModFile::parse(Path::new("go.mod"), data, ParseMode::Strict).unwrap_err();
        match err {
            ManifestError::Syntax { line, reason, .. } => {
                assert_eq!(line, 2);
                assert!(reason.contains("frobnicate"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn strict_mode_rejects_malformed_require_and_replace() {
        assert!(
            ModFile::parse(Path::new("go.mod"), "require example.com/a\n", ParseMode::Strict)
                .is_err()
        );
        assert!(
            ModFile::parse(
                Path::new("go.mod"),
                "replace example.com/a example.com/b\n",
                ParseMode::Strict
            )
            .is_err()
        );
        assert!(
            ModFile::parse(
                Path::new("go.mod"),
                "replace example.com/a => example.com/b\n",
                ParseMode::Strict
            )
            .is_err()
        );
    }

    #[test]
    fn quoted_paths_and_empty_blocks() {
        let data = "module \"example.com/quoted\"\nrequire ()\nrequire `example.com/raw` v0.1.0\n";
        let file = ModFile::parse(Path::new("go.mod"), data, ParseMode::Strict).unwrap();
        assert_eq!(file.module.as_deref(), Some("example.com/quoted"));
        assert_eq!(file.required_paths(), vec!["example.com/raw"]);
    }
}
