//! Go source scanning with tree-sitter-go
//!
//! Extracts what package assembly needs from one file: the package clause,
//! import paths, the cgo preamble attached to `import "C"` and `//go:embed`
//! patterns.

use crate::error::{ImportError, ImportResult};
use std::path::Path;
use tree_sitter::{Node, Parser};

/// What a single Go file contributes to its package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoFileInfo {
    pub package: String,
    /// Import paths in file order
    pub imports: Vec<String>,
    /// Doc comment text of `import "C"`, when the file uses cgo
    pub cgo_preamble: Option<String>,
    /// `//go:embed` patterns; only collected when the file imports "embed"
    pub embeds: Vec<String>,
}

impl GoFileInfo {
    pub fn uses_cgo(&self) -> bool {
        self.imports.iter().any(|i| i == "C")
    }
}

pub struct SourceScanner {
    parser: Parser,
}

impl SourceScanner {
    pub fn new() -> ImportResult<Self> {
        let mut parser = Parser::new();
        let lang = tree_sitter_go::LANGUAGE;
        parser
            .set_language(&lang.into())
            .map_err(|e| ImportError::ParserInit {
                reason: format!("Failed to set Go language: {e}"),
            })?;
        Ok(Self { parser })
    }

    pub fn scan_file(&mut self, path: &Path) -> ImportResult<GoFileInfo> {
        let src = std::fs::read_to_string(path).map_err(|source| ImportError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        self.scan(path, &src)
    }

    pub fn scan(&mut self, path: &Path, src: &str) -> ImportResult<GoFileInfo> {
        let parse_error = |reason: &str| ImportError::Parse {
            file: path.to_path_buf(),
            reason: reason.to_string(),
        };
        let tree = self
            .parser
            .parse(src, None)
            .ok_or_else(|| parse_error("parser produced no tree"))?;
        let root = tree.root_node();

        let mut info = GoFileInfo::default();
        let mut embed_lines = Vec::new();
        let mut cursor = root.walk();

        for child in root.children(&mut cursor) {
            match child.kind() {
                "package_clause" => {
                    let mut inner = child.walk();
                    if let Some(name) = child
                        .children(&mut inner)
                        .find(|n| n.kind() == "package_identifier")
                    {
                        info.package = text(name, src).to_string();
                    }
                }
                "import_declaration" => {
                    if info.package.is_empty() {
                        return Err(parse_error("expected 'package', found 'import'"));
                    }
                    self.scan_import_declaration(child, src, &mut info);
                }
                "comment" => {
                    let comment = text(child, src);
                    if let Some(args) = comment.strip_prefix("//go:embed") {
                        if args.starts_with([' ', '\t']) {
                            embed_lines.push(args.trim().to_string());
                        }
                    }
                }
                _ => {}
            }
        }

        if info.package.is_empty() {
            return Err(parse_error("expected 'package' clause"));
        }

        if info.imports.iter().any(|i| i == "embed") {
            for line in embed_lines {
                let patterns = split_quoted(&line)
                    .map_err(|reason| parse_error(&format!("invalid //go:embed: {reason}")))?;
                info.embeds.extend(patterns);
            }
        }
        Ok(info)
    }

    fn scan_import_declaration(&self, decl: Node, src: &str, info: &mut GoFileInfo) {
        let mut cursor = decl.walk();
        for child in decl.children(&mut cursor) {
            match child.kind() {
                "import_spec" => {
                    // A lone spec also takes the declaration's doc comment
                    self.scan_import_spec(child, Some(decl), src, info);
                }
                "import_spec_list" => {
                    let mut list_cursor = child.walk();
                    let specs: Vec<Node> = child
                        .children(&mut list_cursor)
                        .filter(|n| n.kind() == "import_spec")
                        .collect();
                    let outer = if specs.len() == 1 { Some(decl) } else { None };
                    for spec in specs {
                        self.scan_import_spec(spec, outer, src, info);
                    }
                }
                _ => {}
            }
        }
    }

    fn scan_import_spec(&self, spec: Node, outer: Option<Node>, src: &str, info: &mut GoFileInfo) {
        let mut cursor = spec.walk();
        let Some(path) = spec
            .children(&mut cursor)
            .find(|n| matches!(n.kind(), "interpreted_string_literal" | "raw_string_literal"))
            .map(|n| unquote(text(n, src)))
        else {
            return;
        };

        if path == "C" {
            let mut doc = doc_comments(spec, src);
            if doc.is_empty() {
                if let Some(outer) = outer {
                    doc = doc_comments(outer, src);
                }
            }
            let preamble = doc.join("\n");
            info.cgo_preamble = Some(match info.cgo_preamble.take() {
                Some(existing) if !existing.is_empty() => format!("{existing}\n{preamble}"),
                _ => preamble,
            });
        }
        info.imports.push(path);
    }
}

fn text<'a>(node: Node, src: &'a str) -> &'a str {
    &src[node.byte_range()]
}

/// Comment lines directly above `node` with no blank line in between
fn doc_comments(node: Node, src: &str) -> Vec<String> {
    let mut groups = Vec::new();
    let mut next_row = node.start_position().row;
    let mut current = node.prev_sibling();

    while let Some(prev) = current {
        if prev.kind() != "comment" || prev.end_position().row + 1 != next_row {
            break;
        }
        groups.push(comment_text(text(prev, src)));
        next_row = prev.start_position().row;
        current = prev.prev_sibling();
    }
    groups.reverse();
    groups
}

/// Comment body without its markers
fn comment_text(comment: &str) -> String {
    if let Some(line) = comment.strip_prefix("//") {
        return line.strip_prefix(' ').unwrap_or(line).to_string();
    }
    comment
        .strip_prefix("/*")
        .and_then(|c| c.strip_suffix("*/"))
        .unwrap_or(comment)
        .to_string()
}

fn unquote(literal: &str) -> String {
    if let Some(raw) = literal.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
        return raw.to_string();
    }
    let inner = literal
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(literal);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Split on whitespace, honouring `"..."` and `` `...` `` quoting
pub(crate) fn split_quoted(line: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut arg = String::new();
        match c {
            '"' | '`' | '\'' => {
                let quote = c;
                chars.next();
                let mut closed = false;
                while let Some(c) = chars.next() {
                    if c == quote {
                        closed = true;
                        break;
                    }
                    if c == '\\' && quote != '`' {
                        if let Some(escaped) = chars.next() {
                            arg.push(escaped);
                        }
                        continue;
                    }
                    arg.push(c);
                }
                if !closed {
                    return Err(format!("unterminated {quote} string"));
                }
            }
            _ => {
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() {
                        break;
                    }
                    arg.push(c);
                    chars.next();
                }
            }
        }
        args.push(arg);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(src: &str) -> GoFileInfo {
        SourceScanner::new()
            .unwrap()
            .scan(Path::new("test.go"), src)
            .unwrap()
    }

    #[test]
    fn scans_package_and_imports() {
        let info = scan(
            r#"package foo

import "fmt"

import (
    str "strings"
    _ "embed"
    . "github.com/x/y"
)

func main() {}
"#,
        );
        assert_eq!(info.package, "foo");
        assert_eq!(info.imports, vec!["fmt", "strings", "embed", "github.com/x/y"]);
        assert!(info.cgo_preamble.is_none());
        assert!(!info.uses_cgo());
    }

    #[test]
    fn captures_cgo_preamble() {
        let info = scan(
            r#"package foo

// #cgo CFLAGS: -DFOO=1
// #cgo linux LDFLAGS: -lm
// #include <math.h>
import "C"

import "unsafe"
"#,
        );
        assert!(info.uses_cgo());
        let preamble = info.cgo_preamble.unwrap();
        assert_eq!(
            preamble,
            "#cgo CFLAGS: -DFOO=1\n#cgo linux LDFLAGS: -lm\n#include <math.h>"
        );
        assert_eq!(info.imports, vec!["C", "unsafe"]);
    }

    #[test]
    fn detached_comment_is_not_preamble() {
        let info = scan("package foo\n\n// #cgo LDFLAGS: -lz\n\nimport \"C\"\n");
        assert_eq!(info.cgo_preamble.as_deref(), Some(""));
    }

    #[test]
    fn embeds_require_embed_import() {
        let with_embed = scan(
            "package foo\n\nimport _ \"embed\"\n\n//go:embed static/*.html \"a b.txt\"\nvar content string\n",
        );
        assert_eq!(with_embed.embeds, vec!["static/*.html", "a b.txt"]);

        let without = scan("package foo\n\n//go:embed static\nvar content string\n");
        assert!(without.embeds.is_empty());
    }

    #[test]
    fn missing_package_clause_is_an_error() {
        let err = SourceScanner::new()
            .unwrap()
            .scan(Path::new("bad.go"), "func main() {}\n")
            .unwrap_err();
        assert!(matches!(err, ImportError::Parse { .. }));
    }

    #[test]
    fn test_split_quoted() {
        assert_eq!(
            split_quoted(r#"-I/usr/include "-DX=a b" '-DY'"#).unwrap(),
            vec!["-I/usr/include", "-DX=a b", "-DY"]
        );
        assert!(split_quoted("\"open").is_err());
    }
}
