//! Build constraint expressions
//!
//! Supports both syntaxes found in Go file headers:
//! - `//go:build linux && (amd64 || arm64)`
//! - `// +build linux,amd64 darwin` (space = OR, comma = AND, `!` = NOT)
//!
//! `//go:build` wins when present. Legacy `// +build` lines only count when
//! a blank line separates them from the package clause, otherwise they are
//! package documentation.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Tag(String),
    Not(Box<Constraint>),
    And(Box<Constraint>, Box<Constraint>),
    Or(Box<Constraint>, Box<Constraint>),
}

impl Constraint {
    /// Evaluate with `ok` deciding whether a single tag is satisfied
    pub fn eval(&self, ok: &mut impl FnMut(&str) -> bool) -> bool {
        match self {
            Self::Tag(tag) => ok(tag),
            Self::Not(inner) => !inner.eval(ok),
            Self::And(a, b) => {
                let a = a.eval(ok);
                let b = b.eval(ok);
                a && b
            }
            Self::Or(a, b) => {
                let a = a.eval(ok);
                let b = b.eval(ok);
                a || b
            }
        }
    }

    fn and(a: Constraint, b: Constraint) -> Constraint {
        Self::And(Box::new(a), Box::new(b))
    }

    fn or(a: Constraint, b: Constraint) -> Constraint {
        Self::Or(Box::new(a), Box::new(b))
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tag(tag) => f.write_str(tag),
            Self::Not(inner) => match inner.as_ref() {
                Self::Tag(_) | Self::Not(_) => write!(f, "!{inner}"),
                _ => write!(f, "!({inner})"),
            },
            Self::And(a, b) => {
                fmt_operand(f, a, true)?;
                f.write_str(" && ")?;
                fmt_operand(f, b, true)
            }
            Self::Or(a, b) => {
                fmt_operand(f, a, false)?;
                f.write_str(" || ")?;
                fmt_operand(f, b, false)
            }
        }
    }
}

fn fmt_operand(f: &mut fmt::Formatter<'_>, c: &Constraint, in_and: bool) -> fmt::Result {
    match c {
        Constraint::Or(..) if in_and => write!(f, "({c})"),
        _ => write!(f, "{c}"),
    }
}

/// True for a `//go:build` line (the directive must be followed by a space or end)
pub fn is_go_build(line: &str) -> bool {
    line.strip_prefix("//go:build")
        .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
}

/// True for a legacy `// +build` line
pub fn is_plus_build(line: &str) -> bool {
    line.strip_prefix("//")
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix("+build"))
        .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t']))
}

/// Parse the expression of a `//go:build` line
pub fn parse_go_build(line: &str) -> Result<Constraint, String> {
    let text = line
        .trim()
        .strip_prefix("//go:build")
        .ok_or_else(|| "not a //go:build line".to_string())?;
    let tokens = lex(text)?;
    if tokens.is_empty() {
        return Err("empty //go:build expression".to_string());
    }
    let mut parser = ExprParser { tokens, pos: 0 };
    let expr = parser.or()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("unexpected token {:?}", parser.tokens[parser.pos]));
    }
    Ok(expr)
}

/// Parse a `// +build` line into an expression. Returns `None` for an empty line.
pub fn parse_plus_build(line: &str) -> Result<Option<Constraint>, String> {
    let text = line
        .trim()
        .strip_prefix("//")
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix("+build"))
        .ok_or_else(|| "not a // +build line".to_string())?;

    let mut result: Option<Constraint> = None;
    for clause in text.split_whitespace() {
        let mut conj: Option<Constraint> = None;
        for lit in clause.split(',') {
            let (negated, tag) = match lit.strip_prefix('!') {
                Some(tag) => (true, tag),
                None => (false, lit),
            };
            if tag.is_empty() || tag.starts_with('!') || !is_valid_tag(tag) {
                return Err(format!("invalid tag in // +build line: {lit:?}"));
            }
            let mut term = Constraint::Tag(tag.to_string());
            if negated {
                term = Constraint::Not(Box::new(term));
            }
            conj = Some(match conj {
                Some(prev) => Constraint::and(prev, term),
                None => term,
            });
        }
        if let Some(conj) = conj {
            result = Some(match result {
                Some(prev) => Constraint::or(prev, conj),
                None => conj,
            });
        }
    }
    Ok(result)
}

/// Evaluate a `#cgo` line condition such as `linux,!arm64` (comma = AND)
pub fn parse_cgo_condition(cond: &str) -> Result<Constraint, String> {
    if cond.contains(['&', '|', '(', ')']) {
        return parse_go_build(&format!("//go:build {cond}"));
    }
    parse_plus_build(&format!("// +build {cond}"))?
        .ok_or_else(|| "empty #cgo condition".to_string())
}

/// Constraint declared in the header of a source file, if any
pub fn header_constraint(content: &str) -> Result<Option<Constraint>, String> {
    let mut go_build: Option<&str> = None;
    let mut plus_build: Vec<(usize, &str)> = Vec::new();
    let mut last_blank: Option<usize> = None;
    let mut in_block = false;

    for (idx, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if in_block {
            if let Some(end) = line.find("*/") {
                in_block = false;
                if !line[end + 2..].trim().is_empty() {
                    break;
                }
            }
            continue;
        }
        if line.is_empty() {
            last_blank = Some(idx);
            continue;
        }
        if line.starts_with("//") {
            if is_go_build(line) {
                if go_build.is_some() {
                    return Err("multiple //go:build comments".to_string());
                }
                go_build = Some(line);
            } else if is_plus_build(line) {
                plus_build.push((idx, line));
            }
            continue;
        }
        if let Some(rest) = line.strip_prefix("/*") {
            match rest.find("*/") {
                Some(end) if rest[end + 2..].trim().is_empty() => continue,
                Some(_) => break,
                None => {
                    in_block = true;
                    continue;
                }
            }
        }
        // First line of code
        break;
    }

    if let Some(line) = go_build {
        return parse_go_build(line).map(Some);
    }

    let mut result: Option<Constraint> = None;
    for (idx, line) in plus_build {
        if last_blank.is_none_or(|blank| idx > blank) {
            continue;
        }
        if let Some(expr) = parse_plus_build(line)? {
            result = Some(match result {
                Some(prev) => Constraint::and(prev, expr),
                None => expr,
            });
        }
    }
    Ok(result)
}

fn is_valid_tag(tag: &str) -> bool {
    tag.chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Tag(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn lex(text: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '!' => {
                chars.next();
                tokens.push(Token::Not);
            }
            '(' => {
                chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                chars.next();
                tokens.push(Token::Close);
            }
            '&' | '|' => {
                chars.next();
                if chars.next() != Some(c) {
                    return Err(format!("expected {c}{c}"));
                }
                tokens.push(if c == '&' { Token::And } else { Token::Or });
            }
            c if c.is_alphanumeric() || c == '_' || c == '.' => {
                let mut tag = String::new();
                while let Some(&c) = chars.peek() {
                    if !(c.is_alphanumeric() || c == '_' || c == '.') {
                        break;
                    }
                    tag.push(c);
                    chars.next();
                }
                tokens.push(Token::Tag(tag));
            }
            other => return Err(format!("invalid character {other:?}")),
        }
    }
    Ok(tokens)
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn or(&mut self) -> Result<Constraint, String> {
        let mut left = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            let right = self.and()?;
            left = Constraint::or(left, right);
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Constraint, String> {
        let mut left = self.not()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.not()?;
            left = Constraint::and(left, right);
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Constraint, String> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let inner = self.not()?;
            return Ok(Constraint::Not(Box::new(inner)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Constraint, String> {
        match self.tokens.get(self.pos).cloned() {
            Some(Token::Open) => {
                self.pos += 1;
                let expr = self.or()?;
                if self.peek() != Some(&Token::Close) {
                    return Err("missing )".to_string());
                }
                self.pos += 1;
                Ok(expr)
            }
            Some(Token::Tag(tag)) => {
                self.pos += 1;
                Ok(Constraint::Tag(tag))
            }
            Some(other) => Err(format!("unexpected token {other:?}")),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(expr: &Constraint, tags: &[&str]) -> bool {
        expr.eval(&mut |tag| tags.contains(&tag))
    }

    #[test]
    fn go_build_precedence() {
        let expr = parse_go_build("//go:build linux && amd64 || !cgo").unwrap();
        assert_eq!(expr.to_string(), "linux && amd64 || !cgo");
        assert!(eval(&expr, &["linux", "amd64", "cgo"]));
        assert!(!eval(&expr, &["darwin", "cgo"]));
        assert!(eval(&expr, &["darwin"]));

        let grouped = parse_go_build("//go:build linux && (arm64 || amd64)").unwrap();
        assert_eq!(grouped.to_string(), "linux && (arm64 || amd64)");
        assert!(eval(&grouped, &["linux", "arm64"]));
        assert!(!eval(&grouped, &["linux", "386"]));
    }

    #[test]
    fn go_build_errors() {
        assert!(parse_go_build("//go:build linux &&").is_err());
        assert!(parse_go_build("//go:build (linux").is_err());
        assert!(parse_go_build("//go:build linux & amd64").is_err());
        assert!(parse_go_build("//go:build").is_err());
    }

    #[test]
    fn plus_build_semantics() {
        let expr = parse_plus_build("// +build linux,386 darwin,!cgo").unwrap().unwrap();
        assert!(eval(&expr, &["linux", "386"]));
        assert!(eval(&expr, &["darwin"]));
        assert!(!eval(&expr, &["darwin", "cgo"]));
        assert!(parse_plus_build("// +build").unwrap().is_none());
    }

    #[test]
    fn header_prefers_go_build() {
        let src = "//go:build ignore\n// +build linux\n\npackage main\n";
        let expr = header_constraint(src).unwrap().unwrap();
        assert_eq!(expr, Constraint::Tag("ignore".to_string()));
    }

    #[test]
    fn plus_build_needs_blank_line() {
        let doc = "// +build linux\npackage main\n";
        assert_eq!(header_constraint(doc).unwrap(), None);

        let constrained = "// Copyright\n\n// +build linux\n// +build amd64\n\npackage main\n";
        let expr = header_constraint(constrained).unwrap().unwrap();
        assert!(eval(&expr, &["linux", "amd64"]));
        assert!(!eval(&expr, &["linux"]));
    }

    #[test]
    fn header_stops_at_code() {
        let src = "package main\n\n//go:build ignore\n";
        assert_eq!(header_constraint(src).unwrap(), None);

        let block = "/* licence\n   text */\n//go:build linux\n\npackage x\n";
        assert_eq!(
            header_constraint(block).unwrap(),
            Some(Constraint::Tag("linux".to_string()))
        );
    }

    #[test]
    fn multiple_go_build_lines_are_an_error() {
        let src = "//go:build linux\n//go:build darwin\n\npackage x\n";
        assert!(header_constraint(src).is_err());
    }

    #[test]
    fn cgo_conditions() {
        let cond = parse_cgo_condition("linux,!arm64").unwrap();
        assert!(eval(&cond, &["linux", "amd64"]));
        assert!(!eval(&cond, &["linux", "arm64"]));
        let expr = parse_cgo_condition("linux && amd64").unwrap();
        assert!(eval(&expr, &["linux", "amd64"]));
    }
}
