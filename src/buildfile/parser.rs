//! Recursive descent parser for BUILD files
//!
//! Statements are split on top-level newlines and parsed one at a time. A
//! statement the grammar below does not cover is kept as raw source text, as
//! are `def`/`if`/`for`/`while`/`with` blocks, so any well-bracketed file
//! survives a rewrite.

use super::expr::{Arg, Call, Expr, Stmt, StmtKind};
use super::lexer::{LexError, Spanned, Token, tokenize};

const BLOCK_KEYWORDS: &[&str] = &["def", "if", "for", "while", "with", "try", "class"];
const CONTINUATION_KEYWORDS: &[&str] = &["elif", "else", "except", "finally"];
const ASSIGN_OPS: &[&str] = &["=", "+=", "-=", "*=", "/=", "//=", "%=", "|=", "&=", "**="];

/// Parse a whole file. Only lexical errors (unterminated strings, unbalanced
/// brackets) are fatal.
pub fn parse(src: &str) -> Result<Vec<Stmt>, LexError> {
    let tokens = tokenize(src)?;
    let lines: Vec<&str> = src.lines().collect();
    let mut stmts = Vec::new();
    let mut pending: Vec<String> = Vec::new();
    let mut pending_end = 0;
    let mut pos = 0;

    while let Some(tok) = tokens.get(pos) {
        match &tok.token {
            Token::Eof => break,
            Token::Newline => pos += 1,
            Token::Comment(text) => {
                if !pending.is_empty() && tok.line != pending_end + 1 {
                    stmts.push(Stmt::new(StmtKind::Comment(std::mem::take(&mut pending))));
                }
                pending.push(text.clone());
                pending_end = tok.line;
                pos += 1;
            }
            Token::Ident(word) if tok.column == 1 && BLOCK_KEYWORDS.contains(&word.as_str()) => {
                let comments = take_attached(&mut pending, pending_end, tok.line, &mut stmts);
                let last_line = block_end(&lines, tok.line);
                let text = lines[tok.line - 1..last_line].join("\n");
                stmts.push(Stmt {
                    comments,
                    kind: StmtKind::Raw(text),
                });
                while tokens.get(pos).is_some_and(|t| t.line <= last_line && t.token != Token::Eof) {
                    pos += 1;
                }
            }
            _ => {
                let comments = take_attached(&mut pending, pending_end, tok.line, &mut stmts);
                let end = tokens[pos..]
                    .iter()
                    .position(|t| matches!(t.token, Token::Newline | Token::Eof))
                    .map_or(tokens.len() - 1, |i| pos + i);
                stmts.push(statement(src, &tokens[pos..end], tokens[end].offset, comments));
                pos = end;
            }
        }
    }
    if !pending.is_empty() {
        stmts.push(Stmt::new(StmtKind::Comment(pending)));
    }
    Ok(stmts)
}

/// Comments directly above `line` belong to the statement starting there;
/// anything else becomes a standalone comment block.
fn take_attached(
    pending: &mut Vec<String>,
    pending_end: usize,
    line: usize,
    stmts: &mut Vec<Stmt>,
) -> Vec<String> {
    if pending.is_empty() {
        return Vec::new();
    }
    let comments = std::mem::take(pending);
    if pending_end + 1 == line {
        comments
    } else {
        stmts.push(Stmt::new(StmtKind::Comment(comments)));
        Vec::new()
    }
}

/// Last line (1-based) of the block starting at `start`
fn block_end(lines: &[&str], start: usize) -> usize {
    let belongs = |line: &str| {
        line.trim().is_empty()
            || line.starts_with([' ', '\t', ')', ']', '}'])
            || CONTINUATION_KEYWORDS
                .iter()
                .any(|kw| line.strip_prefix(kw).is_some_and(|rest| rest.starts_with([' ', ':'])))
    };

    let mut last = start;
    let mut i = start;
    while i < lines.len() {
        let line = lines[i];
        if line.starts_with('#') {
            // A column-one comment stays in the block if the body continues after it
            let next_code = lines[i..]
                .iter()
                .find(|l| !l.trim().is_empty() && !l.starts_with('#'));
            if !next_code.is_some_and(|l| belongs(l)) {
                break;
            }
        } else if !belongs(line) {
            break;
        }
        if !line.trim().is_empty() {
            last = i + 1;
        }
        i += 1;
    }
    last
}

fn statement(src: &str, tokens: &[Spanned], end_offset: usize, mut comments: Vec<String>) -> Stmt {
    let start_offset = tokens.first().map_or(end_offset, |t| t.offset);
    let raw = || StmtKind::Raw(src[start_offset..end_offset].trim_end().to_string());

    let mut code_end = tokens.len();
    while code_end > 0 && matches!(tokens[code_end - 1].token, Token::Comment(_)) {
        code_end -= 1;
    }
    let mut parser = ExprParser {
        tokens: &tokens[..code_end],
        pos: 0,
    };
    match parser.statement() {
        Ok(kind) => {
            comments.extend(tokens[code_end..].iter().filter_map(|t| match &t.token {
                Token::Comment(text) => Some(text.clone()),
                _ => None,
            }));
            Stmt { comments, kind }
        }
        Err(_) => Stmt {
            comments,
            kind: raw(),
        },
    }
}

type PResult<T> = Result<T, String>;

struct ExprParser<'t> {
    tokens: &'t [Spanned],
    pos: usize,
}

impl<'t> ExprParser<'t> {
    fn peek(&self) -> Option<&'t Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<&'t Token> {
        let tokens = self.tokens;
        tokens.get(self.pos + offset).map(|t| &t.token)
    }

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn at_punct(&self, p: &str) -> bool {
        matches!(self.peek(), Some(Token::Punct(q)) if *q == p)
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(w)) if w == kw)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.at_punct(p) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> PResult<()> {
        if self.eat_punct(p) {
            Ok(())
        } else {
            Err(format!("expected '{p}', found {}", self.describe()))
        }
    }

    fn describe(&self) -> String {
        self.peek()
            .map_or_else(|| "end of statement".to_string(), ToString::to_string)
    }

    fn statement(&mut self) -> PResult<StmtKind> {
        let expr = self.test()?;
        let kind = match self.peek() {
            Some(Token::Punct(op)) if ASSIGN_OPS.contains(op) => {
                let op = op.to_string();
                self.pos += 1;
                let value = self.test()?;
                StmtKind::Assign {
                    target: expr,
                    op,
                    value,
                }
            }
            _ => StmtKind::Expr(expr),
        };
        if self.pos < self.tokens.len() {
            return Err(format!("unexpected {}", self.describe()));
        }
        Ok(kind)
    }

    fn test(&mut self) -> PResult<Expr> {
        if self.at_keyword("lambda") {
            return Err("lambda is not supported".to_string());
        }
        let then = self.or_test()?;
        if !self.at_keyword("if") {
            return Ok(then);
        }
        self.pos += 1;
        let cond = self.or_test()?;
        if !self.at_keyword("else") {
            return Err(format!("expected 'else', found {}", self.describe()));
        }
        self.pos += 1;
        let otherwise = self.test()?;
        Ok(Expr::Conditional {
            then: Box::new(then),
            cond: Box::new(cond),
            otherwise: Box::new(otherwise),
        })
    }

    fn or_test(&mut self) -> PResult<Expr> {
        let mut lhs = self.and_test()?;
        while self.at_keyword("or") {
            self.pos += 1;
            let rhs = self.and_test()?;
            lhs = binop("or", lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_test(&mut self) -> PResult<Expr> {
        let mut lhs = self.not_test()?;
        while self.at_keyword("and") {
            self.pos += 1;
            let rhs = self.not_test()?;
            lhs = binop("and", lhs, rhs);
        }
        Ok(lhs)
    }

    fn not_test(&mut self) -> PResult<Expr> {
        if self.at_keyword("not") {
            self.pos += 1;
            let operand = self.not_test()?;
            return Ok(Expr::Unary {
                op: "not".to_string(),
                operand: Box::new(operand),
            });
        }
        self.comparison()
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let mut lhs = self.bit_or()?;
        loop {
            let op = match self.peek() {
                Some(Token::Punct(p)) if matches!(*p, "==" | "!=" | "<" | ">" | "<=" | ">=") => {
                    let op = p.to_string();
                    self.pos += 1;
                    op
                }
                Some(Token::Ident(w)) if w == "in" => {
                    self.pos += 1;
                    "in".to_string()
                }
                Some(Token::Ident(w))
                    if w == "not" && matches!(self.peek_at(1), Some(Token::Ident(n)) if n == "in") =>
                {
                    self.pos += 2;
                    "not in".to_string()
                }
                Some(Token::Ident(w)) if w == "is" => {
                    self.pos += 1;
                    if self.at_keyword("not") {
                        self.pos += 1;
                        "is not".to_string()
                    } else {
                        "is".to_string()
                    }
                }
                _ => return Ok(lhs),
            };
            let rhs = self.bit_or()?;
            lhs = binop(&op, lhs, rhs);
        }
    }

    fn bit_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.arith()?;
        while let Some(Token::Punct(op @ ("|" | "&" | "^"))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.arith()?;
            lhs = binop(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn arith(&mut self) -> PResult<Expr> {
        let mut lhs = self.term()?;
        while let Some(Token::Punct(op @ ("+" | "-"))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.term()?;
            lhs = binop(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn term(&mut self) -> PResult<Expr> {
        let mut lhs = self.factor()?;
        while let Some(Token::Punct(op @ ("*" | "/" | "//" | "%"))) = self.peek() {
            let op = *op;
            self.pos += 1;
            let rhs = self.factor()?;
            lhs = binop(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> PResult<Expr> {
        if let Some(Token::Punct(op @ ("-" | "+" | "~"))) = self.peek() {
            let op = op.to_string();
            self.pos += 1;
            let operand = self.factor()?;
            return Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
            });
        }
        let base = self.postfix()?;
        if self.eat_punct("**") {
            let exp = self.factor()?;
            return Ok(binop("**", base, exp));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        loop {
            if self.eat_punct("(") {
                expr = Expr::Call(self.call_args(expr)?);
            } else if self.eat_punct("[") {
                let index = self.test()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    value: Box::new(expr),
                    index: Box::new(index),
                };
            } else if self.eat_punct(".") {
                let Some(Token::Ident(name)) = self.next() else {
                    return Err("expected attribute name".to_string());
                };
                let name = name.clone();
                expr = match expr {
                    Expr::Ident(base) => Expr::Ident(format!("{base}.{name}")),
                    other => Expr::Attr {
                        value: Box::new(other),
                        name,
                    },
                };
            } else {
                return Ok(expr);
            }
        }
    }

    fn call_args(&mut self, func: Expr) -> PResult<Call> {
        let mut args = Vec::new();
        let mut comments = Vec::new();
        loop {
            match self.peek() {
                Some(Token::Comment(text)) => {
                    comments.push(text.clone());
                    self.pos += 1;
                    continue;
                }
                Some(Token::Punct(")")) => {
                    self.pos += 1;
                    return Ok(Call {
                        func: Box::new(func),
                        args,
                        trailing_comments: comments,
                    });
                }
                Some(Token::Punct("*" | "**")) => {
                    return Err("star arguments are not supported".to_string());
                }
                _ => {}
            }

            let name = match (self.peek(), self.peek_at(1)) {
                (Some(Token::Ident(name)), Some(Token::Punct("="))) => {
                    let name = name.clone();
                    self.pos += 2;
                    Some(name)
                }
                _ => None,
            };
            let value = self.test()?;
            args.push(Arg {
                name,
                value,
                comments: std::mem::take(&mut comments),
            });

            // A comment after the comma on the same line travels with the next argument
            if !self.eat_punct(",") && !self.at_punct(")") && !matches!(self.peek(), Some(Token::Comment(_))) {
                return Err(format!("expected ',' or ')', found {}", self.describe()));
            }
        }
    }

    fn primary(&mut self) -> PResult<Expr> {
        let Some(token) = self.next() else {
            return Err("unexpected end of statement".to_string());
        };
        match token {
            Token::Ident(name) => Ok(Expr::Ident(name.clone())),
            Token::Int(value) => Ok(Expr::Int(*value)),
            Token::Str(value) => {
                // Adjacent literals concatenate
                let mut value = value.clone();
                while let Some(Token::Str(next)) = self.peek() {
                    value.push_str(next);
                    self.pos += 1;
                }
                Ok(Expr::String(value))
            }
            Token::Punct("[") => {
                let items = self.items("]")?;
                Ok(Expr::List(items))
            }
            Token::Punct("{") => self.dict(),
            Token::Punct("(") => {
                if self.eat_punct(")") {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let first = self.test()?;
                if self.eat_punct(")") {
                    return Ok(Expr::Paren(Box::new(first)));
                }
                self.expect_punct(",")?;
                let mut items = vec![first];
                items.extend(self.items(")")?);
                Ok(Expr::Tuple(items))
            }
            other => Err(format!("unexpected {other}")),
        }
    }

    /// Comma separated expressions up to `close`; comprehensions are rejected
    fn items(&mut self, close: &str) -> PResult<Vec<Expr>> {
        let mut items = Vec::new();
        loop {
            if self.eat_punct(close) {
                return Ok(items);
            }
            items.push(self.test()?);
            if self.at_keyword("for") {
                return Err("comprehensions are not supported".to_string());
            }
            if !self.eat_punct(",") && !self.at_punct(close) {
                return Err(format!("expected ',' or '{close}', found {}", self.describe()));
            }
        }
    }

    fn dict(&mut self) -> PResult<Expr> {
        let mut entries = Vec::new();
        loop {
            if self.eat_punct("}") {
                return Ok(Expr::Dict(entries));
            }
            let key = self.test()?;
            self.expect_punct(":")?;
            let value = self.test()?;
            if self.at_keyword("for") {
                return Err("comprehensions are not supported".to_string());
            }
            entries.push(Expr::KeyValue(Box::new(key), Box::new(value)));
            if !self.eat_punct(",") && !self.at_punct("}") {
                return Err(format!("expected ',' or '}}', found {}", self.describe()));
            }
        }
    }
}

fn binop(op: &str, lhs: Expr, rhs: Expr) -> Expr {
    Expr::BinOp {
        op: op.to_string(),
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buildfile::print::format_stmts;

    fn roundtrip(src: &str) -> String {
        format_stmts(&parse(src).unwrap())
    }

    #[test]
    fn parses_rule_call() {
        let stmts = parse("go_library(name = 'foo', srcs = ['a.go'], visibility = [\"PUBLIC\"])\n").unwrap();
        assert_eq!(stmts.len(), 1);
        let call = stmts[0].as_call().unwrap();
        assert_eq!(*call.func, Expr::ident("go_library"));
        assert_eq!(call.args.len(), 3);
        assert_eq!(call.args[0].name.as_deref(), Some("name"));
        assert_eq!(call.args[0].value, Expr::string("foo"));
        assert_eq!(call.args[1].value, Expr::string_list(["a.go"]));
    }

    #[test]
    fn comments_attach_or_stand_alone() {
        let stmts = parse("# header\n\n# about foo\nfoo()\n# trailing\n").unwrap();
        assert_eq!(stmts.len(), 3);
        assert_eq!(stmts[0].kind, StmtKind::Comment(vec!["# header".to_string()]));
        assert_eq!(stmts[1].comments, vec!["# about foo"]);
        assert_eq!(stmts[2].kind, StmtKind::Comment(vec!["# trailing".to_string()]));
    }

    #[test]
    fn comments_inside_calls_are_kept() {
        let out = roundtrip("go_test(\n    name = \"t\",\n    # keep me\n    srcs = [\"a_test.go\"],\n    # the end\n)\n");
        assert_eq!(
            out,
            "go_test(\n    name = \"t\",\n    # keep me\n    srcs = [\"a_test.go\"],\n    # the end\n)\n"
        );
    }

    #[test]
    fn def_blocks_are_kept_verbatim() {
        let src = "def helper(name):\n    if name:\n        return name\n\n    else:\n        return None\n\nhelper(\"x\")\n";
        let stmts = parse(src).unwrap();
        assert_eq!(stmts.len(), 2);
        assert_eq!(
            stmts[0].kind,
            StmtKind::Raw(
                "def helper(name):\n    if name:\n        return name\n\n    else:\n        return None"
                    .to_string()
            )
        );
        assert!(stmts[1].as_call().is_some());
    }

    #[test]
    fn unsupported_statements_fall_back_to_raw() {
        let stmts = parse("x = [f for f in glob([\"*.go\"])]\ny = 1\n").unwrap();
        assert_eq!(
            stmts[0].kind,
            StmtKind::Raw("x = [f for f in glob([\"*.go\"])]".to_string())
        );
        assert!(matches!(stmts[1].kind, StmtKind::Assign { .. }));
    }

    #[test]
    fn expressions_keep_their_shape() {
        assert_eq!(
            roundtrip("srcs = glob(['*.go'], exclude = ['*_test.go']) + ['gen.go']\n"),
            "srcs = glob(\n    [\"*.go\"],\n    exclude = [\"*_test.go\"],\n) + [\"gen.go\"]\n"
        );
        assert_eq!(
            roundtrip("x = (a + b) * -c if CONFIG.OS == 'linux' and not y else {'k': 1}\n"),
            "x = (a + b) * -c if CONFIG.OS == \"linux\" and not y else {\"k\": 1}\n"
        );
    }

    #[test]
    fn formatting_is_idempotent() {
        let src = "subinclude('///go//build_defs:go')\ngo_library(name='foo',srcs=['b.go','a.go'],deps=['//x'],  # deps\n  visibility=['PUBLIC'])\n\n\n\nfilegroup(name = 'a_files', srcs = glob(['*.a']))";
        let once = roundtrip(src);
        let twice = roundtrip(&once);
        assert_eq!(once, twice);
        assert!(once.ends_with(")\n"));
        assert!(!once.contains("\n\n\n"));
    }

    #[test]
    fn lexical_errors_are_fatal() {
        let err = parse("x = 'abc\n").unwrap_err();
        assert_eq!(err.line, 1);
    }
}
