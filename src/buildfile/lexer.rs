//! Tokenizer for the BUILD language
//!
//! Newlines are only significant outside brackets; inside `()`, `[]` and `{}`
//! they are dropped. Comments are kept as tokens so the parser can carry them
//! through a rewrite.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Int(i64),
    Str(String),
    Punct(&'static str),
    /// Comment text including the leading `#`
    Comment(String),
    Newline,
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "identifier {name}"),
            Self::Int(value) => write!(f, "integer {value}"),
            Self::Str(_) => f.write_str("string"),
            Self::Punct(p) => write!(f, "'{p}'"),
            Self::Comment(_) => f.write_str("comment"),
            Self::Newline => f.write_str("newline"),
            Self::Eof => f.write_str("end of file"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    /// 1-based
    pub line: usize,
    /// 1-based
    pub column: usize,
    /// Byte offset of the token start
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub line: usize,
    pub column: usize,
    pub reason: String,
}

// Longest first so that `==` wins over `=`
const PUNCTUATION: &[&str] = &[
    "**=", "//=", "**", "//", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=", "%=", "|=", "&=",
    "->", "(", ")", "[", "]", "{", "}", ",", ":", ";", ".", "=", "+", "-", "*", "/", "%", "<",
    ">", "|", "&", "^", "~", "@",
];

const STRING_PREFIXES: &[&str] = &["r", "b", "u", "f", "rb", "br", "fr", "rf"];

pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    line_start: usize,
    depth: usize,
    tokens: Vec<Spanned>,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            line_start: 0,
            depth: 0,
            tokens: Vec::new(),
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Spanned>, LexError> {
        while let Some(c) = self.peek() {
            match c {
                '\n' => {
                    self.bump();
                    self.newline();
                }
                ' ' | '\t' | '\r' => {
                    self.bump();
                }
                '\\' if self.src[self.pos + 1..].starts_with('\n') => {
                    self.bump();
                    self.bump();
                    self.newline_in_token();
                }
                '#' => self.comment(),
                '"' | '\'' => self.string(false)?,
                c if c.is_ascii_digit() => self.number()?,
                c if c.is_alphabetic() || c == '_' => self.ident_or_prefixed_string()?,
                _ => self.punct()?,
            }
        }
        if self.depth > 0 {
            return Err(self.error("unexpected end of file: unclosed bracket"));
        }
        let (line, column, offset) = (self.line, self.column(), self.pos);
        if !matches!(self.tokens.last().map(|t| &t.token), Some(Token::Newline) | None) {
            self.tokens.push(Spanned {
                token: Token::Newline,
                line,
                column,
                offset,
            });
        }
        self.tokens.push(Spanned {
            token: Token::Eof,
            line,
            column,
            offset,
        });
        Ok(self.tokens)
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn column(&self) -> usize {
        self.src[self.line_start..self.pos].chars().count() + 1
    }

    fn error(&self, reason: impl Into<String>) -> LexError {
        LexError {
            line: self.line,
            column: self.column(),
            reason: reason.into(),
        }
    }

    fn push(&mut self, token: Token, line: usize, column: usize, offset: usize) {
        self.tokens.push(Spanned {
            token,
            line,
            column,
            offset,
        });
    }

    // Called after consuming a '\n' that is not part of a token
    fn newline(&mut self) {
        let offset = self.pos - 1;
        let column = self.column();
        let line = self.line;
        self.newline_in_token();
        let last = self.tokens.last().map(|t| &t.token);
        if self.depth == 0 && !matches!(last, Some(Token::Newline) | None) {
            self.push(Token::Newline, line, column, offset);
        }
    }

    fn newline_in_token(&mut self) {
        self.line += 1;
        self.line_start = self.pos;
    }

    fn comment(&mut self) {
        let (line, column, start) = (self.line, self.column(), self.pos);
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.bump();
        }
        let text = self.src[start..self.pos].trim_end().to_string();
        self.push(Token::Comment(text), line, column, start);
    }

    fn number(&mut self) -> Result<(), LexError> {
        let (line, column, start) = (self.line, self.column(), self.pos);
        while let Some(c) = self.peek() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                break;
            }
            self.bump();
        }
        let text = self.src[start..self.pos].replace('_', "");
        let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            i64::from_str_radix(hex, 16)
        } else if let Some(oct) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
            i64::from_str_radix(oct, 8)
        } else {
            text.parse::<i64>()
        }
        .map_err(|_| self.error(format!("invalid integer literal {text}")))?;
        self.push(Token::Int(value), line, column, start);
        Ok(())
    }

    fn ident_or_prefixed_string(&mut self) -> Result<(), LexError> {
        let (line, column, start) = (self.line, self.column(), self.pos);
        while let Some(c) = self.peek() {
            if !(c.is_alphanumeric() || c == '_') {
                break;
            }
            self.bump();
        }
        let word = &self.src[start..self.pos];
        if matches!(self.peek(), Some('"' | '\'')) && STRING_PREFIXES.contains(&word.to_ascii_lowercase().as_str()) {
            let raw = word.to_ascii_lowercase().contains('r');
            // Lex the literal after the prefix but report it at the prefix position
            let before = self.tokens.len();
            self.string(raw)?;
            if let Some(token) = self.tokens.get_mut(before) {
                token.column = column;
                token.offset = start;
                token.line = line;
            }
            return Ok(());
        }
        let word = word.to_string();
        self.push(Token::Ident(word), line, column, start);
        Ok(())
    }

    fn string(&mut self, raw: bool) -> Result<(), LexError> {
        let (line, column, start) = (self.line, self.column(), self.pos);
        let Some(quote) = self.bump() else {
            return Err(self.error("expected string"));
        };
        let triple = self.src[self.pos..].starts_with(&format!("{quote}{quote}"));
        if triple {
            self.bump();
            self.bump();
        }

        let mut value = String::new();
        loop {
            let Some(c) = self.bump() else {
                return Err(LexError {
                    line,
                    column,
                    reason: "unterminated string".to_string(),
                });
            };
            match c {
                c if c == quote => {
                    if !triple {
                        break;
                    }
                    if self.src[self.pos..].starts_with(&format!("{quote}{quote}")) {
                        self.bump();
                        self.bump();
                        break;
                    }
                    value.push(c);
                }
                '\n' => {
                    if !triple {
                        return Err(LexError {
                            line,
                            column,
                            reason: "unterminated string".to_string(),
                        });
                    }
                    self.newline_in_token();
                    value.push('\n');
                }
                '\\' if raw => {
                    value.push('\\');
                    if let Some(next) = self.bump() {
                        if next == '\n' {
                            self.newline_in_token();
                        }
                        value.push(next);
                    }
                }
                '\\' => match self.bump() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('0') => value.push('\0'),
                    Some('\\') => value.push('\\'),
                    Some('"') => value.push('"'),
                    Some('\'') => value.push('\''),
                    Some('\n') => self.newline_in_token(),
                    Some(other) => {
                        value.push('\\');
                        value.push(other);
                    }
                    None => {
                        return Err(LexError {
                            line,
                            column,
                            reason: "unterminated string".to_string(),
                        });
                    }
                },
                c => value.push(c),
            }
        }
        self.push(Token::Str(value), line, column, start);
        Ok(())
    }

    fn punct(&mut self) -> Result<(), LexError> {
        let (line, column, start) = (self.line, self.column(), self.pos);
        let rest = &self.src[self.pos..];
        let Some(p) = PUNCTUATION.iter().copied().find(|p| rest.starts_with(p)) else {
            let c = self.peek().unwrap_or('?');
            return Err(self.error(format!("unexpected character {c:?}")));
        };
        self.pos += p.len();
        match p {
            "(" | "[" | "{" => self.depth += 1,
            ")" | "]" | "}" => {
                if self.depth == 0 {
                    return Err(LexError {
                        line,
                        column,
                        reason: format!("unmatched '{p}'"),
                    });
                }
                self.depth -= 1;
            }
            _ => {}
        }
        self.push(Token::Punct(p), line, column, start);
        Ok(())
    }
}

pub fn tokenize(src: &str) -> Result<Vec<Spanned>, LexError> {
    Lexer::new(src).tokenize()
}
