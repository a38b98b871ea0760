//! Syntax tree for BUILD files
//!
//! Every node carries exactly what the printer needs to reproduce it. Anything
//! the parser does not model (function definitions, comprehensions, control
//! flow) is kept verbatim as [`StmtKind::Raw`].

/// An expression node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    String(String),
    Int(i64),
    /// Identifier, possibly dotted (`CONFIG.GOOS`)
    Ident(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    /// `key: value`, only found inside a [`Expr::Dict`]
    KeyValue(Box<Expr>, Box<Expr>),
    Dict(Vec<Expr>),
    Call(Call),
    /// Attribute access on a non-identifier, e.g. `"".join`
    Attr { value: Box<Expr>, name: String },
    Index { value: Box<Expr>, index: Box<Expr> },
    BinOp {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary { op: String, operand: Box<Expr> },
    /// `then if cond else otherwise`
    Conditional {
        then: Box<Expr>,
        cond: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Paren(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub func: Box<Expr>,
    pub args: Vec<Arg>,
    /// Comments after the last argument, before the closing parenthesis
    pub trailing_comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arg {
    /// Keyword, or `None` for a positional argument
    pub name: Option<String>,
    pub value: Expr,
    /// Comment lines directly above the argument
    pub comments: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stmt {
    /// Comment lines attached directly above the statement
    pub comments: Vec<String>,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StmtKind {
    Expr(Expr),
    Assign {
        target: Expr,
        /// `=`, `+=` and friends
        op: String,
        value: Expr,
    },
    /// A comment block separated from its neighbours by blank lines
    Comment(Vec<String>),
    /// Source text kept as written
    Raw(String),
}

impl Expr {
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    pub fn ident(name: impl Into<String>) -> Self {
        Self::Ident(name.into())
    }

    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|s| Self::String(s.into())).collect())
    }

    /// `func(arg, ...)` with positional arguments only
    pub fn call(func: &str, args: Vec<Expr>) -> Self {
        Self::Call(Call {
            func: Box::new(Self::ident(func)),
            args: args.into_iter().map(Arg::positional).collect(),
            trailing_comments: Vec::new(),
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Items of a list made only of string literals
    pub fn as_string_list(&self) -> Option<Vec<&str>> {
        match self {
            Self::List(items) => items.iter().map(Self::as_str).collect(),
            _ => None,
        }
    }

    pub fn as_call(&self) -> Option<&Call> {
        match self {
            Self::Call(call) => Some(call),
            _ => None,
        }
    }
}

impl Arg {
    pub fn positional(value: Expr) -> Self {
        Self {
            name: None,
            value,
            comments: Vec::new(),
        }
    }

    pub fn keyword(name: impl Into<String>, value: Expr) -> Self {
        Self {
            name: Some(name.into()),
            value,
            comments: Vec::new(),
        }
    }
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            comments: Vec::new(),
            kind,
        }
    }

    pub fn expr(expr: Expr) -> Self {
        Self::new(StmtKind::Expr(expr))
    }

    pub fn call(call: Call) -> Self {
        Self::expr(Expr::Call(call))
    }

    /// The call this statement consists of, if it is a bare call
    pub fn as_call(&self) -> Option<&Call> {
        match &self.kind {
            StmtKind::Expr(Expr::Call(call)) => Some(call),
            _ => None,
        }
    }

    pub fn as_call_mut(&mut self) -> Option<&mut Call> {
        match &mut self.kind {
            StmtKind::Expr(Expr::Call(call)) => Some(call),
            _ => None,
        }
    }
}
