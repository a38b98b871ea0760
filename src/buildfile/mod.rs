//! BUILD file reading, editing and formatting
//!
//! Files are parsed into a small syntax tree rather than edited as text, so
//! regenerating a file is idempotent and hand-written parts are preserved.

pub mod expr;
pub mod file;
pub mod lexer;
pub mod parser;
pub mod print;
pub mod rule;

pub use expr::{Arg, Call, Expr, Stmt, StmtKind};
pub use file::BuildFile;
pub use print::{format_expr, format_stmts};
