//! Deterministic printer for BUILD syntax trees
//!
//! Output is stable under re-parsing: printing, parsing and printing again
//! yields the same bytes.

use super::expr::{Arg, Call, Expr, Stmt, StmtKind};

const INDENT: usize = 4;

/// Render a whole file. Top-level statements are separated by one blank line
/// and the output ends with a single newline.
pub fn format_stmts(stmts: &[Stmt]) -> String {
    let mut printer = Printer::default();
    for (i, stmt) in stmts.iter().enumerate() {
        if i > 0 {
            printer.out.push('\n');
        }
        printer.stmt(stmt);
        printer.out.push('\n');
    }
    printer.out
}

/// Render a single expression as it would appear at the top level
pub fn format_expr(expr: &Expr) -> String {
    let mut printer = Printer::default();
    printer.expr(expr, 0, false);
    printer.out
}

#[derive(Default)]
struct Printer {
    out: String,
}

impl Printer {
    fn pad(&mut self, indent: usize) {
        self.out.extend(std::iter::repeat_n(' ', indent));
    }

    fn comments(&mut self, comments: &[String], indent: usize) {
        for comment in comments {
            self.pad(indent);
            self.out.push_str(comment);
            self.out.push('\n');
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        self.comments(&stmt.comments, 0);
        match &stmt.kind {
            StmtKind::Expr(expr) => self.expr(expr, 0, false),
            StmtKind::Assign { target, op, value } => {
                self.expr(target, 0, false);
                self.out.push(' ');
                self.out.push_str(op);
                self.out.push(' ');
                self.expr(value, 0, true);
            }
            StmtKind::Comment(lines) => {
                self.out.push_str(&lines.join("\n"));
            }
            StmtKind::Raw(text) => self.out.push_str(text.trim_end()),
        }
    }

    /// `expand` allows lists and dicts to break over several lines
    fn expr(&mut self, expr: &Expr, indent: usize, expand: bool) {
        match expr {
            Expr::String(s) => self.string(s),
            Expr::Int(i) => self.out.push_str(&i.to_string()),
            Expr::Ident(name) => self.out.push_str(name),
            Expr::List(items) => self.sequence("[", "]", items, indent, expand && items.len() > 1),
            Expr::Dict(items) => self.sequence("{", "}", items, indent, expand && items.len() > 1),
            Expr::Tuple(items) => {
                if let [single] = items.as_slice() {
                    self.out.push('(');
                    self.expr(single, indent, false);
                    self.out.push_str(",)");
                } else {
                    self.sequence("(", ")", items, indent, false);
                }
            }
            Expr::KeyValue(key, value) => {
                self.expr(key, indent, false);
                self.out.push_str(": ");
                self.expr(value, indent, expand);
            }
            Expr::Call(call) => self.call(call, indent),
            Expr::Attr { value, name } => {
                self.expr(value, indent, false);
                self.out.push('.');
                self.out.push_str(name);
            }
            Expr::Index { value, index } => {
                self.expr(value, indent, false);
                self.out.push('[');
                self.expr(index, indent, false);
                self.out.push(']');
            }
            Expr::BinOp { op, lhs, rhs } => {
                self.expr(lhs, indent, expand);
                self.out.push(' ');
                self.out.push_str(op);
                self.out.push(' ');
                self.expr(rhs, indent, expand);
            }
            Expr::Unary { op, operand } => {
                self.out.push_str(op);
                if op.chars().all(char::is_alphabetic) {
                    self.out.push(' ');
                }
                self.expr(operand, indent, false);
            }
            Expr::Conditional {
                then,
                cond,
                otherwise,
            } => {
                self.expr(then, indent, expand);
                self.out.push_str(" if ");
                self.expr(cond, indent, false);
                self.out.push_str(" else ");
                self.expr(otherwise, indent, expand);
            }
            Expr::Paren(inner) => {
                self.out.push('(');
                self.expr(inner, indent, false);
                self.out.push(')');
            }
        }
    }

    fn sequence(&mut self, open: &str, close: &str, items: &[Expr], indent: usize, multiline: bool) {
        self.out.push_str(open);
        if multiline {
            self.out.push('\n');
            for item in items {
                self.pad(indent + INDENT);
                self.expr(item, indent + INDENT, false);
                self.out.push_str(",\n");
            }
            self.pad(indent);
        } else {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                self.expr(item, indent, false);
            }
        }
        self.out.push_str(close);
    }

    fn call(&mut self, call: &Call, indent: usize) {
        self.expr(&call.func, indent, false);
        self.out.push('(');
        if is_multiline(call) {
            self.out.push('\n');
            let inner = indent + INDENT;
            for arg in &call.args {
                self.comments(&arg.comments, inner);
                self.pad(inner);
                self.arg(arg, inner, true);
                self.out.push_str(",\n");
            }
            self.comments(&call.trailing_comments, inner);
            self.pad(indent);
        } else {
            for (i, arg) in call.args.iter().enumerate() {
                if i > 0 {
                    self.out.push_str(", ");
                }
                self.arg(arg, indent, false);
            }
        }
        self.out.push(')');
    }

    fn arg(&mut self, arg: &Arg, indent: usize, expand: bool) {
        if let Some(name) = &arg.name {
            self.out.push_str(name);
            self.out.push_str(" = ");
        }
        self.expr(&arg.value, indent, expand);
    }

    fn string(&mut self, s: &str) {
        self.out.push('"');
        for c in s.chars() {
            match c {
                '\\' => self.out.push_str("\\\\"),
                '"' => self.out.push_str("\\\""),
                '\n' => self.out.push_str("\\n"),
                '\t' => self.out.push_str("\\t"),
                '\r' => self.out.push_str("\\r"),
                '\0' => self.out.push_str("\\0"),
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }
}

/// Calls with keyword arguments or comments print one argument per line
fn is_multiline(call: &Call) -> bool {
    !call.trailing_comments.is_empty()
        || call
            .args
            .iter()
            .any(|arg| arg.name.is_some() || !arg.comments.is_empty())
}
