//! Rule view over call expressions
//!
//! A rule is a top-level call such as `go_library(name = "x", ...)`. These
//! helpers read and edit its keyword attributes in place, so untouched
//! attributes, their order and their comments survive regeneration.

use super::expr::{Arg, Call, Expr};

impl Call {
    /// `kind(name = "name")`
    pub fn rule(kind: &str, name: &str) -> Self {
        Self {
            func: Box::new(Expr::ident(kind)),
            args: vec![Arg::keyword("name", Expr::string(name))],
            trailing_comments: Vec::new(),
        }
    }

    /// Function name when the callee is a plain identifier
    pub fn kind(&self) -> Option<&str> {
        match self.func.as_ref() {
            Expr::Ident(name) => Some(name),
            _ => None,
        }
    }

    pub fn set_kind(&mut self, kind: &str) {
        self.func = Box::new(Expr::ident(kind));
    }

    pub fn name(&self) -> Option<&str> {
        self.attr_str("name")
    }

    pub fn attr(&self, key: &str) -> Option<&Expr> {
        self.args
            .iter()
            .find(|arg| arg.name.as_deref() == Some(key))
            .map(|arg| &arg.value)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attr(key).and_then(Expr::as_str)
    }

    pub fn attr_strings(&self, key: &str) -> Option<Vec<&str>> {
        self.attr(key).and_then(Expr::as_string_list)
    }

    /// Truthy when set to the identifier `True`
    pub fn attr_true(&self, key: &str) -> bool {
        matches!(self.attr(key), Some(Expr::Ident(v)) if v == "True")
    }

    /// Replace the value of `key` in place, or append it
    pub fn set_attr(&mut self, key: &str, value: Expr) {
        match self
            .args
            .iter_mut()
            .find(|arg| arg.name.as_deref() == Some(key))
        {
            Some(arg) => arg.value = value,
            None => self.args.push(Arg::keyword(key, value)),
        }
    }

    pub fn del_attr(&mut self, key: &str) -> Option<Expr> {
        let index = self
            .args
            .iter()
            .position(|arg| arg.name.as_deref() == Some(key))?;
        Some(self.args.remove(index).value)
    }

    /// Set a string list attribute, dropping it when `values` is empty
    pub fn set_string_list(&mut self, key: &str, values: &[String]) {
        if values.is_empty() {
            self.del_attr(key);
        } else {
            self.set_attr(key, Expr::string_list(values.iter().cloned()));
        }
    }

    /// Set a string attribute, dropping it when `value` is empty
    pub fn set_string(&mut self, key: &str, value: &str) {
        if value.is_empty() {
            self.del_attr(key);
        } else {
            self.set_attr(key, Expr::string(value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_accessors() {
        let mut rule = Call::rule("go_library", "foo");
        assert_eq!(rule.kind(), Some("go_library"));
        assert_eq!(rule.name(), Some("foo"));
        assert!(rule.attr("srcs").is_none());

        rule.set_attr("srcs", Expr::string_list(["a.go"]));
        rule.set_attr("visibility", Expr::string_list(["PUBLIC"]));
        rule.set_attr("srcs", Expr::string_list(["b.go", "c.go"]));
        assert_eq!(rule.attr_strings("srcs"), Some(vec!["b.go", "c.go"]));
        let keys: Vec<_> = rule.args.iter().filter_map(|a| a.name.as_deref()).collect();
        assert_eq!(keys, vec!["name", "srcs", "visibility"]);

        assert!(rule.del_attr("srcs").is_some());
        assert!(rule.del_attr("srcs").is_none());

        rule.set_kind("go_binary");
        assert_eq!(rule.kind(), Some("go_binary"));
    }

    #[test]
    fn empty_values_remove_attributes() {
        let mut rule = Call::rule("go_library", "foo");
        rule.set_string_list("deps", &["//a".to_string()]);
        rule.set_string("_module", "x@v1");
        assert!(rule.attr("deps").is_some());

        rule.set_string_list("deps", &[]);
        rule.set_string("_module", "");
        assert!(rule.attr("deps").is_none());
        assert!(rule.attr("_module").is_none());
    }

    #[test]
    fn test_attr_true() {
        let mut rule = Call::rule("go_test", "t");
        assert!(!rule.attr_true("external"));
        rule.set_attr("external", Expr::ident("True"));
        assert!(rule.attr_true("external"));
    }
}
