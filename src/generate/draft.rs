//! Rule drafts: everything needed to emit one rule for a Go package

use crate::buildfile::{Call, Expr};
use crate::gopkg::Package;
use crate::resolver::ImportTargetResolver;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RuleKind {
    #[default]
    GoLibrary,
    GoBinary,
    CgoLibrary,
    CgoBinary,
    GoTest,
}

impl RuleKind {
    /// Kind for a package: binaries for `main`, cgo variants when any file
    /// imports "C"
    pub fn for_package(pkg: &Package) -> Self {
        match (pkg.is_command(), pkg.uses_cgo()) {
            (true, true) => Self::CgoBinary,
            (true, false) => Self::GoBinary,
            (false, true) => Self::CgoLibrary,
            (false, false) => Self::GoLibrary,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::GoLibrary => "go_library",
            Self::GoBinary => "go_binary",
            Self::CgoLibrary => "cgo_library",
            Self::CgoBinary => "cgo_binary",
            Self::GoTest => "go_test",
        }
    }

    pub fn is_cgo(self) -> bool {
        matches!(self, Self::CgoLibrary | Self::CgoBinary)
    }

    /// Build definitions the kind is loaded from
    pub fn subinclude(self) -> &'static str {
        if self.is_cgo() {
            "///go//build_defs:cgo"
        } else {
            "///go//build_defs:go"
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds a generated library or binary may already have in a build file
pub const PRIMARY_KINDS: &[&str] = &["go_library", "cgo_library", "go_binary", "cgo_binary"];

pub const LIBRARY_KINDS: &[&str] = &["go_library", "cgo_library"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleDraft {
    pub name: String,
    pub kind: RuleKind,
    /// `module@version`, recorded on libraries
    pub module: String,
    pub srcs: Vec<String>,
    pub cgo_srcs: Vec<String>,
    pub c_srcs: Vec<String>,
    pub compiler_flags: Vec<String>,
    pub linker_flags: Vec<String>,
    pub pkg_configs: Vec<String>,
    pub asm_srcs: Vec<String>,
    pub hdrs: Vec<String>,
    pub deps: Vec<String>,
    pub embed_patterns: Vec<String>,
}

impl RuleDraft {
    /// Draft for the library or binary built from `pkg`, or `None` when it
    /// has no non-test Go sources
    pub fn library(
        pkg: &Package,
        name: String,
        module: &str,
        resolver: &ImportTargetResolver,
    ) -> Option<Self> {
        if !pkg.has_sources() {
            return None;
        }
        let mut deps = resolver.resolve_all(&pkg.imports);
        if !pkg.archive_files.is_empty() {
            deps.push(":a_files".to_string());
        }
        Some(Self {
            name,
            kind: RuleKind::for_package(pkg),
            module: module.to_string(),
            srcs: pkg.go_files.clone(),
            cgo_srcs: pkg.cgo_files.clone(),
            c_srcs: pkg.c_files.clone(),
            compiler_flags: pkg.cgo_cflags.clone(),
            linker_flags: order_linker_flags(&pkg.cgo_ldflags),
            pkg_configs: pkg.cgo_pkg_config.clone(),
            asm_srcs: pkg.s_files.clone(),
            hdrs: pkg.h_files.clone(),
            deps,
            embed_patterns: pkg.embed_patterns.clone(),
        })
    }

    /// Draft for the internal test of `pkg`, depending on `library` when the
    /// package has one
    pub fn test(
        pkg: &Package,
        library: Option<&RuleDraft>,
        fallback_name: &str,
        resolver: &ImportTargetResolver,
    ) -> Option<Self> {
        if pkg.test_go_files.is_empty() {
            return None;
        }
        let base = library.map_or(fallback_name, |lib| lib.name.as_str());
        let mut deps: Vec<String> = library.map(|lib| format!(":{}", lib.name)).into_iter().collect();
        deps.extend(resolver.resolve_all(&pkg.test_imports));
        Some(Self {
            name: format!("{base}_test"),
            kind: RuleKind::GoTest,
            srcs: pkg.test_go_files.clone(),
            deps,
            embed_patterns: pkg.test_embed_patterns.clone(),
            ..Self::default()
        })
    }

    /// Fresh call for this draft with its attributes populated
    pub fn to_call(&self) -> Call {
        let mut call = Call::rule(self.kind.as_str(), &self.name);
        self.populate(&mut call);
        call
    }

    /// Write the draft's attributes into `rule`, removing attributes that are
    /// now empty. Attributes the draft does not own are left alone.
    pub fn populate(&self, rule: &mut Call) {
        if self.cgo_srcs.is_empty() {
            rule.set_attr("srcs", Expr::string_list(self.srcs.iter().cloned()));
            rule.del_attr("go_srcs");
        } else {
            rule.set_attr("srcs", Expr::string_list(self.cgo_srcs.iter().cloned()));
            rule.set_string_list("go_srcs", &self.srcs);
        }
        rule.set_string_list("c_srcs", &self.c_srcs);
        rule.set_string_list("hdrs", &self.hdrs);
        rule.set_string_list("asm_srcs", &self.asm_srcs);
        rule.set_string_list("deps", &self.deps);
        rule.set_string_list("pkg_config", &self.pkg_configs);
        rule.set_string_list("compiler_flags", &self.compiler_flags);
        rule.set_string_list("linker_flags", &self.linker_flags);

        if self.embed_patterns.is_empty() {
            rule.del_attr("resources");
        } else {
            rule.set_attr(
                "resources",
                Expr::call("glob", vec![Expr::string_list(self.embed_patterns.iter().cloned())]),
            );
        }
        if rule.kind() == Some("go_library") {
            rule.set_string("_module", &self.module);
        }
    }
}

/// Collapse linker flags into one space separated flag so their order is fixed
pub fn order_linker_flags(flags: &[String]) -> Vec<String> {
    if flags.is_empty() {
        Vec::new()
    } else {
        vec![flags.join(" ")]
    }
}
