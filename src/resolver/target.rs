//! Build target labels and the naming rules shared by the generator and resolver

use std::fmt;

/// A fully qualified build target: `///subrepo//package:name`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetLabel {
    /// Subrepo qualifier, empty for the current repository
    pub subrepo: String,
    /// Package directory relative to the (sub)repo root, empty for the root
    pub package: String,
    pub name: String,
}

impl TargetLabel {
    pub fn new(
        subrepo: impl Into<String>,
        package: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let package = package.into();
        Self {
            subrepo: subrepo.into(),
            package: if package == "." { String::new() } else { package },
            name: name.into(),
        }
    }
}

impl fmt::Display for TargetLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.subrepo.is_empty() {
            write!(f, "///{}", self.subrepo)?;
        }
        // Labels are always absolute
        f.write_str("//")?;
        if self.package.is_empty() {
            return write!(f, ":{}", self.name);
        }
        f.write_str(&self.package)?;
        if base_name(&self.package) != self.name {
            write!(f, ":{}", self.name)?;
        }
        Ok(())
    }
}

/// Render the label for `name` in `package`, optionally inside `subrepo`
pub fn build_target(name: &str, package: &str, subrepo: &str) -> String {
    TargetLabel::new(subrepo, package, name).to_string()
}

/// Library target name for `package` (relative to `module`).
///
/// The module root takes the module's basename and a package called `all` is
/// named `lib`, since `all` is reserved by the build tool.
pub fn name_for_lib_in_pkg(module: &str, package: &str) -> String {
    let name = if package.is_empty() || package == "." {
        base_name(module)
    } else {
        base_name(package)
    };
    if name == "all" {
        "lib".to_string()
    } else {
        name.to_string()
    }
}

/// Path-aware prefix removal: strips `base` from `target` when `target` lies
/// inside it, otherwise returns `target` untouched.
pub fn trim_path(target: &str, base: &str) -> String {
    let base_parts = components(base);
    let target_parts = components(target);

    if target_parts.len() < base_parts.len() {
        return target.to_string();
    }
    if base_parts.iter().zip(&target_parts).any(|(b, t)| b != t) {
        return target.to_string();
    }
    target_parts[base_parts.len()..].join("/")
}

/// True when `prefix` equals `path` or is an ancestor of it by whole components
pub fn has_path_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
        None => false,
    }
}

/// Subrepo holding `module` under `third_party_folder`
pub fn subrepo_name(third_party_folder: &str, module: &str) -> String {
    let flattened = module.replace('/', "_");
    let folder = third_party_folder.trim_end_matches('/');
    if folder.is_empty() {
        flattened
    } else {
        format!("{folder}/{flattened}")
    }
}

fn base_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

// Cleaned components: empty and `.` parts dropped
fn components(path: &str) -> Vec<&str> {
    path.split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect()
}
