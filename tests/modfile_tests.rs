mod common;

use common::fixture;
use please_go::ManifestError;
use please_go::modfile::{ModFile, ParseMode, combined_deps_and_replacements};

#[test]
fn host_and_module_deps_are_concatenated() {
    let host = fixture("gomod/host_go_mod");
    let module = fixture("gomod/module_go_mod");

    let combined = combined_deps_and_replacements(Some(&host), &module).unwrap();
    assert_eq!(
        combined.deps,
        vec![
            "example.com/foo",
            "example.com/bar",
            "example.com/bob",
            "example.com/dob",
            "example.com/bab",
        ]
    );
    // The host's replacements are authoritative
    assert_eq!(combined.replacements.len(), 1);
    assert_eq!(
        combined.replacements.get("example.com/bob").map(String::as_str),
        Some("example.com/new-bob")
    );
}

#[test]
fn module_replacements_apply_without_host() {
    let combined = combined_deps_and_replacements(None, &fixture("gomod/module_go_mod")).unwrap();
    assert_eq!(combined.deps, vec!["example.com/dob", "example.com/bab"]);
    assert_eq!(
        combined.replacements.get("example.com/bab").map(String::as_str),
        Some("example.com/new-bab")
    );
}

#[test]
fn missing_module_file_yields_host_results() {
    let host = fixture("gomod/host_go_mod");
    let combined =
        combined_deps_and_replacements(Some(&host), &fixture("gomod/does_not_exist")).unwrap();
    assert_eq!(combined.deps.len(), 3);
    assert!(combined.replacements.contains_key("example.com/bob"));
}

#[test]
fn invalid_host_file_is_an_error() {
    let err = combined_deps_and_replacements(
        Some(&fixture("gomod/invalid_go_mod")),
        &fixture("gomod/module_go_mod"),
    )
    .unwrap_err();
    assert!(matches!(err, ManifestError::Host { .. }));
}

#[test]
fn invalid_module_file_without_host_is_an_error() {
    let err = combined_deps_and_replacements(None, &fixture("gomod/invalid_go_mod")).unwrap_err();
    assert!(matches!(err, ManifestError::Module { .. }));
}

#[test]
fn lax_parse_reads_module_and_requirements() {
    let manifest = ModFile::read(&fixture("gomod/host_go_mod"), ParseMode::Lax).unwrap();
    assert_eq!(manifest.module.as_deref(), Some("example.com/host"));
    assert_eq!(manifest.require.len(), 3);
    assert!(manifest.require[2].indirect);
    assert!(manifest.replace.is_empty());
}
