mod common;

use common::{TestProject, go_sources};
use please_go::{BuildContext, GenerateError, GenerateOptions, Generator, Settings};

fn project() -> TestProject {
    let project = TestProject::new();
    project.add_file("go.mod", go_sources::GO_MOD);
    project.add_file("m.go", go_sources::ROOT_LIB);
    project.add_file("m_windows.go", go_sources::WINDOWS_ONLY);
    project.add_file("m_test.go", "package m\n\nimport \"testing\"\n");
    project.add_file("cmd/tool/main.go", go_sources::TOOL_MAIN);
    project.add_file("internal/all/a.go", go_sources::ALL_PKG);
    project.add_file("testdata/t.go", "package broken(\n");
    project.add_file("_scratch/s.go", "package scratch\n");
    project.add_dir("docs");
    project
}

fn generator(project: &TestProject, install: &[&str]) -> Generator {
    let mut options = GenerateOptions::from_settings(&Settings::default(), project.path(), "example.com/m");
    options.version = Some("v1.0.0".to_string());
    options.install = install.iter().map(|s| s.to_string()).collect();
    options.import_config_root = project.path().to_path_buf();
    Generator::new(options, BuildContext::for_platform("linux", "amd64"))
}

#[test]
fn generates_rules_for_every_package() {
    let project = project();
    generator(&project, &[".", "internal/..."]).generate().unwrap();

    let root = project.read("BUILD");
    assert!(root.starts_with("subinclude(\"///go//build_defs:go\")\n"));
    assert!(root.contains("go_library(\n    name = \"m\",\n    srcs = [\"m.go\"],\n"));
    assert!(root.contains("\"///third_party/go/github.com_dep_x//y\""));
    assert!(root.contains("_module = \"example.com/m@v1.0.0\""));
    assert!(root.contains("visibility = [\"PUBLIC\"]"));
    assert!(root.contains("cover = False"));
    assert!(!root.contains("m_windows.go"));
    assert!(!root.contains("golang.org/x/sys"));
    assert!(root.contains("filegroup(\n    name = \"installs\""));
    assert!(root.contains("\"//:m\""));
    assert!(root.contains("\"//internal/all:lib\""));

    let tool = project.read("cmd/tool/BUILD");
    assert!(tool.contains("go_binary(\n    name = \"tool\""));
    assert!(tool.contains("deps = [\"//:m\"]"));
    assert!(!tool.contains("cover"));
    assert!(!tool.contains("_module"));

    let all = project.read("internal/all/BUILD");
    assert!(all.contains("name = \"lib\""));

    assert!(!project.path().join("testdata/BUILD").exists());
    assert!(!project.path().join("_scratch/BUILD").exists());
    assert!(!project.path().join("docs/BUILD").exists());

    let config = project.read(".plzconfig");
    assert!(config.contains("ImportPath=example.com/m"));
}

#[test]
fn regeneration_is_idempotent() {
    let project = project();
    generator(&project, &["..."]).generate().unwrap();
    let first = [project.read("BUILD"), project.read("cmd/tool/BUILD"), project.read("internal/all/BUILD")];

    generator(&project, &["..."]).generate().unwrap();
    let second = [project.read("BUILD"), project.read("cmd/tool/BUILD"), project.read("internal/all/BUILD")];
    assert_eq!(first, second);
}

#[test]
fn existing_build_file_is_merged_not_replaced() {
    let project = project();
    project.add_file(
        "internal/all/BUILD",
        "# Maintained by hand\n\ngo_library(\n    name = \"lib\",\n    srcs = [\"old.go\"],\n    deps = [\"//gone\"],\n)\n\nsh_binary(\n    name = \"helper\",\n    main = \"helper.sh\",\n)\n",
    );
    generator(&project, &[]).generate().unwrap();

    let all = project.read("internal/all/BUILD");
    assert!(all.starts_with("# Maintained by hand\n"));
    assert!(all.contains("srcs = [\"a.go\"]"));
    assert!(!all.contains("//gone"));
    assert!(all.contains("sh_binary(\n    name = \"helper\""));
    assert_eq!(all.matches("go_library(").count(), 1);
    assert_eq!(all.matches("subinclude(").count(), 1);
}

#[test]
fn two_library_rules_are_fatal() {
    let project = project();
    project.add_file(
        "internal/all/BUILD",
        "go_library(name = \"a\")\n\ngo_library(name = \"b\")\n",
    );
    let err = generator(&project, &[]).generate().unwrap_err();
    assert!(matches!(err, GenerateError::TooManyPrimaryRules { .. }));
    assert_eq!(err.status_code(), "AMBIGUOUS_BUILD_FILE");
}

#[test]
fn unknown_install_package_is_an_error() {
    let project = project();
    let err = generator(&project, &["nope"]).generate().unwrap_err();
    assert!(matches!(err, GenerateError::InstallNotFound { .. }));
}

#[test]
fn update_refreshes_library_and_test_rules() {
    let project = project();
    project.add_file("BUILD", "go_library(\n    name = \"m\",\n    srcs = [],\n)\n");

    let mut generator = generator(&project, &[]);
    generator.load_manifests().unwrap();
    generator.update(&["BUILD".to_string()]).unwrap();

    let root = project.read("BUILD");
    assert!(root.contains("srcs = [\"m.go\"]"));
    assert!(root.contains("go_test(\n    name = \"m_test\",\n    srcs = [\"m_test.go\"],"));
    assert!(root.contains("\":m\""));
}

#[test]
fn missing_import_config_root_is_ignored() {
    let project = project();
    let mut options = GenerateOptions::from_settings(&Settings::default(), project.path(), "example.com/m");
    options.import_config_root = project.path().join("none");
    Generator::new(options, BuildContext::for_platform("linux", "amd64"))
        .generate()
        .unwrap();
    assert!(project.read("BUILD").contains("go_library("));
}
