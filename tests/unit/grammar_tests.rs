//! Dependency strings and manifest pragmas as compilers actually emit them.

use tmplgraph::meta::grammar::{parse_dependency, parse_manifest_pragma};

#[test]
fn whitespace_separated_type() {
    let parsed = parse_dependency("less ./theme.less").unwrap();
    assert_eq!(parsed.declared_type, Some("less"));
    assert_eq!(parsed.path, "./theme.less");
}

#[test]
fn declared_type_wins_over_extension() {
    let parsed = parse_dependency("js: ./data.json").unwrap();
    assert_eq!(parsed.extension, Some("json"));
    assert_eq!(parsed.effective_type(), Some("js"));
}

#[test]
fn package_directory_has_no_extension() {
    let parsed = parse_dependency("package: ../shared").unwrap();
    assert_eq!(parsed.declared_type, Some("package"));
    assert_eq!(parsed.path, "../shared");
    assert_eq!(parsed.extension, None);
    assert_eq!(parse_manifest_pragma("package: ../shared"), Some("../shared"));
}

#[test]
fn surrounding_whitespace_is_ignored() {
    let parsed = parse_dependency("  ./style.css  ").unwrap();
    assert_eq!(parsed.path, "./style.css");
    assert_eq!(parse_manifest_pragma("  package ./pkg.json "), Some("./pkg.json"));
}

#[test]
fn hyphenated_type_names() {
    let parsed = parse_dependency("tmpl-dependencies: ./child.tmpl").unwrap();
    assert_eq!(parsed.declared_type, Some("tmpl-dependencies"));
    assert_eq!(parsed.extension, Some("tmpl"));
}
