//! Normalization of the metadata shapes different compiler generations report.

use serde_json::json;
use std::path::PathBuf;
use tmplgraph::meta::{DependencyEntry, RawMeta, VirtualFile, normalize};

fn raw(value: serde_json::Value) -> RawMeta {
    serde_json::from_value(value).unwrap()
}

#[test]
fn older_compiler_shape() {
    let meta = normalize(
        raw(json!({
            "dependencies": [
                { "type": "require", "path": "./polyfill.js", "run": true },
                "package: ./browser.json"
            ],
            "component": { "id": "page", "modulePath": "./page.js", "legacyWrapper": true }
        })),
        "module.exports = render;",
        Vec::new(),
    );

    assert_eq!(meta.watch_files, None);
    assert_eq!(meta.declared_deps.len(), 2);
    assert!(matches!(
        &meta.declared_deps[0],
        DependencyEntry::Structured(s) if s.run && s.dep_type.as_deref() == Some("require")
    ));
    assert_eq!(meta.manifest_refs, vec!["./browser.json".to_string()]);
    assert!(meta.component_info.unwrap().legacy_wrapper);
    assert!(!meta.empty_code);
}

#[test]
fn newer_compiler_shape() {
    let origin = PathBuf::from("/srv/views/page.tmpl");
    let virtual_files = vec![VirtualFile {
        origin: origin.clone(),
        virtual_path: "./page.tmpl.css".to_string(),
        code: ".page{}".to_string(),
    }];

    let meta = normalize(
        raw(json!({
            "watchFiles": ["/srv/views/page.tmpl", "/srv/views/layout.tmpl"],
            "deps": ["./style.css"],
            "tags": ["../components/button.tmpl"]
        })),
        "\"use strict\";\n",
        virtual_files.clone(),
    );

    assert_eq!(meta.watch_files.as_ref().map(Vec::len), Some(2));
    assert_eq!(meta.declared_deps, vec![DependencyEntry::Declared("./style.css".to_string())]);
    assert!(meta.manifest_refs.is_empty());
    assert_eq!(meta.nested_refs, vec!["../components/button.tmpl".to_string()]);
    assert_eq!(meta.virtual_files, virtual_files);
    assert!(meta.component_info.is_none());
    assert!(meta.empty_code);
}

#[test]
fn empty_meta_object() {
    let meta = normalize(raw(json!({})), "", Vec::new());
    assert!(meta.declared_deps.is_empty());
    assert!(meta.nested_refs.is_empty());
    assert!(meta.virtual_files.is_empty());
    assert!(meta.empty_code);
}

#[test]
fn normalized_meta_serializes_camel_case() {
    let meta = normalize(
        raw(json!({ "watchFiles": [], "deps": ["package: ../shared"] })),
        "x()",
        Vec::new(),
    );
    let json = serde_json::to_value(&meta).unwrap();
    assert_eq!(json["manifestRefs"], json!(["../shared"]));
    assert_eq!(json["watchFiles"], json!([]));
}
