//! Node resolution over complete metadata, the way a host walks it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

use serde_json::json;
use tmplgraph::compiler::OutputMode;
use tmplgraph::core::EngineError;
use tmplgraph::meta::{CompileMeta, RawMeta, VirtualFile, normalize};
use tmplgraph::resolver::{DependencyNode, NodeResolver, PackageKind};

use crate::common::app_path;

fn meta(value: serde_json::Value) -> CompileMeta {
    let raw: RawMeta = serde_json::from_value(value).unwrap();
    normalize(raw, "render()", Vec::new())
}

#[test]
fn every_category_in_order() {
    let page = app_path("views/page.tmpl");
    let mut meta = meta(json!({
        "deps": ["./style.css", "package: ../shared"],
        "tags": ["./components/header.tmpl"],
        "component": { "id": "page", "modulePath": "./page.component.js" }
    }));
    meta.virtual_files.push(VirtualFile {
        origin: page.clone(),
        virtual_path: "./page.tmpl.css".to_string(),
        code: ".page{}".to_string(),
    });

    let nodes = NodeResolver::default().resolve(&meta, &page, OutputMode::BrowserModule).unwrap();

    assert_eq!(
        nodes,
        vec![
            DependencyNode::CompileUnit {
                path: app_path("views/style.css"),
                dep_type: "css".to_string(),
            },
            DependencyNode::PackageRef {
                resolved_path: app_path("shared"),
                package: PackageKind::Manifest,
            },
            DependencyNode::VirtualModule {
                resolved_path: app_path("views/page.tmpl.css"),
                dep_type: "css".to_string(),
                code: ".page{}".to_string(),
                runnable: false,
            },
            DependencyNode::PackageRef {
                resolved_path: app_path("views/components/header.tmpl"),
                package: PackageKind::Template(OutputMode::BrowserModule),
            },
            DependencyNode::Require {
                resolved_path: app_path("views/page.component.js"),
                runnable: false,
            },
        ]
    );
}

#[test]
fn host_walk_resolves_each_package_against_its_own_dir() {
    let resolver = NodeResolver::default();
    let page = app_path("views/page.tmpl");
    let header = app_path("views/components/header.tmpl");

    let mut metas: HashMap<PathBuf, CompileMeta> = HashMap::new();
    metas.insert(page.clone(), meta(json!({ "tags": ["./components/header.tmpl"] })));
    metas.insert(header.clone(), meta(json!({ "deps": ["./header.css", "../page.tmpl"] })));

    let mut queue = VecDeque::from([page.clone()]);
    let mut seen = HashSet::new();
    let mut leaves = Vec::new();
    while let Some(template) = queue.pop_front() {
        if !seen.insert(template.clone()) {
            continue;
        }
        let nodes = resolver.resolve(&metas[&template], &template, OutputMode::Markup).unwrap();
        for node in nodes {
            match node {
                DependencyNode::PackageRef {
                    resolved_path,
                    package: PackageKind::Template(mode),
                } => {
                    assert_eq!(mode, OutputMode::Markup);
                    queue.push_back(resolved_path);
                }
                other => leaves.push(other.path().to_path_buf()),
            }
        }
    }

    assert_eq!(seen.len(), 2);
    assert_eq!(leaves, vec![app_path("views/components/header.css")]);
}

#[test]
fn one_bad_entry_fails_the_whole_resolution() {
    let page = app_path("views/page.tmpl");
    let meta = meta(json!({ "deps": ["./ok.css", "./NOTICE"] }));

    let err = NodeResolver::default().resolve(&meta, &page, OutputMode::BrowserModule).unwrap_err();
    match err {
        EngineError::ResolutionError {
            entry,
            declaring,
            ..
        } => {
            assert_eq!(entry, "./NOTICE");
            assert_eq!(declaring, page);
        }
        other => panic!("expected resolution error, got {other:?}"),
    }
}

#[test]
fn custom_template_extensions() {
    let page = app_path("views/page.html");
    let meta = meta(json!({ "deps": ["./partial.html", "./other.tmpl"] }));

    let nodes = NodeResolver::new(["html"]).resolve(&meta, &page, OutputMode::Markup).unwrap();
    assert!(matches!(
        &nodes[0],
        DependencyNode::PackageRef { package: PackageKind::Template(OutputMode::Markup), .. }
    ));
    assert!(matches!(&nodes[1], DependencyNode::CompileUnit { dep_type, .. } if dep_type == "tmpl"));
}
