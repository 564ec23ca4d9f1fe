//! Resolving a compiled template into dependency nodes.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tmplgraph::compiler::OutputMode;
use tmplgraph::core::EngineError;
use tmplgraph::resolver::{DependencyNode, PackageKind};
use tmplgraph::test_utils::StubCompiler;

use crate::common::{app_path, dev_config, engine_with, prod_config};

fn page_compiler() -> Arc<StubCompiler> {
    Arc::new(StubCompiler::new().with_template(
        app_path("views/page.tmpl"),
        "render()",
        json!({ "deps": ["./style.css", "package: ../shared"] }),
    ))
}

#[tokio::test]
async fn test_declared_deps_and_package_pragma() -> Result<()> {
    let compiler = page_compiler();
    let engine = engine_with(&compiler, dev_config());
    let build = engine.begin_build();
    let request = engine.request(app_path("views/page.tmpl"), OutputMode::BrowserModule)?;

    let nodes = engine.resolve(&build, &request).await?;
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
        ]
    );

    // Same build: served from cache, and read shares the compile.
    let again = engine.resolve(&build, &request).await?;
    assert_eq!(again, nodes);
    assert_eq!(engine.read(&build, &request).await?, "render()");
    assert_eq!(compiler.calls(), 1);

    engine.end_build(&build);
    Ok(())
}

#[tokio::test]
async fn test_dev_mode_recompiles_per_build() -> Result<()> {
    let compiler = page_compiler();
    let engine = engine_with(&compiler, dev_config());
    let request = engine.request(app_path("views/page.tmpl"), OutputMode::BrowserModule)?;

    for _ in 0..3 {
        let build = engine.begin_build();
        engine.resolve(&build, &request).await?;
        engine.end_build(&build);
    }
    assert_eq!(compiler.calls(), 3);
    Ok(())
}

#[tokio::test]
async fn test_ended_build_leaves_no_cache_behind() -> Result<()> {
    let compiler = page_compiler();
    let engine = engine_with(&compiler, dev_config());
    let request = engine.request(app_path("views/page.tmpl"), OutputMode::BrowserModule)?;

    let build = engine.begin_build();
    engine.resolve(&build, &request).await?;
    engine.end_build(&build);

    // Reusing a finished build still works but nothing is retained.
    engine.resolve(&build, &request).await?;
    assert_eq!(engine.cache_stats().entries, 0);
    assert_eq!(compiler.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_production_reuses_across_builds() -> Result<()> {
    let compiler = page_compiler();
    let engine = engine_with(&compiler, prod_config());
    let request = engine.request(app_path("views/page.tmpl"), OutputMode::BrowserModule)?;

    for _ in 0..3 {
        let build = engine.begin_build();
        engine.resolve(&build, &request).await?;
        engine.end_build(&build);
    }
    assert_eq!(compiler.calls(), 1);

    engine.flush();
    let build = engine.begin_build();
    engine.resolve(&build, &request).await?;
    assert_eq!(compiler.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_modes_are_cached_separately() -> Result<()> {
    let compiler = page_compiler();
    let engine = engine_with(&compiler, prod_config());
    let build = engine.begin_build();

    for mode in [OutputMode::Markup, OutputMode::BrowserModule, OutputMode::Markup] {
        let request = engine.request(app_path("views/page.tmpl"), mode)?;
        engine.read(&build, &request).await?;
    }
    assert_eq!(compiler.calls(), 2);

    let stats = engine.cache_stats();
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 1);
    Ok(())
}

#[tokio::test]
async fn test_virtual_dependencies_become_modules() -> Result<()> {
    let page = app_path("views/page.tmpl");
    let compiler = Arc::new(
        StubCompiler::new()
            .with_template(&page, "render()", json!({}))
            .with_virtual_dependency(&page, &page, "./page.tmpl.css", ".page{}")
            .with_virtual_dependency(&page, app_path("views/parts/item.tmpl"), "./item.tmpl.css", ".item{}"),
    );
    let engine = engine_with(&compiler, dev_config());
    let build = engine.begin_build();
    let request = engine.request(&page, OutputMode::BrowserModule)?;

    let paths: Vec<_> = engine
        .resolve(&build, &request)
        .await?
        .iter()
        .map(|n| n.path().to_path_buf())
        .collect();
    assert_eq!(paths, vec![app_path("views/page.tmpl.css"), app_path("views/parts/item.tmpl.css")]);
    Ok(())
}

#[tokio::test]
async fn test_unresolvable_entry_fails_request() -> Result<()> {
    let page = app_path("views/page.tmpl");
    let compiler = Arc::new(StubCompiler::new().with_template(
        &page,
        "render()",
        json!({ "deps": ["./style.css", "./Makefile"] }),
    ));
    let engine = engine_with(&compiler, dev_config());
    let build = engine.begin_build();
    let request = engine.request(&page, OutputMode::BrowserModule)?;

    let err = engine.resolve(&build, &request).await.unwrap_err();
    assert!(matches!(err, EngineError::ResolutionError { .. }));
    assert!(err.to_string().contains("./Makefile"));
    Ok(())
}

#[tokio::test]
async fn test_relative_request_path_is_config_error() {
    let compiler = page_compiler();
    let engine = engine_with(&compiler, dev_config());
    let err = engine.request("views/page.tmpl", OutputMode::Markup).unwrap_err();
    assert!(matches!(err, EngineError::ConfigError { .. }));
}
