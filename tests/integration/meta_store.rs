//! Production metadata persisted across engine instances.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tempfile::TempDir;
use tmplgraph::cache::MetaStore;
use tmplgraph::compiler::OutputMode;
use tmplgraph::config::EngineConfig;
use tmplgraph::test_utils::StubCompiler;

use crate::common::{app_path, dev_config, engine_with, prod_config};

fn page_compiler() -> Arc<StubCompiler> {
    Arc::new(StubCompiler::new().with_template(
        app_path("views/page.tmpl"),
        "render()",
        json!({ "deps": ["./style.css"], "watchFiles": [] }),
    ))
}

fn with_store(base: EngineConfig, dir: &TempDir) -> EngineConfig {
    EngineConfig {
        meta_cache_dir: Some(dir.path().join("meta")),
        ..base
    }
}

#[tokio::test]
async fn test_second_process_resolves_without_compiling() -> Result<()> {
    let dir = TempDir::new()?;

    let first = page_compiler();
    let engine = engine_with(&first, with_store(prod_config(), &dir));
    let build = engine.begin_build();
    let request = engine.request(app_path("views/page.tmpl"), OutputMode::BrowserModule)?;
    let nodes = engine.resolve(&build, &request).await?;
    assert_eq!(first.calls(), 1);

    let store = MetaStore::new(dir.path().join("meta"));
    assert!(store.entry_path(&request.cache_key()).exists());

    // A fresh engine stands in for the next process.
    let second = page_compiler();
    let engine = engine_with(&second, with_store(prod_config(), &dir));
    let build = engine.begin_build();
    assert_eq!(engine.resolve(&build, &request).await?, nodes);
    assert_eq!(second.calls(), 0);

    // Code is not persisted, so reading still compiles.
    assert_eq!(engine.read(&build, &request).await?, "render()");
    assert_eq!(second.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_development_ignores_the_store() -> Result<()> {
    let dir = TempDir::new()?;
    let compiler = page_compiler();
    let engine = engine_with(&compiler, with_store(dev_config(), &dir));
    let build = engine.begin_build();
    let request = engine.request(app_path("views/page.tmpl"), OutputMode::BrowserModule)?;

    engine.resolve(&build, &request).await?;
    assert!(!dir.path().join("meta").exists());
    Ok(())
}

#[tokio::test]
async fn test_corrupt_entry_falls_back_to_compile() -> Result<()> {
    let dir = TempDir::new()?;
    let compiler = page_compiler();
    let engine = engine_with(&compiler, with_store(prod_config(), &dir));
    let request = engine.request(app_path("views/page.tmpl"), OutputMode::BrowserModule)?;

    let store = MetaStore::new(dir.path().join("meta"));
    let entry = store.entry_path(&request.cache_key());
    std::fs::create_dir_all(dir.path().join("meta"))?;
    std::fs::write(&entry, "{ not json")?;

    let build = engine.begin_build();
    assert_eq!(engine.resolve(&build, &request).await?.len(), 1);
    assert_eq!(compiler.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_edited_template_is_recompiled_by_next_process() -> Result<()> {
    let dir = TempDir::new()?;
    let source = dir.path().join("views").join("page.tmpl");
    std::fs::create_dir_all(source.parent().unwrap())?;
    std::fs::write(&source, "<div/>")?;
    let compiler = || {
        Arc::new(StubCompiler::new().with_template(
            source.clone(),
            "render()",
            json!({ "deps": ["./style.css"], "watchFiles": [] }),
        ))
    };

    let first = compiler();
    let engine = engine_with(&first, with_store(prod_config(), &dir));
    let request = engine.request(source.clone(), OutputMode::BrowserModule)?;
    engine.resolve(&engine.begin_build(), &request).await?;
    assert_eq!(first.calls(), 1);

    std::fs::write(&source, "<div class=\"edited\"/>")?;

    let second = compiler();
    let engine = engine_with(&second, with_store(prod_config(), &dir));
    engine.resolve(&engine.begin_build(), &request).await?;
    assert_eq!(second.calls(), 1);
    Ok(())
}
