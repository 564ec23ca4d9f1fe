//! The dependency types a host registers, driven the way a host drives them.

use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use tmplgraph::compiler::OutputMode;
use tmplgraph::config::EngineConfig;
use tmplgraph::core::EngineError;
use tmplgraph::engine::TemplateDependency;
use tmplgraph::resolver::DependencyNode;
use tmplgraph::test_utils::StubCompiler;

use crate::common::{app_path, app_root, dev_config, engine_with, prod_config};

fn compiler() -> Arc<StubCompiler> {
    Arc::new(StubCompiler::new().with_template(
        app_path("views/page.tmpl"),
        "render()",
        json!({ "deps": ["./style.css"], "watchFiles": [] }),
    ))
}

#[test]
fn test_registered_types() {
    let compiler = compiler();
    let config = EngineConfig {
        type_name: "marko".to_string(),
        ..dev_config()
    };
    let engine = engine_with(&compiler, config);

    let types: Vec<_> =
        engine.dependency_types().iter().map(|t| (t.name().to_string(), t.mode())).collect();
    assert_eq!(
        types,
        vec![
            ("marko".to_string(), OutputMode::BrowserModule),
            ("marko-hydrate".to_string(), OutputMode::HydrateInit),
            ("marko-dependencies".to_string(), OutputMode::HydrateRegister),
        ]
    );
}

#[test]
fn test_init_without_path_fails_synchronously() {
    let err = TemplateDependency::init(None, &app_root()).unwrap_err();
    assert!(matches!(err, EngineError::ConfigError { .. }));
}

#[tokio::test]
async fn test_full_host_cycle() -> Result<()> {
    let compiler = compiler();
    let engine = engine_with(&compiler, prod_config());
    let types = engine.dependency_types();
    let base = &types[0];

    let dependency = TemplateDependency::init(Some("./page.tmpl"), &app_path("views"))?;
    assert_eq!(dependency.path(), app_path("views/page.tmpl"));
    assert_eq!(
        base.calculate_key(&dependency),
        format!("tmpl:{}", app_path("views/page.tmpl").display())
    );

    let build = engine.begin_build();
    let nodes = base.resolve_node(&build, &dependency).await?;
    assert!(matches!(&nodes[..], [DependencyNode::CompileUnit { dep_type, .. }] if dep_type == "css"));
    assert_eq!(base.read_artifact(&build, &dependency).await?, "render()");
    assert_eq!(base.get_staleness(&build, &dependency).await, 1);
    engine.end_build(&build);

    assert_eq!(compiler.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_types_share_one_engine_cache() -> Result<()> {
    let compiler = compiler();
    let engine = engine_with(&compiler, dev_config());
    let types = engine.dependency_types();
    let dependency = TemplateDependency::init(Some("page.tmpl"), &app_path("views"))?;
    let build = engine.begin_build();

    // hydrate-init resolves without a compile; hydrate-dependencies compiles once.
    let init_nodes = types[1].resolve_node(&build, &dependency).await?;
    assert_eq!(init_nodes.len(), 2);
    assert_eq!(compiler.calls(), 0);

    types[2].resolve_node(&build, &dependency).await?;
    types[2].read_artifact(&build, &dependency).await?;
    assert_eq!(compiler.calls(), 1);
    Ok(())
}
