//! Concurrent requests share one compile; failures are shared but never cached.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use serde_json::json;
use tmplgraph::compiler::OutputMode;
use tmplgraph::core::EngineError;
use tmplgraph::test_utils::{StubCompiler, init_test_logging};

use crate::common::{app_path, dev_config, engine_with, prod_config};

fn slow_compiler() -> Arc<StubCompiler> {
    Arc::new(
        StubCompiler::new()
            .with_template(app_path("views/page.tmpl"), "render()", json!({ "deps": ["./a.css"] }))
            .with_delay(Duration::from_millis(50)),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_compile_once() -> Result<()> {
    init_test_logging(None);
    let compiler = slow_compiler();
    let engine = engine_with(&compiler, dev_config());
    let build = engine.begin_build();

    let tasks = (0..16).map(|i| {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let request = engine.request(app_path("views/page.tmpl"), OutputMode::BrowserModule)?;
            // Mix the three entry points that share one compile.
            match i % 3 {
                0 => engine.resolve(&build, &request).await.map(|n| n.len()),
                1 => engine.read(&build, &request).await.map(|c| c.len()),
                _ => engine.compile(&build, &request).await.map(|a| a.code.len()),
            }
        })
    });

    for joined in join_all(tasks).await {
        assert!(joined?.is_ok());
    }
    assert_eq!(compiler.calls(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failure_reaches_every_waiter_then_retries() -> Result<()> {
    init_test_logging(None);
    let compiler = slow_compiler();
    let engine = engine_with(&compiler, prod_config());
    let build = engine.begin_build();
    let request = engine.request(app_path("views/page.tmpl"), OutputMode::BrowserModule)?;

    compiler.fail_next(1);
    let results = join_all((0..8).map(|_| engine.read(&build, &request))).await;
    assert_eq!(compiler.calls(), 1);
    for result in results {
        let err = result.unwrap_err();
        assert!(matches!(err, EngineError::CompileError { .. }));
        // The compiler diagnostic stays reachable as the source.
        let source = std::error::Error::source(&err).map(ToString::to_string).unwrap_or_default();
        assert!(source.contains("unexpected token"), "got {source}");
    }

    // The failure was not cached.
    assert_eq!(engine.read(&build, &request).await?, "render()");
    assert_eq!(compiler.calls(), 2);
    Ok(())
}

#[tokio::test]
async fn test_unknown_template_is_compile_error() -> Result<()> {
    let compiler = slow_compiler();
    let engine = engine_with(&compiler, dev_config());
    let build = engine.begin_build();
    let request = engine.request(app_path("views/missing.tmpl"), OutputMode::Markup)?;

    let err = engine.resolve(&build, &request).await.unwrap_err();
    match err {
        EngineError::CompileError {
            path,
            ..
        } => assert_eq!(path, app_path("views/missing.tmpl")),
        other => panic!("expected compile error, got {other:?}"),
    }
    Ok(())
}
