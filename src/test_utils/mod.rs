//! Test utilities for tmplgraph
//!
//! Stub collaborators for exercising the engine without an external compiler or a
//! real file system:
//!
//! - [`StubCompiler`]: canned compile outputs per template, with call counting,
//!   injected failures, artificial latency and reported virtual dependencies
//! - [`FixedFileSystem`]: modification times from a table
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use tmplgraph::config::EngineConfig;
//! use tmplgraph::engine::Engine;
//! use tmplgraph::test_utils::StubCompiler;
//!
//! let compiler = Arc::new(
//!     StubCompiler::new().with_template("/a/t.tmpl", "render()", json!({ "deps": ["./x.css"] })),
//! );
//! let engine = Engine::new(compiler.clone(), EngineConfig::default()).unwrap();
//! ```

use crate::compiler::{
    CompileRequest, RawCompileOutput, TemplateCompiler, VirtualDependency, VirtualFileSink,
};
use crate::core::BoxError;
use crate::staleness::FileSystem;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Only the first call has an effect. Uses `level` when given, otherwise `RUST_LOG`
/// when it is set, otherwise stays silent.
///
/// ```bash
/// RUST_LOG=cache=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

#[derive(Debug, Clone)]
struct StubTemplate {
    code: String,
    meta: serde_json::Value,
    virtual_dependencies: Vec<(PathBuf, VirtualDependency)>,
}

/// A [`TemplateCompiler`] returning canned outputs.
#[derive(Debug, Default)]
pub struct StubCompiler {
    templates: HashMap<PathBuf, StubTemplate>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    failures_left: AtomicUsize,
}

impl StubCompiler {
    /// A compiler that knows no templates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the output for `path`. `meta` uses the compiler's raw JSON shape.
    pub fn with_template(
        mut self,
        path: impl Into<PathBuf>,
        code: impl Into<String>,
        meta: serde_json::Value,
    ) -> Self {
        self.templates.insert(
            path.into(),
            StubTemplate {
                code: code.into(),
                meta,
                virtual_dependencies: Vec::new(),
            },
        );
        self
    }

    /// Report a virtual dependency from `from` whenever `path` is compiled.
    pub fn with_virtual_dependency(
        mut self,
        path: impl AsRef<Path>,
        from: impl Into<PathBuf>,
        virtual_path: &str,
        code: &str,
    ) -> Self {
        if let Some(template) = self.templates.get_mut(path.as_ref()) {
            template.virtual_dependencies.push((
                from.into(),
                VirtualDependency {
                    virtual_path: virtual_path.to_string(),
                    code: code.to_string(),
                },
            ));
        }
        self
    }

    /// Sleep this long inside every compile.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `n` compiles with a syntax error.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Number of compiles started so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn compile_stub(
        &self,
        request: &CompileRequest,
        sink: VirtualFileSink,
    ) -> Result<RawCompileOutput, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(format!("{}:1:1: unexpected token", request.source_path().display()).into());
        }

        let template = self
            .templates
            .get(request.source_path())
            .ok_or_else(|| format!("no such template: {}", request.source_path().display()))?;

        for (from, dependency) in &template.virtual_dependencies {
            sink.resolve_virtual_dependency(from, dependency.clone());
        }

        Ok(RawCompileOutput {
            code: template.code.clone(),
            meta: serde_json::from_value(template.meta.clone())?,
        })
    }
}

impl TemplateCompiler for StubCompiler {
    fn compile<'a>(
        &'a self,
        request: &'a CompileRequest,
        sink: VirtualFileSink,
    ) -> BoxFuture<'a, Result<RawCompileOutput, BoxError>> {
        Box::pin(self.compile_stub(request, sink))
    }
}

/// A [`FileSystem`] answering from a table of millisecond timestamps.
#[derive(Debug, Clone, Default)]
pub struct FixedFileSystem {
    times: HashMap<PathBuf, u64>,
}

impl FixedFileSystem {
    /// An empty table; every lookup fails with `NotFound`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `millis` as the modification time of `path`.
    pub fn with_file(mut self, path: impl Into<PathBuf>, millis: u64) -> Self {
        self.times.insert(path.into(), millis);
        self
    }
}

impl FileSystem for FixedFileSystem {
    fn modified<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<SystemTime>> {
        let result = self
            .times
            .get(path)
            .map(|ms| UNIX_EPOCH + Duration::from_millis(*ms))
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display()))
            });
        Box::pin(async move { result })
    }
}
