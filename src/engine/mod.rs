//! The engine: an explicitly constructed owner of the compiler client, the cache and
//! the configuration.
//!
//! Everything the host needs goes through [`Engine`]. There is no process-wide
//! compiler state; two engines with different configurations can live side by side.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tmplgraph::compiler::{CommandCompiler, OutputMode};
//! use tmplgraph::config::EngineConfig;
//! use tmplgraph::engine::Engine;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = EngineConfig::load().await?;
//! let compiler = Arc::new(CommandCompiler::from_config(&config.compiler)?);
//! let engine = Engine::new(compiler, config)?;
//!
//! let build = engine.begin_build();
//! let request = engine.request("/app/views/page.tmpl", OutputMode::BrowserModule)?;
//! for node in engine.resolve(&build, &request).await? {
//!     println!("{node:?}");
//! }
//! engine.end_build(&build);
//! # Ok(())
//! # }
//! ```

pub mod host;

pub use host::{TemplateDependency, TemplateDependencyType, dependency_type_names};

use crate::cache::{BuildContext, CacheStats, CompilationCache, MetaStore};
use crate::compiler::{CompileInvoker, CompileOptions, CompileRequest, OutputMode, TemplateCompiler};
use crate::config::EngineConfig;
use crate::core::{EngineError, Result};
use crate::meta::{CompileMeta, CompiledArtifact, normalize};
use crate::resolver::{DependencyNode, NodeResolver, companion_module, expand_hydrate_init, init_code};
use crate::staleness::{FileSystem, Staleness, StalenessEvaluator};
use std::path::PathBuf;
use std::sync::Arc;

/// Template dependency engine.
pub struct Engine {
    config: EngineConfig,
    dev_mode: bool,
    invoker: CompileInvoker,
    cache: CompilationCache,
    resolver: NodeResolver,
    staleness: StalenessEvaluator,
    meta_store: Option<MetaStore>,
    compile_options: Arc<CompileOptions>,
}

impl Engine {
    /// Build an engine around `compiler`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::core::EngineError::ConfigError`] when `config` is invalid.
    pub fn new(compiler: Arc<dyn TemplateCompiler>, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let dev_mode = config.is_dev();
        let policy = config.effective_cache_policy();
        let meta_store = if dev_mode {
            None
        } else {
            config.meta_cache_dir.clone().map(MetaStore::new)
        };

        tracing::debug!(
            target: "engine",
            "Engine '{}' ready (dev_mode={}, cache={:?}, meta_store={})",
            config.type_name,
            dev_mode,
            policy,
            meta_store.as_ref().map_or_else(|| "off".to_string(), |s| s.dir().display().to_string())
        );

        Ok(Self {
            dev_mode,
            invoker: CompileInvoker::new(compiler),
            cache: CompilationCache::new(policy),
            resolver: NodeResolver::new(config.template_extensions.iter().cloned()),
            staleness: StalenessEvaluator::default(),
            meta_store,
            compile_options: Arc::new(config.compile_options()),
            config,
        })
    }

    /// Use `fs` for modification-time lookups.
    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.staleness = StalenessEvaluator::new(fs);
        self
    }

    /// The configuration this engine was built with.
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the engine runs in development mode.
    pub const fn is_dev(&self) -> bool {
        self.dev_mode
    }

    /// Start a build. Scoped caches live until [`Engine::end_build`].
    pub fn begin_build(&self) -> BuildContext {
        let ctx = self.cache.begin_build();
        tracing::debug!(target: "engine", "Build {} started", ctx.id());
        ctx
    }

    /// Finish a build, dropping its scoped cache.
    pub fn end_build(&self, ctx: &BuildContext) {
        self.cache.end_build(ctx);
        tracing::debug!(target: "engine", "Build {} finished", ctx.id());
    }

    /// Drop every cached artifact.
    pub fn flush(&self) {
        self.cache.flush();
    }

    /// Cache counters.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// A compile request for `path` in `mode` with the engine's compile options.
    pub fn request(&self, path: impl Into<PathBuf>, mode: OutputMode) -> Result<CompileRequest> {
        CompileRequest::new(path, mode, Arc::clone(&self.compile_options))
    }

    /// The compiled artifact for `request`, compiling at most once per cache lifetime.
    pub async fn compile(
        &self,
        ctx: &BuildContext,
        request: &CompileRequest,
    ) -> Result<Arc<CompiledArtifact>> {
        let key = request.cache_key();
        let invoker = self.invoker.clone();
        let store = self.meta_store.clone();
        let owned_request = request.clone();
        let store_key = key.clone();

        self.cache
            .get_or_compile(ctx, &key, move || async move {
                let invocation = invoker.invoke(&owned_request).await?;
                let meta = normalize(
                    invocation.output.meta,
                    &invocation.output.code,
                    invocation.virtual_files,
                );
                if let Some(store) = &store {
                    store.store(&store_key, owned_request.source_path(), &meta).await;
                }
                Ok::<_, EngineError>(Arc::new(CompiledArtifact::new(invocation.output.code, meta)))
            })
            .await
    }

    /// Metadata for `request`: cached artifact, then the meta store, then a compile.
    pub async fn meta_for(
        &self,
        ctx: &BuildContext,
        request: &CompileRequest,
    ) -> Result<Arc<CompileMeta>> {
        let key = request.cache_key();
        if let Some(artifact) = self.cache.peek_ready(ctx, &key) {
            return Ok(Arc::clone(&artifact.meta));
        }
        if let Some(store) = &self.meta_store {
            if let Some(meta) = store.load(&key, request.source_path()).await {
                return Ok(Arc::new(meta));
            }
        }
        Ok(Arc::clone(&self.compile(ctx, request).await?.meta))
    }

    /// Dependency nodes for `request`.
    ///
    /// # Errors
    ///
    /// Compile failures propagate unchanged; any unresolvable entry fails the whole
    /// request.
    pub async fn resolve(
        &self,
        ctx: &BuildContext,
        request: &CompileRequest,
    ) -> Result<Vec<DependencyNode>> {
        let source = request.source_path();
        let mode = request.output_mode();

        match mode {
            OutputMode::HydrateInit => expand_hydrate_init(
                source,
                &self.config.runtime_module,
                self.config.runtime_id.as_deref(),
            ),
            OutputMode::HydrateRegister => {
                let artifact = self.compile(ctx, request).await?;
                let mut nodes = self.resolver.resolve(&artifact.meta, source, mode)?;
                if !artifact.meta.empty_code {
                    nodes.push(companion_module(source, &artifact.code));
                }
                Ok(nodes)
            }
            _ => {
                let meta = self.meta_for(ctx, request).await?;
                self.resolver.resolve(&meta, source, mode)
            }
        }
    }

    /// Generated code for `request`.
    pub async fn read(&self, ctx: &BuildContext, request: &CompileRequest) -> Result<String> {
        if request.output_mode() == OutputMode::HydrateInit {
            return init_code(&self.config.runtime_module, self.config.runtime_id.as_deref()).map_err(
                |e| {
                    EngineError::resolution(
                        &self.config.runtime_module,
                        request.source_path(),
                        format!("cannot build init code: {e}"),
                    )
                },
            );
        }
        Ok(self.compile(ctx, request).await?.code.clone())
    }

    /// Freshness of the artifact for `request`.
    ///
    /// Outside development mode output is immutable. In development the watch set
    /// comes from the compile (forcing one if needed); any failure is
    /// [`Staleness::Unknown`].
    pub async fn compute_staleness(&self, ctx: &BuildContext, request: &CompileRequest) -> Staleness {
        if !self.dev_mode {
            return Staleness::Immutable;
        }

        // The init module changes exactly when the register compile does.
        let register;
        let request = if request.output_mode() == OutputMode::HydrateInit {
            match self.request(request.source_path(), OutputMode::HydrateRegister) {
                Ok(r) => {
                    register = r;
                    &register
                }
                Err(_) => return Staleness::Unknown,
            }
        } else {
            request
        };

        match self.compile(ctx, request).await {
            Ok(artifact) => {
                self.staleness
                    .evaluate(request.source_path(), artifact.meta.watch_files.as_deref())
                    .await
            }
            Err(e) => {
                tracing::warn!(
                    target: "staleness",
                    "Compile failed while checking {}: {}",
                    request.source_path().display(),
                    e
                );
                Staleness::Unknown
            }
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("type_name", &self.config.type_name)
            .field("dev_mode", &self.dev_mode)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}
