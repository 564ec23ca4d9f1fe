//! tmplgraph - incremental template compilation for bundlers
//!
//! A dependency-resolution and caching engine that sits between a host bundler
//! and an external template compiler. For every template the host asks about,
//! tmplgraph compiles it (at most once per cache lifetime), turns the compiler's
//! metadata into typed dependency nodes the host can walk, and reports whether the
//! output is still fresh.
//!
//! # Architecture Overview
//!
//! ```text
//!   host bundler
//!        │  init / resolve_node / read_artifact / get_staleness
//!        ▼
//!   engine::host ──► Engine ──► cache (single-flight per key) ──► compiler
//!                      │                                           │
//!                      ├──► resolver (meta → DependencyNode)       │
//!                      ├──► staleness (watch-file mtimes)          │
//!                      └──► cache::MetaStore (production only) ◄───┘ meta
//! ```
//!
//! # Core Modules
//!
//! ## Engine
//! - [`engine`] - The engine object and the host dependency-type protocol
//! - [`config`] - `tmplgraph.toml` loading and environment detection
//!
//! ## Compilation
//! - [`compiler`] - The compiler contract, adapters and the command-line compiler
//! - [`meta`] - Normalized compile metadata and the dependency-entry grammar
//! - [`cache`] - Single-flight compilation cache and the persistent meta store
//!
//! ## Graph
//! - [`resolver`] - Dependency node resolution and hydration entry expansion
//! - [`staleness`] - Freshness of compiled output
//!
//! ## Supporting Modules
//! - [`core`] - Error types and user-facing error rendering
//! - [`utils`] - Path and file helpers
//! - [`constants`] - Names and sentinel values shared across modules
//! - [`cli`] - The `tmplgraph` command
//!
//! # Output Modes
//!
//! | Mode                 | Compiler output | Purpose                                  |
//! |----------------------|-----------------|------------------------------------------|
//! | `markup`             | `html`          | Server-rendered markup                   |
//! | `interactive-markup` | `html`          | Markup with hydration hooks              |
//! | `browser-module`     | `dom`           | Client-side rendering module             |
//! | `hydrate-register`   | `hydrate`       | Registers hydratable components          |
//! | `hydrate-init`       | (none)          | Synthetic entry that starts hydration    |
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tmplgraph::compiler::CommandCompiler;
//! use tmplgraph::config::EngineConfig;
//! use tmplgraph::engine::{Engine, TemplateDependency};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = EngineConfig::load().await?;
//! let compiler = Arc::new(CommandCompiler::from_config(&config.compiler)?);
//! let engine = Arc::new(Engine::new(compiler, config)?);
//!
//! let types = engine.dependency_types();
//! let dependency = TemplateDependency::init(Some("./page.tmpl"), std::path::Path::new("/app/views"))?;
//!
//! let build = engine.begin_build();
//! let nodes = types[0].resolve_node(&build, &dependency).await?;
//! let code = types[0].read_artifact(&build, &dependency).await?;
//! engine.end_build(&build);
//! # let _ = (nodes, code);
//! # Ok(())
//! # }
//! ```

// Engine
pub mod config;
pub mod engine;

// Compilation
pub mod cache;
pub mod compiler;
pub mod meta;

// Graph
pub mod resolver;
pub mod staleness;

// Supporting modules
pub mod cli;
pub mod constants;
pub mod core;
pub mod utils;

// Test utilities (available in tests and with the test-utils feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
