//! Host dependency-type protocol.
//!
//! A host bundler registers three dependency types per engine:
//!
//! | Type                   | Output mode        |
//! |------------------------|--------------------|
//! | `<name>`               | browser-module     |
//! | `<name>-hydrate`       | hydrate-init       |
//! | `<name>-dependencies`  | hydrate-register   |
//!
//! For each dependency of those types the host calls `init` once, then
//! [`TemplateDependencyType::resolve_node`], [`TemplateDependencyType::read_artifact`]
//! and [`TemplateDependencyType::get_staleness`] as it needs.

use super::Engine;
use crate::cache::BuildContext;
use crate::compiler::{CompileRequest, OutputMode};
use crate::core::{EngineError, Result};
use crate::resolver::DependencyNode;
use crate::utils::fs::resolve_relative;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One dependency instance as declared to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDependency {
    path: PathBuf,
}

impl TemplateDependency {
    /// Validate and resolve the declared `path` against `from_dir`.
    ///
    /// # Errors
    ///
    /// A missing or empty path is a [`EngineError::ConfigError`], raised before any
    /// asynchronous work.
    pub fn init(path: Option<&str>, from_dir: &Path) -> Result<Self> {
        let path = path
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| EngineError::config("\"path\" is required for a template dependency"))?;
        Ok(Self {
            path: resolve_relative(from_dir, path),
        })
    }

    /// Absolute template path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A dependency type registered with the host, bound to one output mode.
#[derive(Debug, Clone)]
pub struct TemplateDependencyType {
    name: String,
    mode: OutputMode,
    engine: Arc<Engine>,
}

impl TemplateDependencyType {
    /// Registered type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Output mode this type compiles with.
    pub const fn mode(&self) -> OutputMode {
        self.mode
    }

    fn request(&self, dependency: &TemplateDependency) -> Result<CompileRequest> {
        self.engine.request(dependency.path(), self.mode)
    }

    /// Graph nodes contributed by `dependency`.
    pub async fn resolve_node(
        &self,
        ctx: &BuildContext,
        dependency: &TemplateDependency,
    ) -> Result<Vec<DependencyNode>> {
        let request = self.request(dependency)?;
        self.engine.resolve(ctx, &request).await
    }

    /// Generated code for `dependency`.
    pub async fn read_artifact(
        &self,
        ctx: &BuildContext,
        dependency: &TemplateDependency,
    ) -> Result<String> {
        let request = self.request(dependency)?;
        self.engine.read(ctx, &request).await
    }

    /// Host timestamp: `1` immutable, `-1` unknown, otherwise milliseconds.
    pub async fn get_staleness(&self, ctx: &BuildContext, dependency: &TemplateDependency) -> i64 {
        match self.request(dependency) {
            Ok(request) => self.engine.compute_staleness(ctx, &request).await.as_host_timestamp(),
            Err(e) => {
                tracing::warn!(target: "engine", "Cannot check staleness: {}", e);
                crate::constants::UNKNOWN_TIMESTAMP
            }
        }
    }

    /// Host cache key: `"{typeName}:{path}"`.
    pub fn calculate_key(&self, dependency: &TemplateDependency) -> String {
        format!("{}:{}", self.name, dependency.path().display())
    }
}

/// Registered type names and their output modes for base name `base`.
pub fn dependency_type_names(base: &str) -> [(String, OutputMode); 3] {
    [
        (base.to_string(), OutputMode::BrowserModule),
        (format!("{base}-hydrate"), OutputMode::HydrateInit),
        (format!("{base}-dependencies"), OutputMode::HydrateRegister),
    ]
}

impl Engine {
    /// The three dependency types this engine serves.
    pub fn dependency_types(self: &Arc<Self>) -> Vec<TemplateDependencyType> {
        dependency_type_names(&self.config().type_name)
            .into_iter()
            .map(|(name, mode)| TemplateDependencyType {
                name,
                mode,
                engine: Arc::clone(self),
            })
            .collect()
    }
}
