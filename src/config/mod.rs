//! Engine configuration.
//!
//! Configuration is read from `tmplgraph.toml` in the working directory, from the
//! file named by `TMPLGRAPH_CONFIG_PATH`, or from the path given with `--config`.
//! A missing file yields the defaults.
//!
//! ```toml
//! type_name = "tmpl"
//! cache_policy = "shared"          # or "scoped"; defaults by environment
//! runtime_id = "rt1"
//! runtime_module = "@tmpl/runtime/components"
//! template_extensions = ["tmpl"]
//! meta_cache_dir = ".tmplgraph/meta"
//! source_maps = false
//! write_version_comment = false
//!
//! [compiler]
//! command = ["tmplc", "--json"]
//! timeout_secs = 30
//!
//! [compile_options]
//! preserve_whitespace = true
//! ```
//!
//! # Environment
//!
//! `TMPLGRAPH_ENV` selects the build environment when `dev_mode` is not set
//! explicitly. Unset, empty or `development` means development mode.

use crate::cache::CachePolicy;
use crate::compiler::CompileOptions;
use crate::constants::{
    CONFIG_FILE_NAME, CONFIG_PATH_ENV_VAR, DEFAULT_RUNTIME_MODULE, DEFAULT_TYPE_NAME, ENV_VAR,
};
use crate::core::EngineError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// How the external compiler executable is run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Program followed by its fixed arguments
    pub command: Vec<String>,
    /// Kill the compiler after this many seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base dependency type name registered with the host
    pub type_name: String,
    /// Development mode; taken from `TMPLGRAPH_ENV` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_mode: Option<bool>,
    /// Cache lifetime; scoped in development and shared otherwise when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_policy: Option<CachePolicy>,
    /// Runtime id passed to the compiler and the hydration initializer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime_id: Option<String>,
    /// Module exposing the component runtime initializer
    pub runtime_module: String,
    /// Extensions (and dependency types) treated as templates
    pub template_extensions: Vec<String>,
    /// Directory for persisted compile metadata outside development mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta_cache_dir: Option<PathBuf>,
    /// Ask the compiler for source maps
    pub source_maps: bool,
    /// Ask the compiler to prepend a version comment
    pub write_version_comment: bool,
    /// External compiler executable
    pub compiler: CompilerConfig,
    /// Opaque options forwarded to the compiler
    pub compile_options: serde_json::Map<String, serde_json::Value>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            type_name: DEFAULT_TYPE_NAME.to_string(),
            dev_mode: None,
            cache_policy: None,
            runtime_id: None,
            runtime_module: DEFAULT_RUNTIME_MODULE.to_string(),
            template_extensions: vec![DEFAULT_TYPE_NAME.to_string()],
            meta_cache_dir: None,
            source_maps: false,
            write_version_comment: false,
            compiler: CompilerConfig::default(),
            compile_options: serde_json::Map::new(),
        }
    }
}

/// Whether a `TMPLGRAPH_ENV` value means development mode.
pub fn is_dev_environment(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(v) => v.is_empty() || v == "development",
    }
}

/// Development mode as selected by `TMPLGRAPH_ENV`.
pub fn dev_mode_from_env() -> bool {
    is_dev_environment(std::env::var(ENV_VAR).ok().as_deref())
}

impl EngineConfig {
    /// Load from `TMPLGRAPH_CONFIG_PATH` or `tmplgraph.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load() -> Result<Self> {
        Self::load_with_optional(None).await
    }

    /// Load from `path` when given, otherwise from the default location.
    ///
    /// A missing file yields the default configuration.
    pub async fn load_with_optional(path: Option<PathBuf>) -> Result<Self> {
        let path = path.unwrap_or_else(Self::default_path);
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!(target: "engine", "No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid TOML, or does not
    /// match the configuration schema.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| EngineError::io("reading config", path, e))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// The config path from the environment, or `tmplgraph.toml`.
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Effective development mode.
    pub fn is_dev(&self) -> bool {
        self.dev_mode.unwrap_or_else(dev_mode_from_env)
    }

    /// Effective cache policy.
    pub fn effective_cache_policy(&self) -> CachePolicy {
        self.cache_policy.unwrap_or(if self.is_dev() {
            CachePolicy::Scoped
        } else {
            CachePolicy::Shared
        })
    }

    /// Compile options forwarded with every request.
    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            runtime_id: self.runtime_id.clone(),
            source_maps: self.source_maps,
            write_version_comment: self.write_version_comment,
            extra: self.compile_options.clone(),
        }
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> crate::core::Result<()> {
        if self.type_name.trim().is_empty() {
            return Err(EngineError::config("type_name must not be empty"));
        }
        if self.runtime_module.trim().is_empty() {
            return Err(EngineError::config("runtime_module must not be empty"));
        }
        if let Some(ext) = self.template_extensions.iter().find(|e| e.trim_start_matches('.').is_empty())
        {
            return Err(EngineError::config(format!("invalid template extension '{ext}'")));
        }
        Ok(())
    }
}
