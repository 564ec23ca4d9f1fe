//! Compile Invoker: one async contract over every external compiler shape.
//!
//! The engine never generates code itself. It hands a [`CompileRequest`] to an
//! implementation of [`TemplateCompiler`] and gets back the generated code plus the
//! compiler's raw metadata. Compilers that are blocking or callback-based are adapted
//! through [`adapters`]; an external executable is driven by [`command`].
//!
//! During a compile the compiler may report generated in-memory files through the
//! [`VirtualFileSink`] it receives. The sink never asks the compiler to write those
//! files to disk.
//!
//! No caching happens here. See [`crate::cache`] for that.

pub mod adapters;
pub mod command;

use crate::core::{BoxError, EngineError, Result};
use crate::meta::{RawMeta, VirtualFile};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

pub use adapters::{Blocking, Callback, CallbackCompiler, CompileCallback, SyncCompiler};
pub use command::CommandCompiler;

/// The five output modes a template can be compiled in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// Server-rendered markup
    Markup,
    /// Server-rendered markup with hydration hooks
    InteractiveMarkup,
    /// Browser module rendering the template
    BrowserModule,
    /// Browser module registering hydratable components
    HydrateRegister,
    /// Synthetic entry point initializing hydration; never compiled directly
    HydrateInit,
}

impl OutputMode {
    /// Stable name used in cache keys and on the command line.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Markup => "markup",
            Self::InteractiveMarkup => "interactive-markup",
            Self::BrowserModule => "browser-module",
            Self::HydrateRegister => "hydrate-register",
            Self::HydrateInit => "hydrate-init",
        }
    }

    /// The output name passed to the compiler itself.
    pub const fn compiler_output(&self) -> &'static str {
        match self {
            Self::Markup | Self::InteractiveMarkup => "html",
            Self::BrowserModule => "dom",
            Self::HydrateRegister | Self::HydrateInit => "hydrate",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine-level options forwarded to the compiler with every request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    /// Runtime id for multi-runtime pages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_id: Option<String>,
    /// Whether the compiler should emit source maps
    #[serde(default)]
    pub source_maps: bool,
    /// Whether the compiler should prepend a version comment
    #[serde(default)]
    pub write_version_comment: bool,
    /// Opaque options passed through untouched
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One compile: a source template, an output mode and the options to use.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    source_path: PathBuf,
    output_mode: OutputMode,
    options: Arc<CompileOptions>,
}

impl CompileRequest {
    /// Create a request. The source path must be non-empty and absolute.
    pub fn new(
        source_path: impl Into<PathBuf>,
        output_mode: OutputMode,
        options: Arc<CompileOptions>,
    ) -> Result<Self> {
        let source_path = source_path.into();
        if source_path.as_os_str().is_empty() {
            return Err(EngineError::config("compile request requires a source path"));
        }
        if !source_path.is_absolute() {
            return Err(EngineError::config(format!(
                "compile request source path must be absolute: {}",
                source_path.display()
            )));
        }
        Ok(Self {
            source_path,
            output_mode,
            options,
        })
    }

    /// The template being compiled.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// The requested output mode.
    pub const fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    /// Options forwarded to the compiler.
    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Cache identity: `"{mode}:{path}"`.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.output_mode, self.source_path.display())
    }
}

/// A virtual dependency as reported by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualDependency {
    /// Path relative to the reporting file's directory
    pub virtual_path: String,
    /// Generated source
    pub code: String,
}

/// Collects virtual files reported by a compiler during one compile.
///
/// Cloning shares the underlying buffer, so a clone can be moved into a blocking
/// task or a callback while the invoker keeps the original.
#[derive(Debug, Clone, Default)]
pub struct VirtualFileSink {
    files: Arc<Mutex<Vec<VirtualFile>>>,
}

impl VirtualFileSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The compiler's virtual-dependency callback.
    ///
    /// Records the file and always answers `false`: the compiler must not write it
    /// to disk.
    pub fn resolve_virtual_dependency(&self, from: &Path, dependency: VirtualDependency) -> bool {
        tracing::trace!(
            target: "compiler",
            "Virtual dependency {} reported by {}",
            dependency.virtual_path,
            from.display()
        );
        self.files.lock().unwrap_or_else(PoisonError::into_inner).push(VirtualFile {
            origin: from.to_path_buf(),
            virtual_path: dependency.virtual_path,
            code: dependency.code,
        });
        false
    }

    /// Drain everything collected so far, in call order.
    pub fn take_files(&self) -> Vec<VirtualFile> {
        std::mem::take(&mut *self.files.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

/// What a compiler hands back: generated code and raw metadata.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCompileOutput {
    /// Generated code
    pub code: String,
    /// Metadata in whatever shape the compiler uses
    #[serde(default)]
    pub meta: RawMeta,
}

/// An asynchronous template compiler.
///
/// Errors are returned as-is; the invoker wraps them in
/// [`EngineError::CompileError`] without rewording.
pub trait TemplateCompiler: Send + Sync {
    /// Compile one template.
    fn compile<'a>(
        &'a self,
        request: &'a CompileRequest,
        sink: VirtualFileSink,
    ) -> BoxFuture<'a, std::result::Result<RawCompileOutput, BoxError>>;
}

/// Result of one invocation: the compiler output plus collected virtual files.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Code and raw metadata
    pub output: RawCompileOutput,
    /// Virtual files reported during the compile
    pub virtual_files: Vec<VirtualFile>,
}

/// Calls the configured compiler and maps its failures to [`EngineError`].
#[derive(Clone)]
pub struct CompileInvoker {
    compiler: Arc<dyn TemplateCompiler>,
}

impl CompileInvoker {
    /// Wrap a compiler.
    pub fn new(compiler: Arc<dyn TemplateCompiler>) -> Self {
        Self {
            compiler,
        }
    }

    /// Compile `request` once.
    pub async fn invoke(&self, request: &CompileRequest) -> Result<Invocation> {
        tracing::debug!(
            target: "compiler",
            "Compiling {} as {}",
            request.source_path().display(),
            request.output_mode()
        );

        let sink = VirtualFileSink::new();
        let start = std::time::Instant::now();
        let output = self
            .compiler
            .compile(request, sink.clone())
            .await
            .map_err(|cause| EngineError::compile(request.source_path(), cause))?;

        let virtual_files = sink.take_files();
        tracing::debug!(
            target: "compiler",
            "Compiled {} as {} in {}ms ({} virtual files)",
            request.source_path().display(),
            request.output_mode(),
            start.elapsed().as_millis(),
            virtual_files.len()
        );

        Ok(Invocation {
            output,
            virtual_files,
        })
    }
}

impl fmt::Debug for CompileInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileInvoker").finish_non_exhaustive()
    }
}
