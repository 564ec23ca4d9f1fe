//! Drives an external compiler executable.
//!
//! The executable is invoked once per compile as
//!
//! ```text
//! <command> [args...] --output <html|dom|hydrate> --mode <output-mode> <source-path>
//! ```
//!
//! with the request's [`CompileOptions`](super::CompileOptions) written to stdin as
//! JSON. It must print a single JSON document to stdout:
//!
//! ```json
//! {
//!   "code": "...",
//!   "meta": { "watchFiles": [], "deps": [] },
//!   "virtualDependencies": [{ "from": "/abs/t.tmpl", "virtualPath": "./t.tmpl.css", "code": "..." }]
//! }
//! ```
//!
//! A non-zero exit status is a compile failure carrying the process's stderr.

use super::{CompileRequest, RawCompileOutput, TemplateCompiler, VirtualDependency, VirtualFileSink};
use crate::config::CompilerConfig;
use crate::core::{BoxError, EngineError, Result};
use crate::meta::RawMeta;
use futures::future::BoxFuture;
use serde::Deserialize;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Failures specific to running the compiler executable.
#[derive(Debug, Error)]
pub enum CommandCompilerError {
    /// The process could not be started or its pipes failed.
    #[error("failed to run compiler {program}: {source}")]
    Spawn {
        /// Program path
        program: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The process exited unsuccessfully.
    #[error("compiler exited with {status}: {stderr}")]
    Failed {
        /// Exit status as displayed by the OS
        status: String,
        /// Captured stderr, trimmed
        stderr: String,
    },

    /// The process did not finish in time and was killed.
    #[error("compiler timed out after {}s", .0.as_secs_f64())]
    TimedOut(Duration),

    /// Stdout was not the expected JSON document.
    #[error("compiler produced invalid output: {0}")]
    InvalidOutput(#[source] serde_json::Error),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandOutput {
    code: String,
    #[serde(default)]
    meta: RawMeta,
    #[serde(default)]
    virtual_dependencies: Vec<ReportedVirtualDependency>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportedVirtualDependency {
    from: PathBuf,
    virtual_path: String,
    code: String,
}

/// A [`TemplateCompiler`] backed by an external executable.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandCompiler {
    /// Build from configuration, resolving the program on `PATH`.
    pub fn from_config(config: &CompilerConfig) -> Result<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| EngineError::config("compiler.command must name an executable"))?;

        let program = which::which(program).map_err(|e| {
            EngineError::config(format!("compiler executable '{program}' not found: {e}"))
        })?;

        Ok(Self {
            program,
            args: args.to_vec(),
            timeout: config.timeout_secs.map(Duration::from_secs),
        })
    }

    /// Build from an already-resolved program.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: None,
        }
    }

    /// Kill the compiler if it runs longer than `duration`.
    pub const fn with_timeout(mut self, duration: Option<Duration>) -> Self {
        self.timeout = duration;
        self
    }

    async fn run(
        &self,
        request: &CompileRequest,
        sink: VirtualFileSink,
    ) -> std::result::Result<RawCompileOutput, CommandCompilerError> {
        let spawn_error = |source| CommandCompilerError::Spawn {
            program: self.program.clone(),
            source,
        };

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--output")
            .arg(request.output_mode().compiler_output())
            .arg("--mode")
            .arg(request.output_mode().as_str())
            .arg(request.source_path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!(
            target: "compiler",
            "Running {} for {}",
            self.program.display(),
            request.source_path().display()
        );

        let options =
            serde_json::to_vec(request.options()).map_err(CommandCompilerError::InvalidOutput)?;
        let mut child = cmd.spawn().map_err(spawn_error)?;
        let stdin = child.stdin.take();

        // Feed stdin while draining stdout/stderr so neither side blocks the other.
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(&options).await {
                // The compiler may exit without reading its options.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
            // Dropping stdin closes the pipe so the compiler sees EOF.
        };
        let run = async {
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            let output = output.map_err(spawn_error)?;
            // The exit status and stdout decide the outcome.
            if let Err(e) = fed {
                tracing::debug!(target: "compiler", "Writing compiler options failed: {}", e);
            }
            Ok::<_, CommandCompilerError>(output)
        };

        let output = match self.timeout {
            Some(duration) => timeout(duration, run)
                .await
                .map_err(|_| CommandCompilerError::TimedOut(duration))??,
            None => run.await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::debug!(target: "compiler", "Compiler stderr: {}", stderr);
            return Err(CommandCompilerError::Failed {
                status: output.status.to_string(),
                stderr,
            });
        }

        let parsed: CommandOutput =
            serde_json::from_slice(&output.stdout).map_err(CommandCompilerError::InvalidOutput)?;

        for reported in parsed.virtual_dependencies {
            sink.resolve_virtual_dependency(
                &reported.from,
                VirtualDependency {
                    virtual_path: reported.virtual_path,
                    code: reported.code,
                },
            );
        }

        Ok(RawCompileOutput {
            code: parsed.code,
            meta: parsed.meta,
        })
    }
}

impl TemplateCompiler for CommandCompiler {
    fn compile<'a>(
        &'a self,
        request: &'a CompileRequest,
        sink: VirtualFileSink,
    ) -> BoxFuture<'a, std::result::Result<RawCompileOutput, BoxError>> {
        Box::pin(async move { self.run(request, sink).await.map_err(|e| Box::new(e) as BoxError) })
    }
}
