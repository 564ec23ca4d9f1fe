//! Error handling for tmplgraph
//!
//! The engine reports failures through a single strongly-typed enum, [`EngineError`],
//! and the command-line front end renders them through [`ErrorContext`], which adds
//! optional details and an actionable suggestion.
//!
//! # Error Categories
//!
//! - [`EngineError::ConfigError`] - required input missing or invalid; raised before any
//!   asynchronous work starts
//! - [`EngineError::CompileError`] - the external template compiler failed; the compiler's
//!   diagnostic is kept untouched as the error source
//! - [`EngineError::ResolutionError`] - a declared dependency could not be turned into a
//!   usable absolute path or typed graph node
//! - [`EngineError::Io`] - file system failures outside of staleness evaluation, such
//!   as an unreadable configuration file
//!
//! Staleness that cannot be determined is *not* an error: it is reported as
//! [`crate::staleness::Staleness::Unknown`].
//!
//! # Cloning
//!
//! Compile results are shared between every task waiting on the same cache key, so
//! the error type must be [`Clone`]. Foreign error sources are therefore stored behind
//! an [`Arc`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use tmplgraph::core::{EngineError, user_friendly_error};
//!
//! let error = EngineError::ConfigError {
//!     message: "\"path\" is required for a template dependency".to_string(),
//! };
//! let context = user_friendly_error(anyhow::Error::from(error));
//! context.display();
//! ```

use colored::Colorize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error as returned by compiler implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Reference-counted error source that can be handed to every cache waiter.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the engine.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// The main error type for engine operations.
///
/// Every variant carries the path or entry that triggered it so the host build can
/// fail loudly with a message that points at the offending template.
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Required configuration or input is missing or invalid.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration problem
        message: String,
    },

    /// The external compiler reported a failure for a template.
    ///
    /// `cause` is the compiler's own error, propagated without rewording.
    #[error("Failed to compile template {}", path.display())]
    CompileError {
        /// Absolute path of the template being compiled
        path: PathBuf,
        /// The compiler's original diagnostic
        #[source]
        cause: SharedError,
    },

    /// A declared dependency or virtual path could not be resolved.
    #[error("Cannot resolve dependency '{entry}' declared in {}: {reason}", declaring.display())]
    ResolutionError {
        /// The dependency entry as declared
        entry: String,
        /// The file that declared it
        declaring: PathBuf,
        /// Why resolution failed
        reason: String,
    },

    /// A file system operation failed.
    #[error("I/O error while {operation} {}", path.display())]
    Io {
        /// What the engine was doing
        operation: String,
        /// The path involved
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: Arc<std::io::Error>,
    },
}

impl EngineError {
    /// Build a [`EngineError::ConfigError`] from any message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Wrap a compiler failure for `path`.
    pub fn compile(path: impl Into<PathBuf>, cause: BoxError) -> Self {
        Self::CompileError {
            path: path.into(),
            cause: Arc::from(cause),
        }
    }

    /// Build a [`EngineError::ResolutionError`].
    pub fn resolution(
        entry: impl Into<String>,
        declaring: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ResolutionError {
            entry: entry.into(),
            declaring: declaring.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an I/O failure.
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source: Arc::new(source),
        }
    }
}

/// Error context wrapper that provides user-friendly error information
///
/// `ErrorContext` wraps an [`EngineError`] and adds optional details and a
/// suggestion. This is how the `tmplgraph` binary presents errors.
///
/// When displayed:
/// 1. **Error**: the main message in red
/// 2. **Details**: additional context in yellow (optional)
/// 3. **Suggestion**: how to fix it in green (optional)
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying engine error, if the failure came from the engine
    pub error: Option<EngineError>,
    /// Fallback message for errors that did not originate in the engine
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from an [`EngineError`].
    #[must_use]
    pub fn new(error: EngineError) -> Self {
        Self {
            message: error.to_string(),
            error: Some(error),
            suggestion: None,
            details: None,
        }
    }

    /// Create a context for an error that has no engine variant.
    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            error: None,
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Display the error context to stderr with terminal colors
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error to a user-friendly [`ErrorContext`] with actionable suggestions
///
/// Engine errors get tailored suggestions. Everything else is rendered with its full
/// cause chain so compiler diagnostics are never hidden.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(engine_error) = error.downcast_ref::<EngineError>() {
        return create_error_context(engine_error.clone());
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
        match io_error.kind() {
            std::io::ErrorKind::PermissionDenied => {
                return ErrorContext::other(error_with_chain(&error))
                    .with_suggestion("Check file ownership and permissions of the template tree");
            }
            std::io::ErrorKind::NotFound => {
                return ErrorContext::other(error_with_chain(&error))
                    .with_suggestion("Check that the file or directory exists and the path is correct");
            }
            _ => {}
        }
    }

    if error.downcast_ref::<toml::de::Error>().is_some() {
        return ErrorContext::other(error_with_chain(&error))
            .with_suggestion("Check the TOML syntax in your tmplgraph.toml file")
            .with_details(
                "TOML parsing errors are usually caused by missing quotes or mismatched brackets",
            );
    }

    ErrorContext::other(error_with_chain(&error))
}

fn error_with_chain(error: &anyhow::Error) -> String {
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    message
}

fn create_error_context(error: EngineError) -> ErrorContext {
    match &error {
        EngineError::ConfigError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check tmplgraph.toml and the arguments passed on the command line"),

        EngineError::CompileError {
            cause,
            ..
        } => {
            let details = format!("Compiler diagnostic: {cause}");
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Fix the template error reported by the compiler and rebuild")
        }

        EngineError::ResolutionError {
            ..
        } => ErrorContext::new(error).with_suggestion(
            "Declared dependencies look like \"[type:] path\"; give a type prefix when the path has no file extension",
        ),

        EngineError::Io {
            source,
            ..
        } => {
            let details = source.to_string();
            ErrorContext::new(error)
                .with_details(details)
                .with_suggestion("Check that the path exists and is readable")
        }
    }
}
