//! Command-line interface for tmplgraph.
//!
//! The CLI drives one [`Engine`] for a single build, which makes it useful for
//! inspecting what a host bundler would see for a template:
//!
//! ```bash
//! tmplgraph resolve views/page.tmpl                     # dependency nodes as JSON
//! tmplgraph resolve views/page.tmpl --mode hydrate-register
//! tmplgraph read views/page.tmpl --mode markup          # generated code
//! tmplgraph staleness views/page.tmpl                   # host timestamp
//! tmplgraph types                                       # registered dependency types
//! ```
//!
//! # Global Options
//!
//! - `-v, --verbose`: debug logging on stderr
//! - `-q, --quiet`: no logging at all
//! - `-c, --config <PATH>`: configuration file instead of `tmplgraph.toml`
//!
//! Logging can be narrowed further with `RUST_LOG`, for example
//! `RUST_LOG=cache=debug,compiler=trace`.


use crate::compiler::{CommandCompiler, OutputMode};
use crate::config::EngineConfig;
use crate::engine::{Engine, TemplateDependency, dependency_type_names};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Settings derived from the global flags.
///
/// Kept separate from [`Cli`] so tests and embedders can run a command with an
/// explicit configuration.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Log filter, or `None` for no logging
    pub log_level: Option<String>,

    /// Configuration file given with `--config`
    pub config_path: Option<PathBuf>,
}

impl CliConfig {
    /// Defaults: no logging, default config location.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the stderr log subscriber. `RUST_LOG` wins over the flag-derived level.
    pub fn init_logging(&self) {
        let Some(level) = &self.log_level else {
            return;
        };

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
        // A subscriber may already be installed when running embedded.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(true)
            .try_init();
    }
}

/// Inspect template dependency graphs the way a bundler sees them.
#[derive(Parser)]
#[command(name = "tmplgraph", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all logging
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the dependency nodes of a template as JSON
    Resolve(TemplateArgs),

    /// Print the generated code of a template
    Read(TemplateArgs),

    /// Print the staleness timestamp of a template
    Staleness(TemplateArgs),

    /// List the dependency types registered with the host
    Types,
}

#[derive(Args, Debug, Clone)]
struct TemplateArgs {
    /// Template path, relative to `--from`
    path: String,

    /// Output mode to compile with
    #[arg(short, long, value_enum, default_value_t = OutputMode::BrowserModule)]
    mode: OutputMode,

    /// Directory relative paths resolve against (defaults to the working directory)
    #[arg(long)]
    from: Option<PathBuf>,
}

impl Cli {
    /// Run the parsed command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Translate global flags into a [`CliConfig`].
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("warn".to_string())
        };

        CliConfig {
            log_level,
            config_path: self.config.clone(),
        }
    }

    /// Run the parsed command with an explicit configuration.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();

        let engine_config = EngineConfig::load_with_optional(config.config_path.clone()).await?;

        match self.command {
            Commands::Types => {
                print_types(&engine_config);
                Ok(())
            }
            Commands::Resolve(args) => {
                let (engine, dependency) = prepare(engine_config, &args)?;
                let build = engine.begin_build();
                let request = engine.request(dependency.path(), args.mode)?;
                let nodes = engine.resolve(&build, &request).await;
                engine.end_build(&build);

                let json = serde_json::to_string_pretty(&nodes?)
                    .context("Failed to serialize dependency nodes")?;
                println!("{json}");
                Ok(())
            }
            Commands::Read(args) => {
                let (engine, dependency) = prepare(engine_config, &args)?;
                let build = engine.begin_build();
                let request = engine.request(dependency.path(), args.mode)?;
                let code = engine.read(&build, &request).await;
                engine.end_build(&build);

                print!("{}", code?);
                Ok(())
            }
            Commands::Staleness(args) => {
                let (engine, dependency) = prepare(engine_config, &args)?;
                let build = engine.begin_build();
                let request = engine.request(dependency.path(), args.mode)?;
                let staleness = engine.compute_staleness(&build, &request).await;
                engine.end_build(&build);

                println!("{}", staleness.as_host_timestamp());
                Ok(())
            }
        }
    }
}

fn prepare(config: EngineConfig, args: &TemplateArgs) -> Result<(Arc<Engine>, TemplateDependency)> {
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;
    // Joining an absolute `--from` replaces the working directory.
    let from = args.from.as_ref().map_or_else(|| cwd.clone(), |dir| cwd.join(dir));
    let dependency = TemplateDependency::init(Some(&args.path), &from)?;

    let compiler = Arc::new(CommandCompiler::from_config(&config.compiler)?);
    let engine = Arc::new(Engine::new(compiler, config)?);
    Ok((engine, dependency))
}

fn print_types(config: &EngineConfig) {
    let mode = if config.is_dev() {
        "development"
    } else {
        "production"
    };
    println!("{} ({})", "Dependency types".bold(), mode);
    for (name, output) in dependency_type_names(&config.type_name) {
        println!("  {:<28} {}", name.green(), output);
    }
}
