//! tmplgraph CLI entry point
//!
//! Parses arguments, runs the command and renders failures with suggestions.
//!
//! - `resolve` - Print the dependency nodes of a template
//! - `read` - Print the generated code of a template
//! - `staleness` - Print the staleness timestamp of a template
//! - `types` - List the registered dependency types

use anyhow::Result;
use clap::Parser;
use tmplgraph::cli;
use tmplgraph::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
