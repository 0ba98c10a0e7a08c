//! anchor-cpp CLI - query a C++ project's symbol index from the shell.
//!
//! Usage:
//!   anchor-cpp index [--force]        # Index (or re-index) the project
//!   anchor-cpp classes <pattern>      # Search classes
//!   anchor-cpp callers <function>     # Who calls a function
//!   anchor-cpp path <from> <to>       # Shortest call chain
//!   anchor-cpp stats                  # Index statistics
//!
//! Output is JSON on stdout; logs go to stderr (RUST_LOG controls the level).

use anchor_cpp::cli::{execute, Cli};
use anyhow::{Context, Result};
use clap::Parser;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let output = execute(&cli)
        .with_context(|| format!("anchor-cpp failed for {}", cli.root.display()))?;
    let json = serde_json::to_string_pretty(&output).context("failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
