//! anchor-cpp MCP server - C++ code intelligence for AI agents.
//!
//! Runs a JSON-RPC 2.0 server over STDIO that exposes the symbol index and
//! call graph through the Model Context Protocol (MCP).
//!
//! Usage:
//!   anchor-cpp-mcp [project_root]
//!
//! If no project root is given, uses the current working directory.
//! Clients pick up source edits by calling the `refresh_project` tool.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, warn};

use anchor_cpp::{mcp, ProjectAnalyzer};

fn main() -> Result<()> {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let project_root = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    info!(root = %project_root.display(), "anchor-cpp MCP server starting");

    let analyzer = ProjectAnalyzer::open(&project_root)
        .with_context(|| format!("cannot open project {}", project_root.display()))?;

    // An empty or unparseable project still gets a server; queries answer not_found
    // until a refresh succeeds.
    match analyzer.index() {
        Ok(snapshot) => info!(
            files = snapshot.stats.files_parsed,
            symbols = snapshot.stats.symbols,
            duration_ms = snapshot.stats.duration_ms,
            "initial index ready"
        ),
        Err(e) => warn!(error = %e, "initial index failed"),
    }

    info!("MCP server ready, waiting for JSON-RPC requests on stdin");
    mcp::server::run(&analyzer);
    Ok(())
}
