//! CLI for anchor-cpp.
//!
//! Commands:
//! - Index: index [--force], stats
//! - Search: classes, functions, symbols, file
//! - Classes: class, hierarchy, derived
//! - Calls: signature, callers, callees, path
//!
//! Every command runs an incremental pass first (cheap when the cache is
//! warm), then prints one JSON document.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

use crate::analyzer::ProjectAnalyzer;
use crate::error::{AnchorError, Result};
use crate::graph::types::SymbolKind;
use crate::query::{self, SearchOptions};

#[derive(Debug, Parser)]
#[command(name = "anchor-cpp")]
#[command(about = "Incremental C++ symbol index and call graph", long_about = None)]
pub struct Cli {
    /// Project root directory (default: current directory)
    #[arg(short, long, default_value = ".", global = true)]
    pub root: PathBuf,

    /// Match name patterns case-sensitively
    #[arg(long, global = true)]
    pub case_sensitive: bool,

    /// Include symbols from dependency directories
    #[arg(long, global = true)]
    pub with_dependencies: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    // ─── Index ──────────────────────────────────────────────────────
    /// Index the project and print statistics
    Index {
        /// Drop the cache and parse every file again
        #[arg(long)]
        force: bool,
    },

    /// Show index statistics and diagnostics
    Stats,

    // ─── Search ─────────────────────────────────────────────────────
    /// Search classes and structs by name pattern
    Classes { pattern: String },

    /// Search functions and methods by name pattern
    Functions {
        pattern: String,

        /// Only methods of this class
        #[arg(short, long)]
        class: Option<String>,
    },

    /// Search all symbols by name pattern
    Symbols {
        pattern: String,

        /// Symbol kinds to include (class, struct, function, method, field, enum, namespace)
        #[arg(short, long, value_delimiter = ',')]
        kind: Vec<String>,
    },

    /// List the symbols declared in a file
    File {
        path: String,

        /// Only names matching this pattern
        #[arg(short, long)]
        pattern: Option<String>,
    },

    // ─── Classes ────────────────────────────────────────────────────
    /// Show a class with its bases and members
    Class { name: String },

    /// Show the ancestors of a class
    Hierarchy { name: String },

    /// Show the subclasses of a class
    Derived { name: String },

    // ─── Calls ──────────────────────────────────────────────────────
    /// Show every overload of a function
    Signature {
        name: String,

        #[arg(short, long)]
        class: Option<String>,
    },

    /// Show who calls a function
    Callers {
        name: String,

        #[arg(short, long)]
        class: Option<String>,
    },

    /// Show what a function calls
    Callees {
        name: String,

        #[arg(short, long)]
        class: Option<String>,
    },

    /// Shortest call chain between two functions
    Path {
        from: String,
        to: String,

        /// Maximum number of calls (default from config)
        #[arg(short = 'd', long)]
        max_depth: Option<usize>,
    },
}

/// Result of one CLI command.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Output {
    Stats(query::StatsResponse),
    Search(query::SearchResponse),
    File(query::FileSymbolsResponse),
    Class(query::ClassInfoResponse),
    Hierarchy(query::HierarchyResponse),
    Derived(query::DerivedResponse),
    Signature(query::SignatureResponse),
    Calls(query::CallResponse),
    Path(query::CallPathResponse),
}

/// Run `command` against the project at `cli.root`.
pub fn execute(cli: &Cli) -> Result<Output> {
    let analyzer = ProjectAnalyzer::open(&cli.root)?;
    debug!(root = %analyzer.root().display(), command = ?cli.command, "running command");

    let snapshot = match cli.command {
        Commands::Index { force: true } => analyzer.force_reindex()?,
        _ => analyzer.index()?,
    };

    let options = SearchOptions {
        case_sensitive: cli.case_sensitive || analyzer.config().case_sensitive_search,
        project_only: !cli.with_dependencies,
        class_name: None,
    };

    let output = match &cli.command {
        Commands::Index { .. } | Commands::Stats => Output::Stats(query::get_stats(&snapshot)),

        Commands::Classes { pattern } => {
            Output::Search(query::search_classes(&snapshot, pattern, &options)?)
        }
        Commands::Functions { pattern, class } => {
            let options = SearchOptions {
                class_name: class.clone(),
                ..options
            };
            Output::Search(query::search_functions(&snapshot, pattern, &options)?)
        }
        Commands::Symbols { pattern, kind } => {
            let kinds = parse_kinds(kind)?;
            let kinds = (!kinds.is_empty()).then_some(kinds.as_slice());
            Output::Search(query::search_symbols(&snapshot, pattern, kinds, &options)?)
        }
        Commands::File { path, pattern } => Output::File(query::find_in_file(
            &snapshot,
            path,
            pattern.as_deref(),
            options.case_sensitive,
        )?),

        Commands::Class { name } => Output::Class(query::get_class_info(&snapshot, name)),
        Commands::Hierarchy { name } => {
            Output::Hierarchy(query::get_class_hierarchy(&snapshot, name))
        }
        Commands::Derived { name } => Output::Derived(query::get_derived_classes(
            &snapshot,
            name,
            options.project_only,
        )),

        Commands::Signature { name, class } => Output::Signature(query::get_function_signature(
            &snapshot,
            name,
            class.as_deref(),
        )),
        Commands::Callers { name, class } => {
            Output::Calls(query::find_callers(&snapshot, name, class.as_deref()))
        }
        Commands::Callees { name, class } => {
            Output::Calls(query::find_callees(&snapshot, name, class.as_deref()))
        }
        Commands::Path {
            from,
            to,
            max_depth,
        } => {
            let depth = max_depth.unwrap_or(analyzer.config().max_call_path_depth);
            Output::Path(query::get_call_path(&snapshot, from, to, depth))
        }
    };
    Ok(output)
}

fn parse_kinds(kinds: &[String]) -> Result<Vec<SymbolKind>> {
    kinds
        .iter()
        .map(|k| {
            SymbolKind::parse(k).ok_or_else(|| AnchorError::Config {
                path: PathBuf::from("--kind"),
                reason: format!("unknown symbol kind '{}'", k),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("main.cpp"),
            "class Engine { public: void start(); };\nvoid Engine::start() {}\nint main() { Engine e; e.start(); return 0; }\n",
        )
        .unwrap();
        dir
    }

    fn run(dir: &TempDir, args: &[&str]) -> serde_json::Value {
        let root = dir.path().to_string_lossy().to_string();
        let mut argv = vec!["anchor-cpp", "--root", root.as_str()];
        argv.extend_from_slice(args);
        let cli = Cli::parse_from(argv);
        serde_json::to_value(execute(&cli).unwrap()).unwrap()
    }

    #[test]
    fn test_index_then_stats() {
        let dir = project();
        let first = run(&dir, &["index"]);
        assert_eq!(first["stats"]["files_parsed"], 1);
        assert_eq!(first["stats"]["classes"], 1);

        let forced = run(&dir, &["index", "--force"]);
        assert_eq!(forced["stats"]["files_extracted"], 1);
    }

    #[test]
    fn test_query_commands() {
        let dir = project();
        let classes = run(&dir, &["classes", "eng"]);
        assert_eq!(classes["results"][0]["name"], "Engine");

        let callers = run(&dir, &["callers", "start", "--class", "Engine"]);
        assert_eq!(callers["functions"][0]["calls"][0]["symbol"]["name"], "main");

        let path = run(&dir, &["path", "main", "Engine::start"]);
        assert_eq!(path["status"], "found");
        assert_eq!(path["path"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_dependencies_need_opt_in() {
        let dir = project();
        let vendored = dir.path().join("third_party");
        fs::create_dir_all(&vendored).unwrap();
        fs::write(vendored.join("turbo.h"), "class Turbo : public Engine {};\n").unwrap();

        let derived = run(&dir, &["derived", "Engine"]);
        assert!(derived["classes"][0]["derived"].as_array().unwrap().is_empty());

        let all = run(&dir, &["--with-dependencies", "derived", "Engine"]);
        assert_eq!(all["classes"][0]["derived"][0]["name"], "Turbo");

        let classes = run(&dir, &["classes", "."]);
        assert_eq!(classes["count"], 1);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let dir = project();
        let root = dir.path().to_string_lossy().to_string();
        let cli = Cli::parse_from(["anchor-cpp", "--root", root.as_str(), "symbols", ".", "--kind", "lambda"]);
        assert!(execute(&cli).is_err());
    }
}
