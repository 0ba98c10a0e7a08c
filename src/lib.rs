//! # anchor-cpp
//!
//! Incremental C++ symbol index and call graph for AI agents.
//!
//! A project directory is scanned, every C++ source is parsed with
//! tree-sitter, and the extracted symbols and call sites are merged into an
//! immutable [`ProjectSnapshot`]. Per-file results are cached on disk by
//! content hash, so re-indexing only parses files that changed.
//!
//! ## Key Features
//!
//! - **Incremental**: unchanged files are reused from the previous pass or the cache
//! - **Fault tolerant**: a file that fails to parse is recorded, never fatal
//! - **Queries**: classes, overloads, members, inheritance, callers, callees, call paths
//! - **MCP**: the same queries as JSON-RPC tools over stdio
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use anchor_cpp::{query, ProjectAnalyzer};
//! use std::path::Path;
//!
//! let analyzer = ProjectAnalyzer::open(Path::new(".")).unwrap();
//! let snapshot = analyzer.index().unwrap();
//!
//! let callers = query::find_callers(&snapshot, "Parser::parse", None);
//! println!("{}", serde_json::to_string_pretty(&callers).unwrap());
//! ```

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod mcp;
pub mod names;
pub mod parser;
pub mod query;

// Re-exports for convenience
pub use analyzer::{CancelHandle, ProjectAnalyzer};
pub use config::AnchorConfig;
pub use error::{AnchorError, QueryStatus, Result};
pub use graph::{
    CallEdge, CallGraph, Diagnostic, DiagnosticKind, FileRecord, FileStatus, ProjectSnapshot,
    Symbol, SymbolIndex, SymbolKind,
};
pub use parser::{CppFrontend, Frontend};
pub use query::SearchOptions;

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (path, source) in files {
            let full = dir.path().join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(full, source).unwrap();
        }
        dir
    }

    fn analyzer(dir: &Path) -> ProjectAnalyzer {
        let config = AnchorConfig {
            workers: Some(2),
            ..AnchorConfig::default()
        };
        ProjectAnalyzer::new(dir, config).unwrap()
    }

    fn qualified(path: &[query::SymbolView]) -> Vec<&str> {
        path.iter().map(|v| v.symbol.qualified_name.as_str()).collect()
    }

    #[test]
    fn test_hierarchy_closure() {
        let dir = project(&[
            ("a.h", "class A {};\n"),
            ("b.h", "#include \"a.h\"\nclass B : public A {};\n"),
            ("c.h", "#include \"b.h\"\nclass C : public B {};\n"),
        ]);
        let snap = analyzer(dir.path()).index().unwrap();

        let hierarchy = query::get_class_hierarchy(&snap, "C");
        assert_eq!(hierarchy.status, QueryStatus::Found);
        let ancestors: Vec<&str> = hierarchy.classes[0]
            .ancestors
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(ancestors, vec!["A", "B"]);

        let derived = query::get_derived_classes(&snap, "A", true);
        let mut subclasses: Vec<&str> = derived.classes[0]
            .derived
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        subclasses.sort();
        assert_eq!(subclasses, vec!["B", "C"]);
    }

    #[test]
    fn test_cyclic_bases_terminate() {
        let dir = project(&[(
            "cycle.h",
            "class X;\nclass Y : public X {};\nclass X : public Y {};\n",
        )]);
        let snap = analyzer(dir.path()).index().unwrap();

        let hierarchy = query::get_class_hierarchy(&snap, "X");
        assert!(!hierarchy.classes[0].cycles.is_empty());
        assert!(snap
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::CyclicBase));
    }

    const CHAIN: &str = r#"
void f();
void g();
void h();

void f() { g(); }
void g() { h(); }
void h() { }
"#;

    #[test]
    fn test_call_path_through_intermediate() {
        let dir = project(&[("chain.cpp", CHAIN)]);
        let snap = analyzer(dir.path()).index().unwrap();

        let path = query::get_call_path(&snap, "f", "h", 10);
        assert_eq!(path.status, QueryStatus::Found);
        assert_eq!(qualified(&path.path), vec!["f", "g", "h"]);

        let short = query::get_call_path(&snap, "f", "h", 1);
        assert_eq!(short.status, QueryStatus::NotFound);
    }

    #[test]
    fn test_call_path_with_cycle() {
        let cyclic = CHAIN.replace("void h() { }", "void h() { f(); }");
        let dir = project(&[("chain.cpp", cyclic.as_str())]);
        let snap = analyzer(dir.path()).index().unwrap();

        let path = query::get_call_path(&snap, "f", "h", 10);
        assert_eq!(qualified(&path.path), vec!["f", "g", "h"]);
        let back = query::get_call_path(&snap, "h", "g", 10);
        assert_eq!(qualified(&back.path), vec!["h", "f", "g"]);
    }

    #[test]
    fn test_unreachable_target_not_found() {
        let dir = project(&[(
            "main.cpp",
            "void lonely() {}\nvoid a() { b(); }\nvoid b() {}\n",
        )]);
        let snap = analyzer(dir.path()).index().unwrap();
        let path = query::get_call_path(&snap, "a", "lonely", 10);
        assert_eq!(path.status, QueryStatus::NotFound);
        assert!(path.path.is_empty());

        let unknown = query::get_call_path(&snap, "a", "missing", 10);
        assert_eq!(unknown.status, QueryStatus::NotFound);
    }

    #[test]
    fn test_overloads_across_files_resolve_by_arity() {
        let dir = project(&[
            (
                "math.h",
                "int add(int a, int b);\nint add(int a, int b, int c);\n",
            ),
            (
                "math.cpp",
                "#include \"math.h\"\nint add(int a, int b) { return a + b; }\nint add(int a, int b, int c) { return a + b + c; }\n",
            ),
            ("main.cpp", "#include \"math.h\"\nint main() { return add(1, 2, 3); }\n"),
        ]);
        let snap = analyzer(dir.path()).index().unwrap();

        let sig = query::get_function_signature(&snap, "add", None);
        assert_eq!(sig.status, QueryStatus::Ambiguous);
        let displays: Vec<&str> = sig.overloads.iter().map(|o| o.display.as_str()).collect();
        assert_eq!(displays, vec!["int add(int, int)", "int add(int, int, int)"]);

        let callees = query::find_callees(&snap, "main", None);
        let target = &callees.functions[0].calls[0].symbol;
        assert_eq!(target.display, "int add(int, int, int)");
        assert_eq!(target.symbol.file, Path::new("math.cpp"));
    }

    #[test]
    fn test_search_is_deterministic() {
        let dir = project(&[
            ("z.cpp", "void zeta() {}\nvoid alpha_z() {}\n"),
            ("a.cpp", "void alpha() {}\nnamespace n { void alpha() {} }\n"),
        ]);
        let an = analyzer(dir.path());
        let first = an.index().unwrap();
        let options = SearchOptions::default();
        let a = query::search_functions(&first, "alpha", &options).unwrap();
        assert_eq!(qualified(&a.results), vec!["alpha", "alpha_z", "n::alpha"]);

        let second = an.force_reindex().unwrap();
        let b = query::search_functions(&second, "alpha", &options).unwrap();
        assert_eq!(qualified(&a.results), qualified(&b.results));
    }

    #[test]
    fn test_edit_reindexes_only_that_file() {
        let dir = project(&[
            ("one.cpp", "void one() {}\n"),
            ("two.cpp", "void two() {}\n"),
        ]);
        let an = analyzer(dir.path());
        let before = an.index().unwrap();

        fs::write(dir.path().join("two.cpp"), "void two() { one(); }\n").unwrap();
        let after = an.refresh().unwrap();
        assert_eq!(after.stats.files_extracted, 1);
        assert!(Arc::ptr_eq(
            &before.files[Path::new("one.cpp")],
            &after.files[Path::new("one.cpp")]
        ));

        let callers = query::find_callers(&after, "one", None);
        assert_eq!(callers.functions[0].calls[0].symbol.symbol.name, "two");
    }
}
