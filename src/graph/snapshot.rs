//! Immutable view of an indexed project.
//!
//! A snapshot is built once per indexing pass and never mutated. Unchanged
//! file records are shared with the previous snapshot through `Arc`.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::calls::CallGraph;
use super::index::SymbolIndex;
use super::types::{
    Diagnostic, DiagnosticKind, FileRecord, FileStatus, IndexStats, SymbolKind,
};

#[derive(Debug)]
pub struct ProjectSnapshot {
    pub root: PathBuf,
    /// 0 for the empty snapshot, then one per published pass.
    pub generation: u64,
    pub built_at: DateTime<Utc>,
    /// Keyed by root-relative path.
    pub files: BTreeMap<PathBuf, Arc<FileRecord>>,
    pub index: SymbolIndex,
    pub calls: CallGraph,
    pub diagnostics: Vec<Diagnostic>,
    pub stats: IndexStats,
}

impl ProjectSnapshot {
    /// The snapshot before the first pass.
    pub fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            generation: 0,
            built_at: Utc::now(),
            files: BTreeMap::new(),
            index: SymbolIndex::default(),
            calls: CallGraph::default(),
            diagnostics: Vec::new(),
            stats: IndexStats::default(),
        }
    }

    /// Aggregate file records into indexes.
    ///
    /// `stats` arrives with the per-file counters filled in; symbol and call
    /// counters are computed here.
    pub fn build(
        root: &Path,
        generation: u64,
        files: BTreeMap<PathBuf, Arc<FileRecord>>,
        mut diagnostics: Vec<Diagnostic>,
        mut stats: IndexStats,
    ) -> Self {
        let parsed = || files.values().map(Arc::as_ref).filter(|r| r.is_parsed());
        let index = SymbolIndex::build(parsed());
        let calls = CallGraph::build(&index, parsed());

        for (class, cycle) in index.base_cycles() {
            diagnostics.push(Diagnostic::new(
                &class.file,
                DiagnosticKind::CyclicBase,
                format!("cyclic base classes: {}", cycle.join(" -> ")),
            ));
        }
        for record in files.values() {
            if let FileStatus::Skipped(reason) = &record.status {
                diagnostics.push(Diagnostic::new(
                    &record.path,
                    DiagnosticKind::Skipped,
                    reason.to_string(),
                ));
            }
        }
        diagnostics.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.message.cmp(&b.message)));

        stats.symbols = index.len();
        stats.classes = index.count_kind(SymbolKind::is_class_like);
        stats.functions = index.count_kind(SymbolKind::is_callable);
        stats.call_edges = calls.stats().edges;
        stats.unresolved_calls = calls.stats().unresolved;

        Self {
            root: root.to_path_buf(),
            generation,
            built_at: Utc::now(),
            files,
            index,
            calls,
            diagnostics,
            stats,
        }
    }

    pub fn file(&self, path: &Path) -> Option<&FileRecord> {
        self.files.get(path).map(Arc::as_ref)
    }

    /// Turn a user-supplied path (absolute, or relative to the root) into a record key.
    pub fn relative_path(&self, path: &Path) -> PathBuf {
        let stripped = path.strip_prefix(&self.root).unwrap_or(path);
        stripped
            .components()
            .filter(|c| !matches!(c, std::path::Component::CurDir))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{FileOrigin, SkipReason};

    #[test]
    fn test_empty_snapshot() {
        let snap = ProjectSnapshot::empty(Path::new("/proj"));
        assert_eq!(snap.generation, 0);
        assert!(snap.index.is_empty());
        assert!(snap.files.is_empty());
    }

    #[test]
    fn test_skipped_files_become_diagnostics() {
        let mut files = BTreeMap::new();
        let rec = FileRecord::skipped(
            PathBuf::from("big.cpp"),
            FileOrigin::Project,
            SkipReason::TooLarge { size: 10, limit: 5 },
        );
        files.insert(rec.path.clone(), Arc::new(rec));
        let snap = ProjectSnapshot::build(
            Path::new("/proj"),
            1,
            files,
            Vec::new(),
            IndexStats::default(),
        );
        assert_eq!(snap.diagnostics.len(), 1);
        assert_eq!(snap.diagnostics[0].kind, DiagnosticKind::Skipped);
        assert_eq!(snap.stats.symbols, 0);
    }

    #[test]
    fn test_relative_path() {
        let snap = ProjectSnapshot::empty(Path::new("/proj"));
        assert_eq!(snap.relative_path(Path::new("/proj/src/a.cpp")), PathBuf::from("src/a.cpp"));
        assert_eq!(snap.relative_path(Path::new("./src/a.cpp")), PathBuf::from("src/a.cpp"));
        assert_eq!(snap.relative_path(Path::new("src/a.cpp")), PathBuf::from("src/a.cpp"));
    }
}
