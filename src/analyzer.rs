//! Project analyzer: runs indexing passes and owns the current snapshot.
//!
//! A pass scans the project, then for every file (in parallel) reuses the
//! previous snapshot's record, loads a cached one, or extracts it afresh.
//! The merged records become a new [`ProjectSnapshot`] that replaces the old
//! one in a single swap. Queries holding the old snapshot are unaffected.

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::{AnchorConfig, ANCHOR_DIR};
use crate::error::{AnchorError, Result};
use crate::graph::cache::{content_hash, CacheStore, Lookup};
use crate::graph::scanner::{FileScanner, ScanEntry};
use crate::graph::snapshot::ProjectSnapshot;
use crate::graph::types::{
    Diagnostic, DiagnosticKind, FileOrigin, FileRecord, FileStatus, IndexStats,
};
use crate::parser::{CppFrontend, Frontend};

/// Requests cooperative cancellation of a running pass.
///
/// Workers check the flag before each file, so files already finished stay
/// cached and are reused by the next pass.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// How a file's record was obtained in a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Reused,
    CacheHit,
    Extracted,
    Skipped,
}

enum Outcome {
    Record {
        record: Arc<FileRecord>,
        source: Source,
        diagnostic: Option<Diagnostic>,
    },
    Unreadable(Diagnostic),
    Cancelled,
}

pub struct ProjectAnalyzer {
    root: PathBuf,
    config: AnchorConfig,
    scanner: FileScanner,
    cache: CacheStore,
    frontend: Arc<dyn Frontend>,
    pool: rayon::ThreadPool,
    snapshot: RwLock<Arc<ProjectSnapshot>>,
    cancel: Arc<AtomicBool>,
    /// Serializes indexing passes.
    indexing: Mutex<()>,
}

impl ProjectAnalyzer {
    /// Analyzer for `root` with config from `<root>/.anchor/config.toml`.
    pub fn open(root: &Path) -> Result<Self> {
        Self::new(root, AnchorConfig::load_for_root(root))
    }

    pub fn new(root: &Path, config: AnchorConfig) -> Result<Self> {
        let frontend = CppFrontend::new(Duration::from_millis(config.parse_timeout_ms));
        Self::with_frontend(root, config, Arc::new(frontend))
    }

    /// Analyzer with a custom frontend.
    pub fn with_frontend(
        root: &Path,
        config: AnchorConfig,
        frontend: Arc<dyn Frontend>,
    ) -> Result<Self> {
        let root = root.canonicalize().map_err(|e| AnchorError::io(root, e))?;
        let scanner = FileScanner::new(&root, &config)?;
        let cache = CacheStore::open(&config.resolve_cache_path(&root.join(ANCHOR_DIR)))?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_count())
            .thread_name(|i| format!("anchor-index-{i}"))
            .build()?;

        Ok(Self {
            snapshot: RwLock::new(Arc::new(ProjectSnapshot::empty(&root))),
            root,
            config,
            scanner,
            cache,
            frontend,
            pool,
            cancel: Arc::new(AtomicBool::new(false)),
            indexing: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &AnchorConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// The current snapshot. Never blocks on a running pass.
    pub fn snapshot(&self) -> Arc<ProjectSnapshot> {
        let guard = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            flag: Arc::clone(&self.cancel),
        }
    }

    /// Incremental pass: only files whose content changed are extracted.
    pub fn index(&self) -> Result<Arc<ProjectSnapshot>> {
        self.run_pass(false)
    }

    /// Same as [`index`](Self::index); reads better at call sites reacting to edits.
    pub fn refresh(&self) -> Result<Arc<ProjectSnapshot>> {
        self.run_pass(false)
    }

    /// Drop the cache and re-extract every file.
    pub fn force_reindex(&self) -> Result<Arc<ProjectSnapshot>> {
        self.run_pass(true)
    }

    fn run_pass(&self, force: bool) -> Result<Arc<ProjectSnapshot>> {
        let _pass = self.indexing.lock().unwrap_or_else(|e| e.into_inner());
        self.cancel.store(false, Ordering::SeqCst);
        let start = Instant::now();

        if force {
            info!("forced reindex, clearing cache");
            self.cache.clear()?;
        }
        let previous = self.snapshot();

        let entries: Vec<ScanEntry> = self.scanner.scan().collect();
        debug!(files = entries.len(), "scan complete");

        let outcomes: Vec<Outcome> = self.pool.install(|| {
            entries
                .par_iter()
                .map(|entry| self.process(entry, &previous, force))
                .collect()
        });

        if self.cancel.swap(false, Ordering::SeqCst)
            || outcomes.iter().any(|o| matches!(o, Outcome::Cancelled))
        {
            info!("indexing cancelled, keeping previous snapshot");
            return Err(AnchorError::Cancelled);
        }

        let mut stats = IndexStats {
            files_scanned: entries.len(),
            ..IndexStats::default()
        };
        let mut files: BTreeMap<PathBuf, Arc<FileRecord>> = BTreeMap::new();
        let mut diagnostics = Vec::new();

        for outcome in outcomes {
            let (record, source, diagnostic) = match outcome {
                Outcome::Record {
                    record,
                    source,
                    diagnostic,
                } => (record, source, diagnostic),
                Outcome::Unreadable(diagnostic) => {
                    diagnostics.push(diagnostic);
                    continue;
                }
                Outcome::Cancelled => continue,
            };
            diagnostics.extend(diagnostic);
            match source {
                Source::Reused => stats.files_reused += 1,
                Source::CacheHit => stats.cache_hits += 1,
                Source::Extracted => stats.files_extracted += 1,
                Source::Skipped => {}
            }
            match &record.status {
                FileStatus::Parsed => stats.files_parsed += 1,
                FileStatus::Failed(reason) => {
                    stats.files_failed += 1;
                    diagnostics.push(Diagnostic::new(
                        &record.path,
                        DiagnosticKind::ParseFailed,
                        reason.clone(),
                    ));
                }
                FileStatus::Skipped(_) => stats.files_skipped += 1,
            }
            files.insert(record.path.clone(), record);
        }

        if stats.files_parsed == 0 {
            let candidates = stats.files_scanned - stats.files_skipped;
            warn!(candidates, failed = stats.files_failed, "no file could be parsed");
            return Err(AnchorError::NoParsedFiles {
                candidates,
                failed: stats.files_failed,
                skipped: stats.files_skipped,
            });
        }

        // Files deleted while no analyzer was running only show up here.
        if let Err(e) = self.cache.retain(entries.iter().map(ScanEntry::relative)) {
            warn!(error = %e, "failed to prune cache");
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        let snapshot = Arc::new(ProjectSnapshot::build(
            &self.root,
            previous.generation + 1,
            files,
            diagnostics,
            stats,
        ));

        info!(
            generation = snapshot.generation,
            files = snapshot.stats.files_parsed,
            extracted = snapshot.stats.files_extracted,
            cached = snapshot.stats.cache_hits + snapshot.stats.files_reused,
            failed = snapshot.stats.files_failed,
            symbols = snapshot.stats.symbols,
            call_edges = snapshot.stats.call_edges,
            duration_ms = snapshot.stats.duration_ms,
            "index pass complete"
        );

        let mut slot = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Arc::clone(&snapshot);
        Ok(snapshot)
    }

    /// Produce the record for one scanned file.
    fn process(&self, entry: &ScanEntry, previous: &ProjectSnapshot, force: bool) -> Outcome {
        if self.cancel.load(Ordering::SeqCst) {
            return Outcome::Cancelled;
        }

        let (path, relative, origin) = match entry {
            ScanEntry::Skipped {
                relative,
                origin,
                reason,
                ..
            } => {
                debug!(path = %relative.display(), %reason, "skipped");
                return Outcome::Record {
                    record: Arc::new(FileRecord::skipped(relative.clone(), *origin, reason.clone())),
                    source: Source::Skipped,
                    diagnostic: None,
                };
            }
            ScanEntry::Candidate {
                path,
                relative,
                origin,
                ..
            } => (path, relative, *origin),
        };

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %relative.display(), error = %e, "unreadable file");
                return Outcome::Unreadable(Diagnostic::new(
                    relative,
                    DiagnosticKind::Unreadable,
                    e.to_string(),
                ));
            }
        };
        let hash = content_hash(&bytes);

        if !force {
            if let Some(old) = previous.files.get(relative) {
                if old.content_hash == hash && !matches!(old.status, FileStatus::Skipped(_)) {
                    return Outcome::Record {
                        record: with_origin(Arc::clone(old), origin),
                        source: Source::Reused,
                        diagnostic: None,
                    };
                }
            }
        }

        let mut diagnostic = None;
        match self.cache.lookup(relative, &hash) {
            Lookup::Hit(record) => {
                return Outcome::Record {
                    record: with_origin(Arc::new(record), origin),
                    source: Source::CacheHit,
                    diagnostic: None,
                };
            }
            Lookup::Corrupt(reason) => {
                diagnostic = Some(Diagnostic::new(
                    relative,
                    DiagnosticKind::CacheCorrupt,
                    reason,
                ));
            }
            Lookup::Stale | Lookup::Miss => {}
        }

        let record = match self.frontend.extract(relative, &bytes) {
            Ok(extraction) => FileRecord::parsed(relative.clone(), hash, origin, extraction),
            Err(e) => {
                warn!(path = %relative.display(), error = %e, "extraction failed");
                FileRecord::failed(relative.clone(), hash, origin, e.to_string())
            }
        };
        if let Err(e) = self.cache.put(&record) {
            warn!(path = %relative.display(), error = %e, "failed to cache record");
        }

        Outcome::Record {
            record: Arc::new(record),
            source: Source::Extracted,
            diagnostic,
        }
    }
}

/// Dependency directories can change between passes without the bytes changing.
fn with_origin(record: Arc<FileRecord>, origin: FileOrigin) -> Arc<FileRecord> {
    if record.origin == origin {
        return record;
    }
    let mut owned = (*record).clone();
    owned.origin = origin;
    Arc::new(owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{Extraction, SymbolKind};
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/a.cpp", "int helper(int x) { return x; }\n");
        write(
            dir.path(),
            "src/b.cpp",
            "int helper(int x);\nint run() { return helper(1); }\n",
        );
        dir
    }

    fn analyzer(dir: &TempDir) -> ProjectAnalyzer {
        ProjectAnalyzer::new(dir.path(), AnchorConfig::default()).unwrap()
    }

    #[test]
    fn test_reindex_unchanged_project_extracts_nothing() {
        let dir = project();
        let an = analyzer(&dir);

        let first = an.index().unwrap();
        assert_eq!(first.stats.files_extracted, 2);
        assert_eq!(first.generation, 1);

        let second = an.index().unwrap();
        assert_eq!(second.stats.files_extracted, 0);
        assert_eq!(second.stats.files_reused, 2);
        assert_eq!(second.index.symbols(), first.index.symbols());
        assert_eq!(
            second.files[Path::new("src/a.cpp")].edges,
            first.files[Path::new("src/a.cpp")].edges
        );
        assert_eq!(second.generation, 2);
    }

    #[test]
    fn test_cache_survives_restart() {
        let dir = project();
        analyzer(&dir).index().unwrap();

        let snap = analyzer(&dir).index().unwrap();
        assert_eq!(snap.stats.cache_hits, 2);
        assert_eq!(snap.stats.files_extracted, 0);
    }

    #[test]
    fn test_changed_file_is_the_only_one_extracted() {
        let dir = project();
        let an = analyzer(&dir);
        let first = an.index().unwrap();

        write(dir.path(), "src/b.cpp", "int run() { return 2; }\n");
        let second = an.refresh().unwrap();
        assert_eq!(second.stats.files_extracted, 1);
        assert_eq!(second.stats.files_reused, 1);
        assert!(Arc::ptr_eq(
            &first.files[Path::new("src/a.cpp")],
            &second.files[Path::new("src/a.cpp")]
        ));
        assert!(second.files[Path::new("src/b.cpp")].edges.is_empty());
    }

    #[test]
    fn test_cross_file_call_is_resolved() {
        let dir = project();
        let snap = analyzer(&dir).index().unwrap();
        let run = snap.index.callables_named("run")[0];
        let callees = snap.calls.callees(&run.id);
        assert_eq!(callees.len(), 1);
        let target = snap.index.get(&callees[0].id).unwrap();
        assert_eq!(target.file, Path::new("src/a.cpp"));
        assert!(target.is_definition);
    }

    #[test]
    fn test_deleted_file_leaves_snapshot_and_cache() {
        let dir = project();
        let an = analyzer(&dir);
        an.index().unwrap();
        assert_eq!(an.cache().len(), 2);

        fs::remove_file(dir.path().join("src/b.cpp")).unwrap();
        let snap = an.index().unwrap();
        assert!(snap.file(Path::new("src/b.cpp")).is_none());
        assert_eq!(an.cache().len(), 1);
    }

    #[test]
    fn test_file_deleted_between_runs_is_pruned() {
        let dir = project();
        analyzer(&dir).index().unwrap();

        fs::remove_file(dir.path().join("src/b.cpp")).unwrap();
        let an = analyzer(&dir);
        assert_eq!(an.cache().len(), 2);
        let snap = an.index().unwrap();
        assert_eq!(snap.stats.cache_hits, 1);
        assert_eq!(an.cache().len(), 1);
    }

    #[test]
    fn test_force_reindex_extracts_everything() {
        let dir = project();
        let an = analyzer(&dir);
        an.index().unwrap();
        let snap = an.force_reindex().unwrap();
        assert_eq!(snap.stats.files_extracted, 2);
    }

    /// Fails on files named `bad.cpp`, defers to tree-sitter otherwise.
    struct Flaky(CppFrontend);

    impl Frontend for Flaky {
        fn extract(&self, path: &Path, source: &[u8]) -> Result<Extraction> {
            if path.file_name().is_some_and(|n| n == "bad.cpp") {
                return Err(AnchorError::ParseTimeout {
                    path: path.to_path_buf(),
                    timeout_ms: 1,
                });
            }
            self.0.extract(path, source)
        }
    }

    #[test]
    fn test_failed_file_does_not_abort_pass() {
        let dir = project();
        write(dir.path(), "src/bad.cpp", "void slow() {}\n");
        let an = ProjectAnalyzer::with_frontend(
            dir.path(),
            AnchorConfig::default(),
            Arc::new(Flaky(CppFrontend::default())),
        )
        .unwrap();

        let snap = an.index().unwrap();
        assert_eq!(snap.stats.files_failed, 1);
        assert_eq!(snap.stats.files_parsed, 2);
        let bad = snap.file(Path::new("src/bad.cpp")).unwrap();
        assert!(matches!(bad.status, FileStatus::Failed(_)));
        assert!(bad.symbols.is_empty());
        assert!(snap
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::ParseFailed));

        // Failures are cached until the content changes.
        let again = an.index().unwrap();
        assert_eq!(again.stats.files_extracted, 0);
        assert_eq!(again.stats.files_failed, 1);
    }

    #[test]
    fn test_all_failed_is_a_project_error() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "bad.cpp", "int x;\n");
        let an = ProjectAnalyzer::with_frontend(
            dir.path(),
            AnchorConfig::default(),
            Arc::new(Flaky(CppFrontend::default())),
        )
        .unwrap();

        let err = an.index().unwrap_err();
        assert!(matches!(err, AnchorError::NoParsedFiles { failed: 1, .. }));
        assert_eq!(an.snapshot().generation, 0);
    }

    /// Cancels the pass from inside the first extraction.
    struct Cancelling {
        inner: CppFrontend,
        handle: Mutex<Option<CancelHandle>>,
    }

    impl Frontend for Cancelling {
        fn extract(&self, path: &Path, source: &[u8]) -> Result<Extraction> {
            if let Some(handle) = self.handle.lock().unwrap().take() {
                handle.cancel();
            }
            self.inner.extract(path, source)
        }
    }

    #[test]
    fn test_cancelled_pass_publishes_nothing_but_keeps_cache() {
        let dir = project();
        write(dir.path(), "src/c.cpp", "void c() {}\n");
        let frontend = Arc::new(Cancelling {
            inner: CppFrontend::default(),
            handle: Mutex::new(None),
        });
        let config = AnchorConfig {
            workers: Some(1),
            ..AnchorConfig::default()
        };
        let an = ProjectAnalyzer::with_frontend(dir.path(), config, frontend.clone()).unwrap();
        *frontend.handle.lock().unwrap() = Some(an.cancel_handle());

        assert!(matches!(an.index(), Err(AnchorError::Cancelled)));
        assert_eq!(an.snapshot().generation, 0);
        assert!(!an.cancel_handle().is_cancelled());
        let finished = an.cache().len();
        assert!(finished >= 1 && finished < 3);

        let snap = an.index().unwrap();
        assert_eq!(snap.stats.cache_hits, finished);
        assert_eq!(snap.stats.files_extracted, 3 - finished);
        assert_eq!(snap.index.count_kind(|k| k == SymbolKind::Function), 4);
    }

    #[test]
    fn test_skipped_files_are_recorded() {
        let dir = project();
        write(dir.path(), "src/huge.cpp", &"// padding\n".repeat(200));
        let config = AnchorConfig {
            max_file_size_mb: 0.001,
            ..AnchorConfig::default()
        };
        let snap = ProjectAnalyzer::new(dir.path(), config)
            .unwrap()
            .index()
            .unwrap();
        let huge = snap.file(Path::new("src/huge.cpp")).unwrap();
        assert!(matches!(huge.status, FileStatus::Skipped(_)));
        assert_eq!(snap.stats.files_skipped, 1);
    }
}
