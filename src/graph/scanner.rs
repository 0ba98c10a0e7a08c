//! File scanner: discovers C++ sources under a project root.
//!
//! Walks the tree with `ignore`, pruning excluded directories, and reports
//! every remaining source file either as a parse candidate or as skipped.

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use super::types::{FileOrigin, SkipReason};
use crate::config::AnchorConfig;
use crate::error::{AnchorError, Result};

/// One file the scanner found.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEntry {
    Candidate {
        path: PathBuf,
        /// Relative to the project root.
        relative: PathBuf,
        origin: FileOrigin,
        size: u64,
    },
    Skipped {
        path: PathBuf,
        relative: PathBuf,
        origin: FileOrigin,
        reason: SkipReason,
    },
}

impl ScanEntry {
    pub fn relative(&self) -> &Path {
        match self {
            ScanEntry::Candidate { relative, .. } | ScanEntry::Skipped { relative, .. } => relative,
        }
    }
}

/// Compiled scan rules for one project root.
///
/// `scan` can be called any number of times; each call walks the tree afresh.
#[derive(Debug, Clone)]
pub struct FileScanner {
    root: PathBuf,
    excluded_dirs: GlobSet,
    dependency_dirs: GlobSet,
    include_dependencies: bool,
    exclude_patterns: Vec<(String, Glob)>,
    excluded_files: GlobSet,
    extensions: Vec<String>,
    max_size: u64,
    respect_gitignore: bool,
}

impl FileScanner {
    pub fn new(root: &Path, config: &AnchorConfig) -> Result<Self> {
        let mut exclude_patterns = Vec::with_capacity(config.exclude_patterns.len());
        for pattern in &config.exclude_patterns {
            exclude_patterns.push((pattern.clone(), glob(pattern)?));
        }
        let excluded_files = build_set(exclude_patterns.iter().map(|(_, g)| g.clone()))?;

        Ok(Self {
            root: root.to_path_buf(),
            excluded_dirs: segment_set(&config.exclude_directories)?,
            dependency_dirs: segment_set(&config.dependency_directories)?,
            include_dependencies: config.include_dependencies,
            exclude_patterns,
            excluded_files,
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_size: config.max_file_size_bytes(),
            respect_gitignore: config.respect_gitignore,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk the project in file-name order.
    pub fn scan(&self) -> impl Iterator<Item = ScanEntry> + '_ {
        let prune = self.excluded_dirs.clone();
        let dependencies = self.dependency_dirs.clone();
        let skip_dependencies = !self.include_dependencies;

        WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .require_git(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_dir()) {
                    return true;
                }
                let name = entry.file_name();
                if prune.is_match(name) {
                    return false;
                }
                !(skip_dependencies && dependencies.is_match(name))
            })
            .build()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
            .filter_map(move |entry| self.classify(entry.path(), entry.metadata().ok().map(|m| m.len())))
    }

    /// Apply extension, pattern and size rules to one file.
    fn classify(&self, path: &Path, size: Option<u64>) -> Option<ScanEntry> {
        let relative = path.strip_prefix(&self.root).unwrap_or(path).to_path_buf();
        let origin = self.origin_of(&relative);

        if !self.has_source_extension(path) {
            return None;
        }

        if let Some(pattern) = self.excluded_by(&relative) {
            return Some(ScanEntry::Skipped {
                path: path.to_path_buf(),
                relative,
                origin,
                reason: SkipReason::ExcludedPattern { pattern },
            });
        }

        let size = size.unwrap_or(0);
        if size > self.max_size {
            return Some(ScanEntry::Skipped {
                path: path.to_path_buf(),
                relative,
                origin,
                reason: SkipReason::TooLarge {
                    size,
                    limit: self.max_size,
                },
            });
        }

        Some(ScanEntry::Candidate {
            path: path.to_path_buf(),
            relative,
            origin,
            size,
        })
    }

    fn excluded_by(&self, relative: &Path) -> Option<String> {
        if self.exclude_patterns.is_empty() {
            return None;
        }
        let name = relative.file_name().map(Path::new);
        let mut hits = self.excluded_files.matches(relative);
        if hits.is_empty() {
            if let Some(name) = name {
                hits = self.excluded_files.matches(name);
            }
        }
        hits.first().map(|&i| self.exclude_patterns[i].0.clone())
    }

    fn has_source_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|allowed| *allowed == ext))
    }

    /// `Dependency` when any directory segment is a dependency directory.
    pub fn origin_of(&self, relative: &Path) -> FileOrigin {
        let mut dirs = relative.components().collect::<Vec<_>>();
        dirs.pop();
        let in_dependency = dirs.iter().any(|c| match c {
            Component::Normal(segment) => self.dependency_dirs.is_match(segment),
            _ => false,
        });
        if in_dependency {
            FileOrigin::Dependency
        } else {
            FileOrigin::Project
        }
    }
}

fn glob(pattern: &str) -> Result<Glob> {
    Glob::new(pattern).map_err(|e| AnchorError::InvalidGlob {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

fn build_set(globs: impl IntoIterator<Item = Glob>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for g in globs {
        builder.add(g);
    }
    builder.build().map_err(|e| AnchorError::InvalidGlob {
        pattern: "<set>".to_string(),
        reason: e.to_string(),
    })
}

/// Directory names match a single path segment, exactly or as a glob.
fn segment_set(names: &[String]) -> Result<GlobSet> {
    let mut globs = Vec::with_capacity(names.len());
    for name in names {
        globs.push(glob(name)?);
    }
    build_set(globs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn relatives(entries: &[ScanEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| e.relative().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "src/main.cpp", "int main() {}");
        write(root, "src/util.hpp", "void util();");
        write(root, "src/notes.txt", "not code");
        write(root, "build/CMakeFiles/gen.cpp", "void gen();");
        write(root, "third_party/lib/lib.h", "void lib();");
        write(root, ".hidden/secret.cpp", "void secret();");
        dir
    }

    #[test]
    fn test_scan_filters_and_orders() {
        let dir = project();
        let scanner = FileScanner::new(dir.path(), &AnchorConfig::default()).unwrap();
        let entries: Vec<ScanEntry> = scanner.scan().collect();
        assert_eq!(
            relatives(&entries),
            vec!["src/main.cpp", "src/util.hpp", "third_party/lib/lib.h"]
        );

        let origins: Vec<FileOrigin> = entries
            .iter()
            .map(|e| match e {
                ScanEntry::Candidate { origin, .. } => *origin,
                ScanEntry::Skipped { origin, .. } => *origin,
            })
            .collect();
        assert_eq!(
            origins,
            vec![FileOrigin::Project, FileOrigin::Project, FileOrigin::Dependency]
        );
    }

    #[test]
    fn test_scan_is_restartable() {
        let dir = project();
        let scanner = FileScanner::new(dir.path(), &AnchorConfig::default()).unwrap();
        let first: Vec<ScanEntry> = scanner.scan().collect();
        let second: Vec<ScanEntry> = scanner.scan().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_dependencies_can_be_excluded() {
        let dir = project();
        let config = AnchorConfig {
            include_dependencies: false,
            ..AnchorConfig::default()
        };
        let scanner = FileScanner::new(dir.path(), &config).unwrap();
        let entries: Vec<ScanEntry> = scanner.scan().collect();
        assert_eq!(relatives(&entries), vec!["src/main.cpp", "src/util.hpp"]);
    }

    #[test]
    fn test_exclude_pattern_reports_skipped() {
        let dir = project();
        write(dir.path(), "src/main_test.cpp", "void t();");
        write(dir.path(), "docs/README.md", "# docs");
        write(dir.path(), "docs/logo.png", "png");
        let config = AnchorConfig {
            exclude_patterns: vec!["*_test.cpp".to_string(), "docs/*".to_string()],
            ..AnchorConfig::default()
        };
        let scanner = FileScanner::new(dir.path(), &config).unwrap();
        let entries: Vec<ScanEntry> = scanner.scan().collect();
        // Non-source files under an excluded directory are not reported at all.
        assert!(relatives(&entries).iter().all(|r| !r.starts_with("docs/")));
        let skipped: Vec<ScanEntry> = entries
            .into_iter()
            .filter(|e| matches!(e, ScanEntry::Skipped { .. }))
            .collect();
        assert_eq!(skipped.len(), 1);
        match &skipped[0] {
            ScanEntry::Skipped { reason, relative, .. } => {
                assert_eq!(relative, Path::new("src/main_test.cpp"));
                assert_eq!(
                    reason,
                    &SkipReason::ExcludedPattern {
                        pattern: "*_test.cpp".to_string()
                    }
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_oversized_file_is_skipped() {
        let dir = project();
        write(dir.path(), "src/big.cpp", &"x".repeat(2048));
        let config = AnchorConfig {
            max_file_size_mb: 0.001,
            ..AnchorConfig::default()
        };
        let scanner = FileScanner::new(dir.path(), &config).unwrap();
        let big = scanner
            .scan()
            .find(|e| e.relative() == Path::new("src/big.cpp"))
            .unwrap();
        assert!(matches!(
            big,
            ScanEntry::Skipped {
                reason: SkipReason::TooLarge { size: 2048, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "Legacy.CPP", "void f();");
        let scanner = FileScanner::new(dir.path(), &AnchorConfig::default()).unwrap();
        assert_eq!(scanner.scan().count(), 1);
    }

    #[test]
    fn test_invalid_glob_is_an_error() {
        let config = AnchorConfig {
            exclude_patterns: vec!["src/[".to_string()],
            ..AnchorConfig::default()
        };
        let err = FileScanner::new(Path::new("."), &config).unwrap_err();
        assert!(matches!(err, AnchorError::InvalidGlob { .. }));
    }
}
