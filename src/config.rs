//! Project configuration, read from `.anchor/config.toml`.
//!
//! Every field has a default, so a missing file or a partial file both work.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{AnchorError, Result};

/// Directory (relative to the project root) holding config and cache.
pub const ANCHOR_DIR: &str = ".anchor";
/// Config file name inside [`ANCHOR_DIR`].
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    /// Directory names (or globs) never descended into.
    pub exclude_directories: Vec<String>,
    /// File globs, matched against the root-relative path and the file name.
    pub exclude_patterns: Vec<String>,
    /// Directory names that hold third-party code.
    pub dependency_directories: Vec<String>,
    /// Walk dependency directories too. Their symbols are marked as non-project.
    pub include_dependencies: bool,
    pub max_file_size_mb: f64,
    /// Extension allow-list, without the leading dot.
    pub extensions: Vec<String>,
    pub respect_gitignore: bool,
    /// Per-file parse budget.
    pub parse_timeout_ms: u64,
    /// Worker threads; `None` means one per core.
    pub workers: Option<usize>,
    /// Cache location. Relative paths resolve against `.anchor/`.
    pub cache_dir: Option<PathBuf>,
    pub max_call_path_depth: usize,
    pub case_sensitive_search: bool,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            exclude_directories: strings(&[
                ".git",
                ".svn",
                ".hg",
                "node_modules",
                "__pycache__",
                ".pytest_cache",
                ".vs",
                ".vscode",
                ".idea",
                "CMakeFiles",
                "CMakeCache.txt",
                ".anchor",
            ]),
            exclude_patterns: Vec::new(),
            dependency_directories: strings(&[
                "vcpkg_installed",
                "third_party",
                "ThirdParty",
                "external",
                "External",
                "vendor",
                "dependencies",
                "packages",
            ]),
            include_dependencies: true,
            max_file_size_mb: 10.0,
            extensions: strings(&[
                "cpp", "cc", "cxx", "c++", "h", "hpp", "hxx", "h++", "hh", "inl", "ipp",
            ]),
            respect_gitignore: true,
            parse_timeout_ms: 5_000,
            workers: None,
            cache_dir: None,
            max_call_path_depth: 10,
            case_sensitive_search: false,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl AnchorConfig {
    /// Load config from `path`, falling back to defaults.
    ///
    /// A missing file is silent; an unreadable or invalid one logs a warning.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(config)) => config,
            Ok(None) => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
            Err(e) => {
                warn!(error = %e, "ignoring config file, using defaults");
                Self::default()
            }
        }
    }

    /// Load config from `path`. Returns `Ok(None)` when the file does not exist.
    pub fn try_load(path: &Path) -> Result<Option<Self>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AnchorError::io(path, e)),
        };
        let config: Self = toml::from_str(&text).map_err(|e| AnchorError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        config.validate(path)?;
        Ok(Some(config))
    }

    /// Load `<root>/.anchor/config.toml`.
    pub fn load_for_root(root: &Path) -> Self {
        Self::load(&root.join(ANCHOR_DIR).join(CONFIG_FILE))
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if self.max_file_size_mb.is_nan() || self.max_file_size_mb <= 0.0 {
            return Err(AnchorError::Config {
                path: path.to_path_buf(),
                reason: "max_file_size_mb must be positive".to_string(),
            });
        }
        if self.workers == Some(0) {
            return Err(AnchorError::Config {
                path: path.to_path_buf(),
                reason: "workers must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Resolve the cache directory for a given `.anchor/` directory.
    pub fn resolve_cache_path(&self, anchor_dir: &Path) -> PathBuf {
        match &self.cache_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => anchor_dir.join(dir),
            None => anchor_dir.join("cache"),
        }
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        (self.max_file_size_mb * 1024.0 * 1024.0) as u64
    }

    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AnchorConfig::default();
        assert!(config.include_dependencies);
        assert_eq!(config.max_file_size_mb, 10.0);
        assert_eq!(config.max_call_path_depth, 10);
        assert!(config.exclude_directories.contains(&"node_modules".to_string()));
        assert!(config.dependency_directories.contains(&"third_party".to_string()));
        assert!(config.extensions.contains(&"hpp".to_string()));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = AnchorConfig::load(&dir.path().join("config.toml"));
        assert_eq!(config, AnchorConfig::default());
        assert!(AnchorConfig::try_load(&dir.path().join("config.toml"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "include_dependencies = false\nmax_file_size_mb = 2.5\nexclude_patterns = [\"*_test.cpp\"]\n",
        )
        .unwrap();

        let config = AnchorConfig::load(&path);
        assert!(!config.include_dependencies);
        assert_eq!(config.max_file_size_mb, 2.5);
        assert_eq!(config.exclude_patterns, vec!["*_test.cpp".to_string()]);
        assert_eq!(config.parse_timeout_ms, 5_000);
    }

    #[test]
    fn test_invalid_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_file_size_mb = \"huge\"").unwrap();

        assert!(AnchorConfig::try_load(&path).is_err());
        assert_eq!(AnchorConfig::load(&path), AnchorConfig::default());
    }

    #[test]
    fn test_rejects_zero_size_limit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_file_size_mb = 0.0").unwrap();
        assert!(matches!(
            AnchorConfig::try_load(&path),
            Err(AnchorError::Config { .. })
        ));
    }

    #[test]
    fn test_resolve_cache_path() {
        let anchor_dir = Path::new("/proj/.anchor");
        let mut config = AnchorConfig::default();
        assert_eq!(
            config.resolve_cache_path(anchor_dir),
            PathBuf::from("/proj/.anchor/cache")
        );
        config.cache_dir = Some(PathBuf::from("blobs"));
        assert_eq!(
            config.resolve_cache_path(anchor_dir),
            PathBuf::from("/proj/.anchor/blobs")
        );
        config.cache_dir = Some(PathBuf::from("/tmp/anchor"));
        assert_eq!(
            config.resolve_cache_path(anchor_dir),
            PathBuf::from("/tmp/anchor")
        );
    }

    #[test]
    fn test_size_limit_in_bytes() {
        let config = AnchorConfig {
            max_file_size_mb: 1.0,
            ..AnchorConfig::default()
        };
        assert_eq!(config.max_file_size_bytes(), 1024 * 1024);
    }
}
