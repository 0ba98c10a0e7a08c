//! Error types for the C++ index.
//!
//! `AnchorError` covers engine failures. Per-file outcomes that must not
//! abort a batch are recorded as diagnostics on the snapshot instead, and
//! query outcomes carry a [`QueryStatus`].

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the indexing engine.
#[derive(Debug, Error)]
pub enum AnchorError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("invalid name pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("invalid glob '{pattern}': {reason}")]
    InvalidGlob { pattern: String, reason: String },

    #[error("failed to parse {path}: {reason}")]
    ParseFailed { path: PathBuf, reason: String },

    #[error("parse of {path} exceeded {timeout_ms}ms")]
    ParseTimeout { path: PathBuf, timeout_ms: u64 },

    #[error("corrupt cache entry {path}: {reason}")]
    CacheCorrupt { path: PathBuf, reason: String },

    #[error("cache encoding failed: {0}")]
    Encode(#[from] bincode::Error),

    #[error(
        "no file could be parsed ({candidates} candidates, {failed} failed, {skipped} skipped)"
    )]
    NoParsedFiles {
        candidates: usize,
        failed: usize,
        skipped: usize,
    },

    #[error("indexing cancelled")]
    Cancelled,

    #[error("worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl AnchorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AnchorError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, AnchorError>;

/// Outcome of a query. Missing answers are normal results, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Found,
    NotFound,
    /// Several symbols matched; the full match set is returned.
    Ambiguous,
}

impl QueryStatus {
    /// Status for a result set of `n` candidates.
    pub fn for_count(n: usize) -> Self {
        match n {
            0 => QueryStatus::NotFound,
            1 => QueryStatus::Found,
            _ => QueryStatus::Ambiguous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_for_count() {
        assert_eq!(QueryStatus::for_count(0), QueryStatus::NotFound);
        assert_eq!(QueryStatus::for_count(1), QueryStatus::Found);
        assert_eq!(QueryStatus::for_count(3), QueryStatus::Ambiguous);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&QueryStatus::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
    }

    #[test]
    fn test_no_parsed_files_message() {
        let err = AnchorError::NoParsedFiles {
            candidates: 3,
            failed: 2,
            skipped: 1,
        };
        assert!(err.to_string().contains("3 candidates"));
    }
}
