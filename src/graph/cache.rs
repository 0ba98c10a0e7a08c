//! Per-file cache of extraction results.
//!
//! One bincode blob per source file under `<cache_dir>/v<SCHEMA_VERSION>/`.
//! A blob is only valid for the exact bytes it was extracted from; any hash
//! mismatch is a miss.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use super::types::FileRecord;
use crate::error::{AnchorError, Result};

/// Bump whenever [`FileRecord`] or anything it contains changes shape.
pub const SCHEMA_VERSION: u32 = 1;

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// SHA-256 of raw file bytes, hex encoded.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    schema_version: u32,
    path: PathBuf,
    content_hash: String,
    record: FileRecord,
}

/// Result of looking a file up in the cache.
#[derive(Debug)]
pub enum Lookup {
    Hit(FileRecord),
    Miss,
    /// An entry exists but was extracted from different content.
    Stale,
    /// The blob could not be decoded or belongs to something else. It has been removed.
    Corrupt(String),
}

/// Blob store for [`FileRecord`]s, keyed by root-relative path.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Open (creating if needed) the namespace for the current schema version.
    ///
    /// Namespaces of other versions are deleted.
    pub fn open(base: &Path) -> Result<Self> {
        let dir = base.join(format!("v{SCHEMA_VERSION}"));
        fs::create_dir_all(&dir).map_err(|e| AnchorError::io(&dir, e))?;

        if let Ok(entries) = fs::read_dir(base) {
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                let is_version_dir = name
                    .strip_prefix('v')
                    .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()));
                if is_version_dir && entry.path() != dir {
                    info!(dir = %entry.path().display(), "removing cache of another schema version");
                    if let Err(e) = fs::remove_dir_all(entry.path()) {
                        warn!(error = %e, "failed to remove old cache");
                    }
                }
            }
        }

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn blob_path(&self, path: &Path) -> PathBuf {
        let key = hex::encode(Sha256::digest(path.to_string_lossy().as_bytes()));
        self.dir.join(format!("{key}.bin"))
    }

    /// Look up `path`, validating against the hash of its current bytes.
    pub fn lookup(&self, path: &Path, content_hash: &str) -> Lookup {
        let blob = self.blob_path(path);
        let bytes = match fs::read(&blob) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Lookup::Miss,
            Err(e) => return self.corrupt(&blob, e.to_string()),
        };

        let entry: CacheEntry = match bincode::deserialize(&bytes) {
            Ok(entry) => entry,
            Err(e) => return self.corrupt(&blob, e.to_string()),
        };
        if entry.schema_version != SCHEMA_VERSION {
            return self.corrupt(&blob, format!("schema version {}", entry.schema_version));
        }
        if entry.path != path || entry.record.path != path {
            return self.corrupt(&blob, format!("entry belongs to {}", entry.path.display()));
        }
        if entry.content_hash != content_hash || entry.record.content_hash != content_hash {
            return Lookup::Stale;
        }
        Lookup::Hit(entry.record)
    }

    fn corrupt(&self, blob: &Path, reason: String) -> Lookup {
        warn!(blob = %blob.display(), %reason, "corrupt cache entry");
        let _ = fs::remove_file(blob);
        Lookup::Corrupt(reason)
    }

    /// The cached record for `path` if it matches `content_hash`.
    pub fn get(&self, path: &Path, content_hash: &str) -> Option<FileRecord> {
        match self.lookup(path, content_hash) {
            Lookup::Hit(record) => Some(record),
            _ => None,
        }
    }

    /// Store a record. Concurrent writers of the same key: last rename wins.
    pub fn put(&self, record: &FileRecord) -> Result<()> {
        let entry = CacheEntry {
            schema_version: SCHEMA_VERSION,
            path: record.path.clone(),
            content_hash: record.content_hash.clone(),
            record: record.clone(),
        };
        let bytes = bincode::serialize(&entry)?;

        let blob = self.blob_path(&record.path);
        let tmp = self.dir.join(format!(
            ".{}-{}.tmp",
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, bytes).map_err(|e| AnchorError::io(&tmp, e))?;
        fs::rename(&tmp, &blob).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            AnchorError::io(&blob, e)
        })?;
        debug!(path = %record.path.display(), "cached");
        Ok(())
    }

    pub fn remove(&self, path: &Path) -> Result<()> {
        let blob = self.blob_path(path);
        match fs::remove_file(&blob) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AnchorError::io(blob, e)),
        }
    }

    /// Remove every entry whose path is not in `live`. Returns how many were removed.
    pub fn retain<'a>(&self, live: impl IntoIterator<Item = &'a Path>) -> Result<usize> {
        let keep: HashSet<PathBuf> = live.into_iter().map(|p| self.blob_path(p)).collect();
        let entries = fs::read_dir(&self.dir).map_err(|e| AnchorError::io(&self.dir, e))?;

        let mut removed = 0;
        for entry in entries.flatten() {
            let blob = entry.path();
            if blob.extension().is_some_and(|ext| ext == "bin") && !keep.contains(&blob) {
                match fs::remove_file(&blob) {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(AnchorError::io(blob, e)),
                }
            }
        }
        if removed > 0 {
            debug!(removed, "pruned cache entries of vanished files");
        }
        Ok(removed)
    }

    /// Drop every entry of the current namespace.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(AnchorError::io(&self.dir, e)),
        }
        fs::create_dir_all(&self.dir).map_err(|e| AnchorError::io(&self.dir, e))
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        fs::read_dir(&self.dir)
            .map(|entries| {
                entries
                    .flatten()
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "bin"))
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
