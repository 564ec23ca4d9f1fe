//! On-disk store for normalized compile metadata.
//!
//! Outside development mode the engine persists each compile's [`CompileMeta`] so a
//! later process can resolve dependency nodes without recompiling. Entries live at
//! `<dir>/<sha256(key)>.json` and embed the full key to guard against collisions.
//! Each entry also records a sha256 fingerprint of the template source and its
//! watch files; an entry whose inputs have since changed is a miss.
//!
//! The store is best effort. Unreadable or mismatched entries are misses and write
//! failures are logged; neither ever fails a build.

use crate::meta::CompileMeta;
use crate::utils::fs::atomic_write;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct StoredMeta {
    key: String,
    fingerprint: String,
    meta: CompileMeta,
}

/// Digest over the contents of `source` and every watch file in `meta`.
///
/// Unreadable files hash as absent, so deleting an input also changes the digest.
async fn fingerprint(source: &Path, meta: &CompileMeta) -> String {
    let mut paths = vec![source];
    for path in meta.watch_files.iter().flatten() {
        if !paths.contains(&path.as_path()) {
            paths.push(path.as_path());
        }
    }

    let mut hasher = Sha256::new();
    for path in paths {
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update([0]);
        match tokio::fs::read(path).await {
            Ok(content) => {
                hasher.update([1]);
                hasher.update((content.len() as u64).to_le_bytes());
                hasher.update(&content);
            }
            Err(_) => hasher.update([0]),
        }
    }
    hex::encode(hasher.finalize())
}

/// JSON files of [`CompileMeta`] keyed by cache key.
#[derive(Debug, Clone)]
pub struct MetaStore {
    dir: PathBuf,
}

impl MetaStore {
    /// A store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
        }
    }

    /// Root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`.
    pub fn entry_path(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }

    /// Stored metadata for `key`, if present, intact and still matching the
    /// current contents of `source` and its watch files.
    pub async fn load(&self, key: &str, source: &Path) -> Option<CompileMeta> {
        let path = self.entry_path(key);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!(target: "cache", "Unreadable meta entry {}: {}", path.display(), e);
                }
                return None;
            }
        };

        match serde_json::from_slice::<StoredMeta>(&bytes) {
            Ok(stored) if stored.key == key => {
                if fingerprint(source, &stored.meta).await != stored.fingerprint {
                    tracing::debug!(target: "cache", "Meta entry for {} is out of date", key);
                    return None;
                }
                tracing::debug!(target: "cache", "Meta store hit: {}", key);
                Some(stored.meta)
            }
            Ok(_) => {
                tracing::debug!(target: "cache", "Meta entry {} belongs to another key", path.display());
                None
            }
            Err(e) => {
                tracing::debug!(target: "cache", "Corrupt meta entry {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Persist metadata for `key` compiled from `source`. Failures are logged at
    /// warn level.
    pub async fn store(&self, key: &str, source: &Path, meta: &CompileMeta) {
        let path = self.entry_path(key);
        let record = StoredMeta {
            key: key.to_string(),
            fingerprint: fingerprint(source, meta).await,
            meta: meta.clone(),
        };

        let result = match serde_json::to_vec(&record) {
            Ok(bytes) => atomic_write(&path, &bytes).await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = result {
            tracing::warn!(target: "cache", "Failed to persist meta for {}: {:#}", key, e);
        }
    }
}
