//! Staleness evaluation over a compile's watch set.
//!
//! A compiled template is as fresh as the newest file that went into it. The
//! evaluator queries modification times for every watch file plus the source itself,
//! concurrently, and reports the maximum. If any lookup fails the answer is
//! [`Staleness::Unknown`], which the host treats as "always rebuild".

use crate::constants::{IMMUTABLE_TIMESTAMP, UNKNOWN_TIMESTAMP};
use crate::utils::fs::{get_modified_time, millis_since_epoch};
use futures::future::{BoxFuture, try_join_all};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// How fresh a compiled artifact is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staleness {
    /// Output never changes for the life of the process
    Immutable,
    /// Freshness cannot be determined; always rebuild
    Unknown,
    /// Newest input modification, in milliseconds since the Unix epoch
    ModifiedAt(u64),
}

impl Staleness {
    /// The timestamp convention hosts expect: `1`, `-1`, or milliseconds.
    pub fn as_host_timestamp(&self) -> i64 {
        match self {
            Self::Immutable => IMMUTABLE_TIMESTAMP,
            Self::Unknown => UNKNOWN_TIMESTAMP,
            Self::ModifiedAt(ms) => i64::try_from(*ms).unwrap_or(i64::MAX),
        }
    }
}

/// Modification-time lookups, swappable in tests.
pub trait FileSystem: Send + Sync {
    /// Last modification time of `path`.
    fn modified<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<SystemTime>>;
}

/// [`FileSystem`] backed by `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileSystem;

impl FileSystem for TokioFileSystem {
    fn modified<'a>(&'a self, path: &'a Path) -> BoxFuture<'a, io::Result<SystemTime>> {
        Box::pin(get_modified_time(path))
    }
}

/// Computes [`Staleness`] from watch sets.
#[derive(Clone)]
pub struct StalenessEvaluator {
    fs: Arc<dyn FileSystem>,
}

impl StalenessEvaluator {
    /// Evaluator over `fs`.
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
        }
    }

    /// Max modification time over `watch_files` plus `source`.
    ///
    /// `None` watch files means the compiler did not report them, which is
    /// [`Staleness::Unknown`].
    pub async fn evaluate(&self, source: &Path, watch_files: Option<&[PathBuf]>) -> Staleness {
        let Some(watch_files) = watch_files else {
            tracing::debug!(
                target: "staleness",
                "No watch files reported for {}; staleness unknown",
                source.display()
            );
            return Staleness::Unknown;
        };

        let mut paths: Vec<&Path> = Vec::with_capacity(watch_files.len() + 1);
        for path in watch_files.iter().map(PathBuf::as_path).chain(std::iter::once(source)) {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }

        let lookups = paths.iter().map(|path| async move {
            self.fs.modified(path).await.map_err(|e| (path.to_path_buf(), e))
        });

        match try_join_all(lookups).await {
            Ok(times) => {
                let newest = times.into_iter().map(millis_since_epoch).max().unwrap_or(0);
                tracing::debug!(
                    target: "staleness",
                    "{} last modified at {} ({} files)",
                    source.display(),
                    newest,
                    paths.len()
                );
                Staleness::ModifiedAt(newest)
            }
            Err((path, e)) => {
                tracing::warn!(
                    target: "staleness",
                    "Cannot stat {} while checking {}: {}",
                    path.display(),
                    source.display(),
                    e
                );
                Staleness::Unknown
            }
        }
    }
}

impl Default for StalenessEvaluator {
    fn default() -> Self {
        Self::new(Arc::new(TokioFileSystem))
    }
}

impl std::fmt::Debug for StalenessEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StalenessEvaluator").finish_non_exhaustive()
    }
}
