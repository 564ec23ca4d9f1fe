//! File modification time queries.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Gets the modification time of a file without blocking the runtime.
///
/// # Errors
///
/// Returns the underlying I/O error when the file is missing or its metadata cannot
/// be read. Callers evaluating staleness rely on the error instead of a fallback.
pub async fn get_modified_time(path: &Path) -> std::io::Result<SystemTime> {
    tokio::fs::metadata(path).await?.modified()
}

/// Milliseconds since the Unix epoch, saturating at the bounds of `u64`.
#[must_use]
pub fn millis_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
