//! File system helpers: lexical path resolution, modification times and atomic writes.

pub mod atomic;
pub mod metadata;
pub mod paths;

pub use atomic::atomic_write;
pub use metadata::{get_modified_time, millis_since_epoch};
pub use paths::{normalize_path, parent_dir, resolve_relative};
