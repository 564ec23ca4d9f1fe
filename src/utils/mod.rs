//! Cross-cutting utilities.

pub mod fs;

pub use fs::{normalize_path, resolve_relative};
