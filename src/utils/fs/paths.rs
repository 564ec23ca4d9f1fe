//! Lexical path helpers.
//!
//! Dependency paths are resolved relative to the file that declared them without
//! touching the file system, so virtual files (which never exist on disk) resolve
//! the same way as real ones.

use std::path::{Component, Path, PathBuf};

/// Normalizes a path by resolving `.` and `..` components.
///
/// This performs logical path resolution without accessing the filesystem. It does
/// not resolve symbolic links or verify that the path exists. A `..` at the root of
/// an absolute path stays at the root.
///
/// # Examples
///
/// ```rust
/// use tmplgraph::utils::fs::normalize_path;
/// use std::path::{Path, PathBuf};
///
/// let path = Path::new("/foo/./bar/../baz");
/// assert_eq!(normalize_path(path), PathBuf::from("/foo/baz"));
///
/// let relative = Path::new("../src/./lib.rs");
/// assert_eq!(normalize_path(relative), PathBuf::from("../src/lib.rs"));
/// ```
#[must_use]
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match components.last() {
                Some(Component::Normal(_)) => {
                    components.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => components.push(component),
            },
            c => components.push(c),
        }
    }

    components.iter().collect()
}

/// Resolves `target` against `base_dir` the way a bundler resolves a relative
/// dependency: absolute targets are kept, relative ones are joined, and the result
/// is normalized.
///
/// ```rust
/// use tmplgraph::utils::fs::resolve_relative;
/// use std::path::{Path, PathBuf};
///
/// assert_eq!(resolve_relative(Path::new("/a/b"), "./x.css"), PathBuf::from("/a/b/x.css"));
/// assert_eq!(resolve_relative(Path::new("/a/b"), "../shared/pkg"), PathBuf::from("/a/shared/pkg"));
/// assert_eq!(resolve_relative(Path::new("/a/b"), "/abs/y.js"), PathBuf::from("/abs/y.js"));
/// ```
#[must_use]
pub fn resolve_relative(base_dir: &Path, target: impl AsRef<Path>) -> PathBuf {
    normalize_path(&base_dir.join(target))
}

/// Directory containing `path`, or the path itself when it has no parent.
#[must_use]
pub fn parent_dir(path: &Path) -> &Path {
    path.parent().unwrap_or(path)
}
