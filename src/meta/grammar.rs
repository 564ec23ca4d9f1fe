//! Small parsers for the two string grammars found in declared dependency lists.
//!
//! Dependency strings:
//!
//! ```text
//! ^(?:([\w-]+)(?::\s*|\s+))?(.*?(?:\.(\w+))?)$
//! ```
//!
//! An optional leading type token followed by a colon or whitespace, then a path
//! whose trailing extension (if any) is captured as the fallback type. A path that
//! contains `:` before any whitespace is ambiguous; the first match wins, so
//! `c:\x.css` parses as type `c`.
//!
//! Manifest pragmas:
//!
//! ```text
//! ^package(?::\s*|\s+)(.*)$
//! ```

use regex::Regex;
use std::sync::LazyLock;

static DEPENDENCY_GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:([\w-]+)(?::\s*|\s+))?(.*?(?:\.(\w+))?)$")
        .expect("dependency grammar is a valid regex")
});

static MANIFEST_PRAGMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^package(?::\s*|\s+)(.*)$").expect("manifest pragma is a valid regex")
});

/// A dependency string split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedDependency<'a> {
    /// Explicit type prefix, if one was given
    pub declared_type: Option<&'a str>,
    /// The path portion, exactly as written
    pub path: &'a str,
    /// Trailing file extension of the path, if any
    pub extension: Option<&'a str>,
}

impl<'a> ParsedDependency<'a> {
    /// The declared type, falling back to the path's extension.
    pub fn effective_type(&self) -> Option<&'a str> {
        self.declared_type.or(self.extension)
    }
}

/// Parses a declared dependency string.
///
/// Returns `None` when the string does not match the grammar (for example when it
/// spans several lines) or when the path portion is empty.
pub fn parse_dependency(input: &str) -> Option<ParsedDependency<'_>> {
    let captures = DEPENDENCY_GRAMMAR.captures(input.trim())?;
    let path = captures.get(2)?.as_str();
    if path.is_empty() {
        return None;
    }

    Some(ParsedDependency {
        declared_type: captures.get(1).map(|m| m.as_str()),
        path,
        extension: captures.get(3).map(|m| m.as_str()),
    })
}

/// Returns the referenced path when `input` is a `package` pragma.
pub fn parse_manifest_pragma(input: &str) -> Option<&str> {
    MANIFEST_PRAGMA.captures(input.trim()).and_then(|c| c.get(1)).map(|m| m.as_str())
}
