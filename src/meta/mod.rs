//! Compiler metadata normalization.
//!
//! Template compilers have reported metadata in several shapes over time. This module
//! declares the raw shape with every field optional ([`RawMeta`]) and turns it into
//! the one stable shape the rest of the engine consumes ([`CompileMeta`]).
//!
//! # Fallback rules
//!
//! - `watchFiles` is passed through untouched. When it is absent the watch set is
//!   unknown, which downstream means "always stale", never "never stale".
//! - Declared dependencies come from `dependencies` (older compilers) or `deps`
//!   (newer compilers). When both are present, `dependencies` wins.
//! - Every *string* declared dependency matching the `package` pragma contributes a
//!   manifest reference. The string also stays in the declared list.
//! - Nested component references come from `tags`.
//! - Virtual files are whatever the compiler reported through the virtual-dependency
//!   callback, in call order.
//! - Component info comes from the older `component` object.
//!
//! Normalization is pure: no I/O, no path resolution.

pub mod grammar;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

static TRIVIAL_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)\s*(?:"use strict";?|'use strict';?|//.*$|/\*[\s\S]*?\*/)+\s*"#)
        .expect("trivial code pattern is a valid regex")
});

/// One entry of a compiler's declared dependency list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyEntry {
    /// `"[type:] path"` string form
    Declared(String),
    /// Object form with explicit fields
    Structured(StructuredDependency),
}

impl DependencyEntry {
    /// Human-readable form used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Declared(s) => s.clone(),
            Self::Structured(s) => {
                let ty = s.dep_type.as_deref().unwrap_or("?");
                let target = s.path.as_deref().or(s.virtual_path.as_deref()).unwrap_or("<inline>");
                format!("{ty}: {target}")
            }
        }
    }
}

/// Object form of a declared dependency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredDependency {
    /// Dependency type; inferred from the path extension when absent
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub dep_type: Option<String>,
    /// Path relative to the declaring file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Inline source, making this a virtual module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Path the inline source should appear at
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_path: Option<String>,
    /// Whether the host must execute the module
    #[serde(default)]
    pub run: bool,
}

/// A generated in-memory file reported by the compiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualFile {
    /// The file whose compilation emitted this virtual file
    pub origin: PathBuf,
    /// Path relative to `origin`'s directory
    pub virtual_path: String,
    /// Generated source
    pub code: String,
}

/// Component registration info reported by older compilers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentInfo {
    /// Component id
    pub id: String,
    /// Browser module implementing the component, relative to the template
    pub module_path: String,
    /// Whether the component uses the legacy wrapper
    #[serde(default)]
    pub legacy_wrapper: bool,
}

/// Metadata exactly as a compiler reports it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMeta {
    /// Transitive on-disk inputs
    #[serde(default)]
    pub watch_files: Option<Vec<PathBuf>>,
    /// Explicit dependency graph (older compilers)
    #[serde(default)]
    pub dependencies: Option<Vec<DependencyEntry>>,
    /// Meta-embedded declarations (newer compilers)
    #[serde(default)]
    pub deps: Option<Vec<DependencyEntry>>,
    /// Nested component templates
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    /// Component registration info
    #[serde(default)]
    pub component: Option<ComponentInfo>,
}

/// Normalized compiler metadata, cached verbatim with its artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileMeta {
    /// Transitive on-disk inputs; `None` means unknown
    pub watch_files: Option<Vec<PathBuf>>,
    /// Declared dependencies in declaration order
    pub declared_deps: Vec<DependencyEntry>,
    /// Nested component/tag template paths
    pub nested_refs: Vec<String>,
    /// Virtual files in callback order
    pub virtual_files: Vec<VirtualFile>,
    /// Paths taken from `package` pragmas
    pub manifest_refs: Vec<String>,
    /// Component info, when the compiler reported it
    pub component_info: Option<ComponentInfo>,
    /// Whether the generated code was trivial (see [`is_effectively_empty`])
    pub empty_code: bool,
}

/// Output of one compile: generated code plus its normalized metadata.
///
/// Never mutated after creation; shared by `Arc` with every requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    /// Generated code
    pub code: String,
    /// Normalized metadata
    pub meta: Arc<CompileMeta>,
}

impl CompiledArtifact {
    /// Bundle generated code with its metadata.
    pub fn new(code: String, meta: CompileMeta) -> Self {
        Self {
            code,
            meta: Arc::new(meta),
        }
    }
}

/// Normalizes raw compiler metadata.
///
/// `virtual_files` are the files collected from the compiler's virtual-dependency
/// callback during the same compile; `code` is only inspected for the empty-code
/// signal.
pub fn normalize(raw: RawMeta, code: &str, virtual_files: Vec<VirtualFile>) -> CompileMeta {
    let declared_deps = raw.dependencies.or(raw.deps).unwrap_or_default();

    let manifest_refs = declared_deps
        .iter()
        .filter_map(|entry| match entry {
            DependencyEntry::Declared(s) => grammar::parse_manifest_pragma(s),
            DependencyEntry::Structured(_) => None,
        })
        .map(str::to_string)
        .collect();

    CompileMeta {
        watch_files: raw.watch_files,
        declared_deps,
        nested_refs: raw.tags.unwrap_or_default(),
        virtual_files,
        manifest_refs,
        component_info: raw.component,
        empty_code: is_effectively_empty(code),
    }
}

/// Whether generated code is empty once a `"use strict"` prologue, comments and
/// whitespace are stripped.
pub fn is_effectively_empty(code: &str) -> bool {
    TRIVIAL_CODE.replace_all(code, "").trim().is_empty()
}
