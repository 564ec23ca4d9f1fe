//! Dependency Node Resolver.
//!
//! Turns normalized [`CompileMeta`] into the ordered list of typed
//! [`DependencyNode`]s a host bundler consumes. Every relative path is resolved
//! against the directory of the file that *declared* it, never the root compile
//! unit, so nested packages resolve their own dependencies correctly.
//!
//! # Ordering
//!
//! 1. Declared dependencies, in declaration order
//! 2. Manifest references not already emitted in step 1
//! 3. Virtual files, in callback order
//! 4. Nested component references
//! 5. The component module, for non-legacy components
//!
//! # Type rules
//!
//! | Effective type                  | Node                                   |
//! |---------------------------------|----------------------------------------|
//! | `require`                       | `Require`, runnable per the `run` flag |
//! | `js`, `mjs`, `cjs`, `script`    | `Require`, runnable                    |
//! | `package`                       | `PackageRef(Manifest)`                 |
//! | a template extension            | `PackageRef(Template(mode))`           |
//! | anything else                   | `CompileUnit`                          |
//!
//! A structured entry carrying inline `code` always becomes a `VirtualModule`.
//!
//! The host owns traversal: `PackageRef` nodes are expanded by resolving them again,
//! and the same unit may be reached along several paths.

pub mod hydrate;

pub use hydrate::{expand_hydrate_init, init_code};

use crate::compiler::OutputMode;
use crate::constants::{PACKAGE_TYPE, REQUIRE_TYPE, SCRIPT_TYPES};
use crate::core::{EngineError, Result};
use crate::meta::grammar::parse_dependency;
use crate::meta::{CompileMeta, DependencyEntry, StructuredDependency, VirtualFile};
use crate::utils::fs::{parent_dir, resolve_relative};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// What a [`DependencyNode::PackageRef`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "mode", rename_all = "kebab-case")]
pub enum PackageKind {
    /// A manifest package (directory or manifest file)
    Manifest,
    /// Another template, compiled in the given mode
    Template(OutputMode),
}

/// One node of the dependency graph handed to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DependencyNode {
    /// An on-disk file the host compiles with its own handler for `dep_type`
    #[serde(rename_all = "camelCase")]
    CompileUnit {
        /// Absolute path
        path: PathBuf,
        /// Host dependency type, such as `css`
        #[serde(rename = "type")]
        dep_type: String,
    },

    /// Generated in-memory source the host materializes at `resolved_path`
    #[serde(rename_all = "camelCase")]
    VirtualModule {
        /// Absolute path the module appears at
        resolved_path: PathBuf,
        /// Host dependency type, such as `js` or `css`
        #[serde(rename = "type")]
        dep_type: String,
        /// Module source
        code: String,
        /// Whether the host must execute it
        runnable: bool,
    },

    /// A package the host expands recursively
    #[serde(rename_all = "camelCase")]
    PackageRef {
        /// Absolute path
        resolved_path: PathBuf,
        /// Manifest or template package
        package: PackageKind,
    },

    /// A plain module require
    #[serde(rename_all = "camelCase")]
    Require {
        /// Absolute path
        resolved_path: PathBuf,
        /// Whether the host must execute it
        runnable: bool,
    },
}

impl DependencyNode {
    /// The absolute path this node refers to.
    pub fn path(&self) -> &Path {
        match self {
            Self::CompileUnit {
                path,
                ..
            } => path,
            Self::VirtualModule {
                resolved_path,
                ..
            }
            | Self::PackageRef {
                resolved_path,
                ..
            }
            | Self::Require {
                resolved_path,
                ..
            } => resolved_path,
        }
    }
}

/// Converts [`CompileMeta`] into [`DependencyNode`]s.
#[derive(Debug, Clone)]
pub struct NodeResolver {
    template_extensions: Vec<String>,
}

impl NodeResolver {
    /// A resolver treating `template_extensions` (without leading dots) as templates.
    pub fn new(template_extensions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            template_extensions: template_extensions
                .into_iter()
                .map(|e| e.into().trim_start_matches('.').to_string())
                .collect(),
        }
    }

    fn is_template(&self, dep_type: &str) -> bool {
        self.template_extensions.iter().any(|e| e == dep_type)
    }

    /// Resolve all nodes for a unit compiled from `declaring` in `mode`.
    ///
    /// # Errors
    ///
    /// Any entry that cannot be parsed, typed or resolved fails the whole call with
    /// [`EngineError::ResolutionError`].
    pub fn resolve(
        &self,
        meta: &CompileMeta,
        declaring: &Path,
        mode: OutputMode,
    ) -> Result<Vec<DependencyNode>> {
        let dir = parent_dir(declaring);
        let mut nodes = Vec::new();
        let mut packages: HashSet<PathBuf> = HashSet::new();

        for entry in &meta.declared_deps {
            let node = self.resolve_entry(entry, declaring, dir, mode)?;
            if let DependencyNode::PackageRef {
                resolved_path,
                package: PackageKind::Manifest,
            } = &node
            {
                if !packages.insert(resolved_path.clone()) {
                    continue;
                }
            }
            nodes.push(node);
        }

        for manifest in &meta.manifest_refs {
            let resolved_path = resolve_relative(dir, manifest);
            if packages.insert(resolved_path.clone()) {
                nodes.push(DependencyNode::PackageRef {
                    resolved_path,
                    package: PackageKind::Manifest,
                });
            }
        }

        for file in &meta.virtual_files {
            nodes.push(virtual_node(file, declaring)?);
        }

        for nested in &meta.nested_refs {
            if nested.trim().is_empty() {
                return Err(EngineError::resolution(nested, declaring, "empty component reference"));
            }
            nodes.push(DependencyNode::PackageRef {
                resolved_path: resolve_relative(dir, nested),
                package: PackageKind::Template(mode),
            });
        }

        if let Some(component) = meta.component_info.as_ref().filter(|c| !c.legacy_wrapper) {
            nodes.push(DependencyNode::Require {
                resolved_path: resolve_relative(dir, &component.module_path),
                runnable: false,
            });
        }

        tracing::debug!(
            target: "resolver",
            "Resolved {} nodes for {} ({})",
            nodes.len(),
            declaring.display(),
            mode
        );
        Ok(nodes)
    }

    fn resolve_entry(
        &self,
        entry: &DependencyEntry,
        declaring: &Path,
        dir: &Path,
        mode: OutputMode,
    ) -> Result<DependencyNode> {
        match entry {
            DependencyEntry::Declared(raw) => {
                let parsed = parse_dependency(raw).ok_or_else(|| {
                    EngineError::resolution(raw, declaring, "does not match the dependency grammar")
                })?;
                let dep_type = parsed.effective_type().ok_or_else(|| {
                    EngineError::resolution(raw, declaring, "no type given and no file extension")
                })?;
                Ok(self.typed_node(dep_type, resolve_relative(dir, parsed.path), false, mode))
            }
            DependencyEntry::Structured(structured) => {
                self.resolve_structured(structured, entry, declaring, dir, mode)
            }
        }
    }

    fn resolve_structured(
        &self,
        dep: &StructuredDependency,
        entry: &DependencyEntry,
        declaring: &Path,
        dir: &Path,
        mode: OutputMode,
    ) -> Result<DependencyNode> {
        let fail = |reason: &str| EngineError::resolution(entry.describe(), declaring, reason);

        let target = dep
            .virtual_path
            .as_deref()
            .filter(|_| dep.code.is_some())
            .or(dep.path.as_deref())
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| fail("entry has no path"))?;
        let resolved_path = resolve_relative(dir, target);

        let dep_type = match dep.dep_type.as_deref() {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => extension_of(&resolved_path).ok_or_else(|| fail("no type given and no file extension"))?,
        };

        match &dep.code {
            Some(code) => Ok(DependencyNode::VirtualModule {
                runnable: dep.run || is_script_type(&dep_type),
                resolved_path,
                dep_type,
                code: code.clone(),
            }),
            None => Ok(self.typed_node(&dep_type, resolved_path, dep.run, mode)),
        }
    }

    fn typed_node(
        &self,
        dep_type: &str,
        resolved_path: PathBuf,
        run: bool,
        mode: OutputMode,
    ) -> DependencyNode {
        if dep_type == REQUIRE_TYPE {
            DependencyNode::Require {
                resolved_path,
                runnable: run,
            }
        } else if is_script_type(dep_type) {
            DependencyNode::Require {
                resolved_path,
                runnable: true,
            }
        } else if dep_type == PACKAGE_TYPE {
            DependencyNode::PackageRef {
                resolved_path,
                package: PackageKind::Manifest,
            }
        } else if self.is_template(dep_type) {
            DependencyNode::PackageRef {
                resolved_path,
                package: PackageKind::Template(mode),
            }
        } else {
            DependencyNode::CompileUnit {
                path: resolved_path,
                dep_type: dep_type.to_string(),
            }
        }
    }
}

impl Default for NodeResolver {
    fn default() -> Self {
        Self::new([crate::constants::DEFAULT_TYPE_NAME])
    }
}

/// The companion module carrying hydrate-register code: `<dir>/<stem>.hydrate.js`.
pub fn companion_module(source: &Path, code: &str) -> DependencyNode {
    DependencyNode::VirtualModule {
        resolved_path: sibling_with_suffix(source, "hydrate.js"),
        dep_type: "js".to_string(),
        code: code.to_string(),
        runnable: true,
    }
}

/// `<dir>/<stem>.<suffix>` for `source`.
pub(crate) fn sibling_with_suffix(source: &Path, suffix: &str) -> PathBuf {
    let stem = source.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    parent_dir(source).join(format!("{stem}.{suffix}"))
}

fn is_script_type(dep_type: &str) -> bool {
    SCRIPT_TYPES.contains(&dep_type)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().into_owned()).filter(|e| !e.is_empty())
}

/// A virtual file emitted while compiling `declaring` or one of its nested units.
fn virtual_node(file: &VirtualFile, declaring: &Path) -> Result<DependencyNode> {
    if file.virtual_path.trim().is_empty() {
        return Err(EngineError::resolution(
            "<virtual file>",
            &file.origin,
            "virtual file has an empty path",
        ));
    }

    // Files from nested units are re-rooted against their own origin.
    let base = if file.origin == declaring {
        parent_dir(declaring)
    } else {
        parent_dir(&file.origin)
    };
    let resolved_path = resolve_relative(base, &file.virtual_path);

    let dep_type = extension_of(&resolved_path).ok_or_else(|| {
        EngineError::resolution(&file.virtual_path, &file.origin, "virtual file has no extension")
    })?;

    Ok(DependencyNode::VirtualModule {
        runnable: dep_type == "js",
        resolved_path,
        dep_type,
        code: file.code.clone(),
    })
}
