//! Hydrate-init expansion.
//!
//! The hydrate-init entry point is never compiled. It expands to the
//! hydrate-register package of the same template plus a small runnable module that
//! starts the component runtime.

use super::{DependencyNode, PackageKind, sibling_with_suffix};
use crate::compiler::OutputMode;
use crate::core::{EngineError, Result};
use std::path::Path;

/// The two nodes a hydrate-init request always yields.
///
/// # Errors
///
/// Fails when a module name or runtime id cannot be encoded into the init code.
pub fn expand_hydrate_init(
    source: &Path,
    runtime_module: &str,
    runtime_id: Option<&str>,
) -> Result<Vec<DependencyNode>> {
    let code = init_code(runtime_module, runtime_id).map_err(|e| {
        EngineError::resolution(runtime_module, source, format!("cannot build init code: {e}"))
    })?;

    Ok(vec![
        DependencyNode::PackageRef {
            resolved_path: source.to_path_buf(),
            package: PackageKind::Template(OutputMode::HydrateRegister),
        },
        DependencyNode::VirtualModule {
            resolved_path: sibling_with_suffix(source, "init.js"),
            dep_type: "js".to_string(),
            code,
            runnable: true,
        },
    ])
}

/// Initialization code: the runtime's `init()`, called with the runtime id if set.
pub fn init_code(runtime_module: &str, runtime_id: Option<&str>) -> serde_json::Result<String> {
    let module = serde_json::to_string(runtime_module)?;
    let argument = runtime_id.map(serde_json::to_string).transpose()?.unwrap_or_default();
    Ok(format!("require({module}).init({argument});\n"))
}
