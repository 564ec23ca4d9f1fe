//! Constants shared across the engine.
//!
//! Environment variable names, default configuration values and the host
//! timestamp sentinels live here so they are discoverable in one place.

/// Environment variable selecting the build environment.
///
/// Unset, empty or `development` means development mode: caches are build-scoped
/// and staleness is computed from the watch set.
pub const ENV_VAR: &str = "TMPLGRAPH_ENV";

/// Environment variable overriding the configuration file location.
pub const CONFIG_PATH_ENV_VAR: &str = "TMPLGRAPH_CONFIG_PATH";

/// Configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "tmplgraph.toml";

/// Default dependency type name registered with the host.
pub const DEFAULT_TYPE_NAME: &str = "tmpl";

/// Default module exposing the component runtime initializer.
pub const DEFAULT_RUNTIME_MODULE: &str = "@tmpl/runtime/components";

/// Host timestamp reported when output is assumed immutable for the process.
pub const IMMUTABLE_TIMESTAMP: i64 = 1;

/// Host timestamp reported when staleness cannot be determined.
pub const UNKNOWN_TIMESTAMP: i64 = -1;

/// Dependency types the host executes rather than just registers.
pub const SCRIPT_TYPES: &[&str] = &["js", "mjs", "cjs", "script"];

/// Dependency type for plain CommonJS requires.
pub const REQUIRE_TYPE: &str = "require";

/// Dependency type for manifest packages.
pub const PACKAGE_TYPE: &str = "package";
