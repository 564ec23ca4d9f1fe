//! Shared helpers for the unit and integration suites.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tmplgraph::config::EngineConfig;
use tmplgraph::engine::Engine;
use tmplgraph::test_utils::StubCompiler;

/// An absolute, platform-appropriate root for fake template trees.
pub fn app_root() -> PathBuf {
    std::env::temp_dir().join("tmplgraph-app")
}

/// `app_root()` joined with `/`-separated `rel`.
pub fn app_path(rel: &str) -> PathBuf {
    rel.split('/').fold(app_root(), |path, part| path.join(part))
}

/// Configuration pinned to development mode.
pub fn dev_config() -> EngineConfig {
    EngineConfig {
        dev_mode: Some(true),
        ..EngineConfig::default()
    }
}

/// Configuration pinned to production mode.
pub fn prod_config() -> EngineConfig {
    EngineConfig {
        dev_mode: Some(false),
        ..EngineConfig::default()
    }
}

/// An engine over `compiler`, keeping a handle for call counting.
pub fn engine_with(compiler: &Arc<StubCompiler>, config: EngineConfig) -> Arc<Engine> {
    Arc::new(Engine::new(compiler.clone(), config).expect("valid engine config"))
}

/// A temporary project directory for driving the `tmplgraph` binary.
pub struct TestProject {
    dir: tempfile::TempDir,
}

impl TestProject {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            dir: tempfile::TempDir::new()?,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, content: &str) -> anyhow::Result<PathBuf> {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    /// Write an executable shell script.
    #[cfg(unix)]
    pub fn write_script(&self, rel: &str, body: &str) -> anyhow::Result<PathBuf> {
        use std::os::unix::fs::PermissionsExt;

        let path = self.write(rel, &format!("#!/bin/sh\n{body}\n"))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
        Ok(path)
    }

    /// A command for the `tmplgraph` binary running inside the project.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("tmplgraph").expect("tmplgraph binary");
        cmd.current_dir(self.dir.path())
            .env_remove("RUST_LOG")
            .env_remove("TMPLGRAPH_CONFIG_PATH")
            .env("TMPLGRAPH_ENV", "development")
            .env("NO_COLOR", "1");
        cmd
    }
}
