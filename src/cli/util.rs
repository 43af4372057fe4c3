//! CLI Common Utilities
//!
//! Shared initialization and context management for CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, ConfigLoader};
use crate::pipeline::{CancelFlag, SyncPipeline};
use crate::storage::{Database, SharedDatabase};
use crate::types::{Result, SyncError};

/// Command execution context
///
/// Created via `CommandContext::load()` for commands that work on an
/// initialized project.
#[derive(Debug, Clone)]
pub struct CommandContext {
    /// Project root directory
    pub project_root: PathBuf,
    /// Loaded configuration
    pub config: Config,
}

impl CommandContext {
    /// Validates initialization and loads the merged configuration
    pub fn load(project_root: &Path) -> Result<Self> {
        require_initialized(project_root)?;
        let config = ConfigLoader::load_for(project_root)?;
        Ok(Self {
            project_root: project_root.to_path_buf(),
            config,
        })
    }

    /// Override the documentation root for this invocation
    pub fn with_root(mut self, root: Option<&str>) -> Result<Self> {
        if let Some(root) = root {
            self.config.platform.root_key = root.to_string();
            self.config.validate()?;
        }
        Ok(self)
    }

    /// Documentation root of the loaded configuration
    pub fn root(&self) -> &str {
        self.config.documentation_root()
    }

    /// Open the state database, creating the schema on first use
    pub fn open_db(&self) -> Result<SharedDatabase> {
        let db = Database::open(ConfigLoader::state_db_path(&self.project_root))?;
        db.initialize()?;
        Ok(Arc::new(db))
    }

    /// Build the pipeline with a cancel flag wired to Ctrl-C
    pub fn pipeline(&self) -> Result<SyncPipeline> {
        let pipeline = SyncPipeline::open(&self.project_root, self.config.clone())?;
        watch_interrupt(pipeline.cancel_flag());
        Ok(pipeline)
    }
}

/// Require the project data directory to exist
pub fn require_initialized(project_root: &Path) -> Result<PathBuf> {
    if !ConfigLoader::is_project_initialized(project_root) {
        return Err(SyncError::NotInitialized);
    }
    Ok(ConfigLoader::project_dir(project_root))
}

/// Set `cancel` on the first Ctrl-C. Must be called inside a runtime.
pub fn watch_interrupt(cancel: CancelFlag) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted, stopping at the next safe point...");
            cancel.cancel();
        }
    });
}

/// Project name from config, falling back to the directory name
pub fn project_name(project_root: &Path, config: &Config) -> String {
    config.project.name.clone().unwrap_or_else(|| directory_name(project_root))
}

pub fn directory_name(path: &Path) -> String {
    path.canonicalize()
        .ok()
        .as_deref()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("project")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_uninitialized_project_is_rejected() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            CommandContext::load(dir.path()),
            Err(SyncError::NotInitialized)
        ));
    }

    #[test]
    fn test_root_override_is_validated() {
        let dir = TempDir::new().unwrap();
        ConfigLoader::init_project(dir.path(), Some("demo")).unwrap();
        let ctx = CommandContext {
            project_root: dir.path().to_path_buf(),
            config: Config::default(),
        };

        let ctx = ctx.with_root(Some("handbook")).unwrap();
        assert_eq!(ctx.root(), "handbook");
        assert!(ctx.with_root(Some("a/b")).is_err());
    }

    #[test]
    fn test_project_name_prefers_config() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        assert_eq!(project_name(dir.path(), &config), directory_name(dir.path()));

        config.project.name = Some("shop".into());
        assert_eq!(project_name(dir.path(), &config), "shop");
    }
}
