//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/wikisync/config.toml)
//! 3. Project config (.wikisync/config.toml)
//! 4. Environment variables (WIKISYNC_* prefix)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::constants::state;
use crate::types::{Result, SyncError};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the project in the current directory
    pub fn load() -> Result<Config> {
        Self::load_for(Path::new("."))
    }

    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → env vars
    pub fn load_for(project_root: &Path) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path(project_root);
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        // WIKISYNC_PLATFORM_KIND -> platform.kind
        figment = figment
            .merge(Env::prefixed("WIKISYNC_").split('_').lowercase(true))
            .merge(
                Env::raw()
                    .only(&["WIKISYNC_API_KEY"])
                    .map(|_| "generator.api_key".into()),
            )
            .merge(
                Env::raw()
                    .only(&["WIKISYNC_PLATFORM_TOKEN"])
                    .map(|_| "platform.token".into()),
            );

        let config: Config = figment
            .extract()
            .map_err(|e| SyncError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| SyncError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/wikisync/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|v| !v.is_empty())
            .map(|p| PathBuf::from(p).join("wikisync"))
            .or_else(|| {
                directories::BaseDirs::new().map(|dirs| dirs.config_dir().join("wikisync"))
            })
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to project config file
    pub fn project_config_path(project_root: &Path) -> PathBuf {
        Self::project_dir(project_root).join("config.toml")
    }

    /// Get project data directory
    pub fn project_dir(project_root: &Path) -> PathBuf {
        project_root.join(state::DATA_DIR)
    }

    /// Path of the state database
    pub fn state_db_path(project_root: &Path) -> PathBuf {
        Self::project_dir(project_root).join(state::STATE_DB_PATH)
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path(project_root: &Path) {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path(project_root);
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());

        let db = Self::state_db_path(project_root);
        let exists = if db.exists() { "✓" } else { "✗" };
        println!("  State:   {} {}", exists, db.display());
    }

    /// Show current effective configuration with secrets redacted
    pub fn show_config(project_root: &Path, as_json: bool) -> Result<()> {
        let mut config = Self::load_for(project_root)?;
        if config.generator.api_key.is_some() {
            config.generator.api_key = Some("***".to_string());
        }
        if config.platform.token.is_some() {
            config.platform.token = Some("***".to_string());
        }

        if as_json {
            println!("{}", serde_json::to_string_pretty(&config)?);
        } else {
            println!(
                "{}",
                toml::to_string_pretty(&config).map_err(|e| SyncError::Config(e.to_string()))?
            );
        }

        Ok(())
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Initialize global configuration
    pub fn init_global(force: bool) -> Result<PathBuf> {
        let global_dir = Self::global_dir().ok_or_else(|| {
            SyncError::Config("Cannot determine global config directory".to_string())
        })?;

        fs::create_dir_all(&global_dir)?;

        let config_path = global_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_global_config())?;
            info!("Created global config: {}", config_path.display());
        } else {
            info!("Global config exists: {}", config_path.display());
        }

        Ok(global_dir)
    }

    /// Initialize project configuration
    pub fn init_project(project_root: &Path, name: Option<&str>) -> Result<PathBuf> {
        let project_dir = Self::project_dir(project_root);

        fs::create_dir_all(&project_dir)?;
        fs::create_dir_all(project_dir.join(state::LOCK_DIR))?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() {
            fs::write(&config_path, Self::default_project_config(name))?;
            info!("Created project config: {}", config_path.display());
        }

        Ok(project_dir)
    }

    /// Check if project is initialized
    pub fn is_project_initialized(project_root: &Path) -> bool {
        Self::project_dir(project_root).exists()
    }

    // =========================================================================
    // Internal
    // =========================================================================

    fn default_global_config() -> String {
        r#"# wikisync Global Configuration
# User-wide defaults. Project settings in .wikisync/config.toml override these.

version = "1.0"

[generator]
kind = "outline"
timeout_secs = 300

[synthesis]
max_retries = 3
concurrency = 4
"#
        .to_string()
    }

    fn default_project_config(name: Option<&str>) -> String {
        let project_name = name.unwrap_or("project");
        format!(
            r#"# wikisync Project Configuration
# Project-specific settings that override global defaults.

version = "1.0"

[project]
name = "{}"

[analysis]
include = ["**/*"]
exclude = [
    "node_modules/**",
    "dist/**",
    ".git/**",
    "target/**",
    "build/**",
    ".wikisync/**",
]

[platform]
kind = "directory"
directory = "wiki"
root_key = "docs"
"#,
            project_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_project_creates_layout() {
        let temp_dir = TempDir::new().unwrap();
        let dir = ConfigLoader::init_project(temp_dir.path(), Some("shop")).unwrap();

        assert!(dir.join("config.toml").exists());
        assert!(dir.join("locks").is_dir());
        assert!(ConfigLoader::is_project_initialized(temp_dir.path()));
    }

    #[test]
    fn test_project_config_is_loadable() {
        let temp_dir = TempDir::new().unwrap();
        ConfigLoader::init_project(temp_dir.path(), Some("shop")).unwrap();

        let config =
            ConfigLoader::load_from_file(&ConfigLoader::project_config_path(temp_dir.path()))
                .unwrap();
        assert_eq!(config.project.name.as_deref(), Some("shop"));
        assert_eq!(config.documentation_root(), "docs");
    }

    #[test]
    fn test_project_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(
            &path,
            "[publish]\nconcurrency = 2\n\n[platform]\nroot_key = \"handbook\"\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.publish.concurrency, 2);
        assert_eq!(config.publish.max_retries, 3);
        assert_eq!(config.documentation_root(), "handbook");
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[synthesis]\nconcurrency = 0\n").unwrap();

        assert!(matches!(
            ConfigLoader::load_from_file(&path),
            Err(SyncError::Config(_))
        ));
    }
}
