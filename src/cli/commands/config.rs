//! Config Command
//!
//! Manage wikisync configuration.
//!
//! Usage:
//!   wikisync config show [-g] [-f json]
//!   wikisync config path
//!   wikisync config init [-g] [--force]

use std::path::Path;

use crate::cli::util::directory_name;
use crate::config::ConfigLoader;
use crate::types::Result;

/// Show configuration
pub fn show(project_root: &Path, global: bool, format: &str) -> Result<()> {
    if !global {
        // Merged effective config, secrets redacted
        return ConfigLoader::show_config(project_root, format == "json");
    }

    match ConfigLoader::global_config_path() {
        Some(global_path) if global_path.exists() => {
            let content = std::fs::read_to_string(&global_path)?;
            println!("# Global Config: {}\n", global_path.display());
            println!("{}", content);
        }
        Some(_) => {
            println!("No global config found.");
            println!("Run 'wikisync config init --global' to create one.");
        }
        None => println!("Cannot determine global config directory."),
    }
    Ok(())
}

/// Show configuration paths
pub fn path(project_root: &Path) -> Result<()> {
    ConfigLoader::show_path(project_root);
    Ok(())
}

/// Initialize global configuration
pub fn init_global(force: bool) -> Result<()> {
    let dir = ConfigLoader::init_global(force)?;
    println!("✓ Initialized global configuration");
    println!("  Directory: {}", dir.display());
    if let Some(config_path) = ConfigLoader::global_config_path() {
        println!("  Config:    {}", config_path.display());
    }
    Ok(())
}

/// Initialize project configuration
pub fn init_project(project_root: &Path) -> Result<()> {
    let project_name = directory_name(project_root);

    let dir = ConfigLoader::init_project(project_root, Some(&project_name))?;
    println!("✓ Initialized project configuration");
    println!("  Directory: {}", dir.display());
    println!(
        "  Config:    {}",
        ConfigLoader::project_config_path(project_root).display()
    );
    Ok(())
}
