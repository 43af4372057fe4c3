//! Init Command
//!
//! Initialize wikisync in a project directory.

use std::path::Path;

use crate::cli::util::directory_name;
use crate::config::ConfigLoader;
use crate::storage::Database;
use crate::types::{Result, SyncError};

pub fn run(project_root: &Path, force: bool) -> Result<()> {
    let data_dir = ConfigLoader::project_dir(project_root);

    if data_dir.exists() && !force {
        return Err(SyncError::Config(
            "Already initialized. Use --force to overwrite.".to_string(),
        ));
    }

    let project_name = directory_name(project_root);

    ConfigLoader::init_project(project_root, Some(&project_name))?;

    // Initialize global config if not exists (don't force overwrite)
    if let Err(e) = ConfigLoader::init_global(false) {
        tracing::debug!("Global config init skipped: {}", e);
    }

    let db = Database::open(ConfigLoader::state_db_path(project_root))?;
    db.initialize()?;

    println!("✓ Initialized wikisync in {}", data_dir.display());
    println!("  Project: {}", project_name);
    println!();
    println!("Next steps:");
    println!("  1. Review .wikisync/config.toml (platform, generator, template)");
    println!("  2. Run 'wikisync plan' to preview the pages");
    println!("  3. Run 'wikisync sync' to publish them");

    Ok(())
}
