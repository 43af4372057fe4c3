//! Clean Command
//!
//! Clears the block cache, the publish journal, or all local data.

use std::path::Path;

use crate::cli::util::{CommandContext, require_initialized};
use crate::storage::{PublishJournal, RootLock};
use crate::synth::BlockCache;
use crate::types::{Result, SyncError};

pub async fn run(project_root: &Path, all: bool, cache: bool, journal: bool) -> Result<()> {
    let data_dir = require_initialized(project_root)?;

    if all {
        let ctx = CommandContext::load(project_root)?;
        if RootLock::is_held(&data_dir, ctx.root()) {
            return Err(SyncError::Locked {
                root: ctx.root().to_string(),
            });
        }
        tokio::fs::remove_dir_all(&data_dir).await?;
        println!("✓ Removed {}", data_dir.display());
        println!("  Published pages were left untouched; the next sync starts from scratch.");
        return Ok(());
    }

    if !cache && !journal {
        println!("Nothing selected. Use --cache, --journal or --all.");
        return Ok(());
    }

    let ctx = CommandContext::load(project_root)?;
    let db = ctx.open_db()?;

    if cache {
        let block_cache = BlockCache::new(db.clone());
        let cleared = block_cache.clear()?;
        if cleared > 0 {
            println!("✓ Cleared {} cached content blocks", cleared);
        } else {
            println!("  No cache entries to clear");
        }
    }

    if journal {
        // Discarding a journal of a running sync would lose applied operations
        let _lock = RootLock::acquire(&data_dir, ctx.root())?;
        let cleared = PublishJournal::new(db, ctx.root()).clear()?;
        if cleared > 0 {
            println!("✓ Discarded {} journaled operations", cleared);
            println!("  Pages they created may be reported as unowned on the next sync.");
        } else {
            println!("  Journal is empty");
        }
    }

    Ok(())
}
