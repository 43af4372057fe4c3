//! Single-writer advisory lock per documentation root
//!
//! Two runs against the same root serialize on an exclusive `fs2` lock held
//! for the whole run. Runs against different roots use different lock files
//! and never contend.

use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::state;
use crate::types::{Result, SyncError, sha256_hex};

/// Holder information written into the lock file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockInfo {
    pub root: String,
    pub pid: u32,
    pub acquired_at: String,
}

/// Exclusive lock on one documentation root, released on drop
#[derive(Debug)]
pub struct RootLock {
    file: File,
    path: PathBuf,
    root: String,
}

impl RootLock {
    /// Lock file location for a root under the data directory
    pub fn lock_path(data_dir: &Path, root: &str) -> PathBuf {
        data_dir
            .join(state::LOCK_DIR)
            .join(format!("{}.lock", &sha256_hex(root)[..16]))
    }

    /// Acquire the lock without waiting; contention yields `SyncError::Locked`
    pub fn acquire(data_dir: &Path, root: &str) -> Result<Self> {
        let path = Self::lock_path(data_dir, root);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                return Err(SyncError::Locked {
                    root: root.to_string(),
                });
            }
            return Err(e.into());
        }

        let info = LockInfo {
            root: root.to_string(),
            pid: std::process::id(),
            acquired_at: Utc::now().to_rfc3339(),
        };
        file.set_len(0)?;
        file.write_all(serde_json::to_string(&info)?.as_bytes())?;
        file.flush()?;

        debug!(root, path = %path.display(), "Acquired root lock");
        Ok(Self {
            file,
            path,
            root: root.to_string(),
        })
    }

    /// Holder of a lock file, if one was ever written
    pub fn holder(data_dir: &Path, root: &str) -> Option<LockInfo> {
        let content = fs::read_to_string(Self::lock_path(data_dir, root)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Whether another process currently holds the lock
    pub fn is_held(data_dir: &Path, root: &str) -> bool {
        let path = Self::lock_path(data_dir, root);
        let Ok(file) = OpenOptions::new().read(true).write(true).open(&path) else {
            return false;
        };
        match file.try_lock_exclusive() {
            Ok(()) => {
                let _ = FileExt::unlock(&file);
                false
            }
            Err(_) => true,
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }
}

impl Drop for RootLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), error = %e, "Failed to release root lock");
        } else {
            debug!(root = %self.root, "Released root lock");
        }
    }
}
