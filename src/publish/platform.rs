//! Remote platform seam
//!
//! The platform stores pages under a documentation root. Each page carries
//! the `page_key` it was published for, so the live snapshot can be matched
//! against records. `create` is an upsert on `page_key`: repeating a create
//! whose response was lost returns the existing page instead of a duplicate.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{PlatformConfig, PlatformKind};
use crate::reconcile::LiveRemoteSnapshot;
use crate::types::{PageKey, Result};

use super::directory::DirectoryPlatform;
use super::http::HttpPlatform;

/// Page content sent on create and update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWrite {
    pub page_key: PageKey,
    pub title: String,
    pub body: String,
}

#[async_trait]
pub trait RemotePlatform: Send + Sync {
    fn name(&self) -> &str;

    /// Every page under the documentation root, archived ones included
    async fn snapshot(&self) -> Result<LiveRemoteSnapshot>;

    /// Create (or upsert by key) a page. Returns its remote id.
    async fn create(&self, parent_remote_id: Option<&str>, page: &PageWrite) -> Result<String>;

    /// Replace title and body. Archived pages are restored.
    async fn update(&self, remote_id: &str, page: &PageWrite) -> Result<()>;

    /// Tag the page as archived. Content is kept.
    async fn archive(&self, remote_id: &str) -> Result<()>;
}

pub type SharedPlatform = Arc<dyn RemotePlatform>;

/// Build the platform selected by configuration. Relative directories
/// resolve against `project_root`.
pub fn create_platform(
    config: &PlatformConfig,
    project_root: &std::path::Path,
) -> Result<SharedPlatform> {
    match config.kind {
        PlatformKind::Directory => {
            let directory = if config.directory.is_absolute() {
                config.directory.clone()
            } else {
                project_root.join(&config.directory)
            };
            Ok(Arc::new(DirectoryPlatform::open(
                directory.join(&config.root_key),
            )?))
        }
        PlatformKind::Http => Ok(Arc::new(HttpPlatform::new(config)?)),
    }
}
