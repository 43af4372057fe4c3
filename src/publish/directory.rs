//! File-backed platform
//!
//! Layout under the documentation root directory:
//!
//! ```text
//! <root>/
//!   index.json        # remote ids, keys, parents, titles, archive flags
//!   API.md            # one markdown file per page, path from the page key
//!   API/shop.md
//! ```
//!
//! Editing a markdown file by hand is a manual edit: the next snapshot
//! returns the edited body and reconciliation reports a conflict.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::platform::{PageWrite, RemotePlatform};
use crate::reconcile::{LivePage, LiveRemoteSnapshot};
use crate::types::{ErrorCategory, ExternalError, PageKey, Result, SyncError, key_segment};

const INDEX_FILE: &str = "index.json";
const SOURCE: &str = "directory platform";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct IndexEntry {
    remote_id: String,
    page_key: PageKey,
    #[serde(default)]
    parent_id: Option<String>,
    title: String,
    /// Markdown file relative to the root directory
    file: String,
    #[serde(default)]
    archived: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Index {
    pages: Vec<IndexEntry>,
}

impl Index {
    fn by_id(&mut self, remote_id: &str) -> Result<&mut IndexEntry> {
        self.pages
            .iter_mut()
            .find(|p| p.remote_id == remote_id)
            .ok_or_else(|| {
                ExternalError::with_source(
                    ErrorCategory::NotFound,
                    format!("no page with id {}", remote_id),
                    SOURCE,
                )
                .into()
            })
    }
}

pub struct DirectoryPlatform {
    root: PathBuf,
    index: Mutex<Index>,
}

impl DirectoryPlatform {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let index_path = root.join(INDEX_FILE);
        let index = if index_path.exists() {
            let content = std::fs::read_to_string(&index_path)?;
            serde_json::from_str(&content).map_err(|e| SyncError::Parse {
                message: e.to_string(),
                path: index_path.display().to_string(),
            })?
        } else {
            Index::default()
        };

        Ok(Self {
            root,
            index: Mutex::new(index),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn file_for(index: &Index, key: &PageKey, remote_id: &str) -> String {
        let segments: Vec<String> = key
            .as_str()
            .split(PageKey::SEPARATOR)
            .map(|s| {
                let segment = key_segment(s);
                if segment.is_empty() { "_".to_string() } else { segment }
            })
            .collect();
        let file = format!("{}.md", segments.join("/"));
        if index.pages.iter().any(|p| p.file == file) {
            format!("{}-{}.md", segments.join("/"), &remote_id[..8.min(remote_id.len())])
        } else {
            file
        }
    }

    async fn write_body(&self, file: &str, body: &str) -> Result<()> {
        let path = self.root.join(file);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        Ok(())
    }

    async fn save(&self, index: &Index) -> Result<()> {
        let json = serde_json::to_string_pretty(index)?;
        let tmp = self.root.join(format!("{}.tmp", INDEX_FILE));
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, self.root.join(INDEX_FILE)).await?;
        Ok(())
    }
}

#[async_trait]
impl RemotePlatform for DirectoryPlatform {
    fn name(&self) -> &str {
        "directory"
    }

    async fn snapshot(&self) -> Result<LiveRemoteSnapshot> {
        let index = self.index.lock().await;
        let mut pages = Vec::with_capacity(index.pages.len());
        for entry in &index.pages {
            // A missing file is reported as a page without a body
            let body = tokio::fs::read_to_string(self.root.join(&entry.file)).await.ok();
            pages.push(LivePage {
                remote_id: entry.remote_id.clone(),
                page_key: Some(entry.page_key.clone()),
                title: Some(entry.title.clone()),
                body,
                archived: entry.archived,
            });
        }
        Ok(LiveRemoteSnapshot::new(pages))
    }

    async fn create(&self, parent_remote_id: Option<&str>, page: &PageWrite) -> Result<String> {
        let mut index = self.index.lock().await;

        if let Some(existing) = index
            .pages
            .iter_mut()
            .find(|p| p.page_key == page.page_key)
        {
            existing.title = page.title.clone();
            existing.parent_id = parent_remote_id.map(str::to_string);
            existing.archived = false;
            let (remote_id, file) = (existing.remote_id.clone(), existing.file.clone());
            self.write_body(&file, &page.body).await?;
            self.save(&index).await?;
            debug!(page_key = %page.page_key, remote_id = %remote_id, "Create matched existing page");
            return Ok(remote_id);
        }

        let remote_id = Uuid::new_v4().to_string();
        let file = Self::file_for(&index, &page.page_key, &remote_id);
        self.write_body(&file, &page.body).await?;
        index.pages.push(IndexEntry {
            remote_id: remote_id.clone(),
            page_key: page.page_key.clone(),
            parent_id: parent_remote_id.map(str::to_string),
            title: page.title.clone(),
            file,
            archived: false,
        });
        self.save(&index).await?;
        Ok(remote_id)
    }

    async fn update(&self, remote_id: &str, page: &PageWrite) -> Result<()> {
        let mut index = self.index.lock().await;
        let entry = index.by_id(remote_id)?;
        entry.title = page.title.clone();
        entry.archived = false;
        let file = entry.file.clone();
        self.write_body(&file, &page.body).await?;
        self.save(&index).await
    }

    async fn archive(&self, remote_id: &str) -> Result<()> {
        let mut index = self.index.lock().await;
        index.by_id(remote_id)?.archived = true;
        self.save(&index).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(key: &str, body: &str) -> PageWrite {
        PageWrite {
            page_key: PageKey::from(key),
            title: key.to_string(),
            body: body.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_update_archive_roundtrip_through_disk() {
        let dir = TempDir::new().unwrap();
        let platform = DirectoryPlatform::open(dir.path()).unwrap();

        let parent = platform.create(None, &write("API", "# API\n")).await.unwrap();
        let child = platform
            .create(Some(&parent), &write("API/shop", "# shop\n"))
            .await
            .unwrap();
        platform.update(&child, &write("API/shop", "# shop v2\n")).await.unwrap();
        platform.archive(&parent).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("API/shop.md")).unwrap(),
            "# shop v2\n"
        );

        let reopened = DirectoryPlatform::open(dir.path()).unwrap();
        let snapshot = reopened.snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.get(&parent).unwrap().archived);
        assert_eq!(
            snapshot.get(&child).unwrap().body.as_deref(),
            Some("# shop v2\n")
        );
    }

    #[tokio::test]
    async fn test_create_is_upsert_by_key() {
        let dir = TempDir::new().unwrap();
        let platform = DirectoryPlatform::open(dir.path()).unwrap();

        let first = platform.create(None, &write("Guide", "a")).await.unwrap();
        let second = platform.create(None, &write("Guide", "b")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(platform.snapshot().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_yields_malformed_page() {
        let dir = TempDir::new().unwrap();
        let platform = DirectoryPlatform::open(dir.path()).unwrap();
        let id = platform.create(None, &write("Guide", "a")).await.unwrap();
        std::fs::remove_file(dir.path().join("Guide.md")).unwrap();

        let snapshot = platform.snapshot().await.unwrap();
        assert!(snapshot.get(&id).unwrap().content_hash().is_none());
    }

    #[tokio::test]
    async fn test_unknown_id_is_not_found() {
        let dir = TempDir::new().unwrap();
        let platform = DirectoryPlatform::open(dir.path()).unwrap();

        let err = platform.archive("missing").await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::External(ExternalError { category: ErrorCategory::NotFound, .. })
        ));
    }

    #[test]
    fn test_corrupt_index_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(INDEX_FILE), "{").unwrap();
        assert!(matches!(
            DirectoryPlatform::open(dir.path()),
            Err(SyncError::Parse { .. })
        ));
    }
}
