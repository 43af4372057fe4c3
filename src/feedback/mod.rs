//! Feedback channel
//!
//! Readers submit `(page_key, correction)` tuples. They are persisted in the
//! state database, forwarded to the configured sink, and marked forwarded.
//! Nothing here interprets the corrections.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::storage::SharedDatabase;
use crate::types::{PageKey, Result, SyncError};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feedback {
    pub id: String,
    pub page_key: PageKey,
    pub correction: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forwarded_at: Option<DateTime<Utc>>,
}

/// Destination for accepted feedback
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    fn name(&self) -> &str;

    async fn forward(&self, items: &[Feedback]) -> Result<()>;
}

/// Appends one JSON object per line
#[derive(Debug, Clone)]
pub struct JsonlFeedbackSink {
    path: PathBuf,
}

impl JsonlFeedbackSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FeedbackSink for JsonlFeedbackSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn forward(&self, items: &[Feedback]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut lines = String::new();
        for item in items {
            lines.push_str(&serde_json::to_string(item)?);
            lines.push('\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(lines.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Persisted feedback awaiting or past forwarding
#[derive(Clone)]
pub struct FeedbackQueue {
    db: SharedDatabase,
}

impl FeedbackQueue {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    pub fn submit(&self, page_key: PageKey, correction: &str) -> Result<Feedback> {
        let correction = correction.trim();
        if page_key.as_str().trim().is_empty() {
            return Err(SyncError::Config("feedback needs a page key".to_string()));
        }
        if correction.is_empty() {
            return Err(SyncError::Config("feedback correction is empty".to_string()));
        }

        let feedback = Feedback {
            id: Uuid::new_v4().to_string(),
            page_key,
            correction: correction.to_string(),
            created_at: Utc::now(),
            forwarded_at: None,
        };
        self.db.execute(
            "INSERT INTO feedback (id, page_key, correction, created_at) VALUES (?1, ?2, ?3, ?4)",
            &[
                &feedback.id,
                &feedback.page_key.as_str(),
                &feedback.correction,
                &feedback.created_at.to_rfc3339(),
            ],
        )?;
        debug!(page_key = %feedback.page_key, id = %feedback.id, "Feedback accepted");
        Ok(feedback)
    }

    /// Not yet forwarded, oldest first
    pub fn pending(&self) -> Result<Vec<Feedback>> {
        self.query(
            "SELECT id, page_key, correction, created_at, forwarded_at FROM feedback
             WHERE forwarded_at IS NULL ORDER BY created_at, id",
        )
    }

    pub fn all(&self) -> Result<Vec<Feedback>> {
        self.query(
            "SELECT id, page_key, correction, created_at, forwarded_at FROM feedback
             ORDER BY created_at, id",
        )
    }

    fn query(&self, sql: &str) -> Result<Vec<Feedback>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, key, correction, created, forwarded)| {
                Ok(Feedback {
                    id,
                    page_key: PageKey::from(key),
                    correction,
                    created_at: parse_time(&created)?,
                    forwarded_at: forwarded.as_deref().map(parse_time).transpose()?,
                })
            })
            .collect()
    }

    /// Send every pending item to `sink` and mark them forwarded.
    /// Returns the number forwarded.
    pub async fn forward(&self, sink: &dyn FeedbackSink) -> Result<usize> {
        let pending = self.pending()?;
        if pending.is_empty() {
            return Ok(0);
        }

        sink.forward(&pending).await?;

        let now = Utc::now().to_rfc3339();
        let ids: Vec<String> = pending.iter().map(|f| f.id.clone()).collect();
        self.db.transaction(move |conn| {
            let mut stmt = conn.prepare("UPDATE feedback SET forwarded_at = ?1 WHERE id = ?2")?;
            for id in &ids {
                stmt.execute(params![now, id])?;
            }
            Ok(())
        })?;

        info!(count = pending.len(), sink = sink.name(), "Forwarded feedback");
        Ok(pending.len())
    }
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SyncError::corruption(format!("bad feedback timestamp '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn queue() -> FeedbackQueue {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        FeedbackQueue::new(Arc::new(db))
    }

    #[test]
    fn test_submit_rejects_empty_correction() {
        let queue = queue();
        assert!(queue.submit("API/shop".into(), "   ").is_err());
        assert!(queue.submit("".into(), "typo").is_err());
        assert!(queue.pending().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_forward_appends_and_marks() {
        let dir = TempDir::new().unwrap();
        let sink = JsonlFeedbackSink::new(dir.path().join("out/feedback.jsonl"));
        let queue = queue();
        queue.submit("API/shop".into(), "Order::total includes tax").unwrap();
        queue.submit("Guide".into(), "broken link").unwrap();

        assert_eq!(queue.forward(&sink).await.unwrap(), 2);
        assert_eq!(queue.forward(&sink).await.unwrap(), 0);

        let content = std::fs::read_to_string(sink.path()).unwrap();
        let lines: Vec<Feedback> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert!(queue.pending().unwrap().is_empty());
        assert!(queue.all().unwrap().iter().all(|f| f.forwarded_at.is_some()));
    }

    /// Sink that always fails
    struct Unreachable;

    #[async_trait]
    impl FeedbackSink for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }

        async fn forward(&self, _items: &[Feedback]) -> Result<()> {
            Err(SyncError::Io(std::io::Error::other("sink down")))
        }
    }

    #[tokio::test]
    async fn test_failed_forward_keeps_items_pending() {
        let queue = queue();
        queue.submit("Guide".into(), "outdated").unwrap();

        assert!(queue.forward(&Unreachable).await.is_err());
        assert_eq!(queue.pending().unwrap().len(), 1);
    }
}
