//! Durable log of platform mutations applied by an in-flight run
//!
//! Every successful create, update or archive is appended here before the
//! publisher moves on. A run that dies before committing leaves its entries
//! behind; the next run folds them into the loaded records so pages it
//! already created are recognized as owned instead of unowned.

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::database::SharedDatabase;
use crate::reconcile::{RecordMap, RemotePageRecord};
use crate::types::{PageKey, Result, SyncError};

/// Mutation kind as stored in the journal
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JournalOp {
    Create,
    Update,
    Archive,
}

impl JournalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Archive => "archive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "archive" => Some(Self::Archive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalEntry {
    pub plan_id: String,
    pub page_key: PageKey,
    pub operation: JournalOp,
    pub remote_id: String,
    pub parent_key: Option<PageKey>,
    pub title: String,
    pub content_hash: String,
    pub applied_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Apply this mutation to the record map as if the run had committed
    pub fn apply(&self, records: &mut RecordMap) {
        match self.operation {
            JournalOp::Create | JournalOp::Update => {
                records.insert(
                    self.page_key.clone(),
                    RemotePageRecord {
                        page_key: self.page_key.clone(),
                        remote_id: self.remote_id.clone(),
                        parent_key: self.parent_key.clone(),
                        title: self.title.clone(),
                        last_published_hash: self.content_hash.clone(),
                        last_published_at: self.applied_at,
                        manual_edit_flag: false,
                        archived_at: None,
                    },
                );
            }
            JournalOp::Archive => {
                if let Some(record) = records.get_mut(&self.page_key) {
                    record.archived_at = Some(self.applied_at);
                } else {
                    warn!(page_key = %self.page_key, "Journaled archive for unknown record");
                }
            }
        }
    }
}

/// Journal scoped to one documentation root
#[derive(Clone)]
pub struct PublishJournal {
    db: SharedDatabase,
    root: String,
}

impl PublishJournal {
    pub fn new(db: SharedDatabase, root: impl Into<String>) -> Self {
        Self {
            db,
            root: root.into(),
        }
    }

    /// Append one applied mutation. Re-recording the same page in the
    /// same plan overwrites the earlier entry.
    pub fn record(&self, entry: &JournalEntry) -> Result<()> {
        self.db.execute(
            "INSERT OR REPLACE INTO publish_journal
             (root, plan_id, page_key, operation, remote_id, parent_key, title, content_hash, applied_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            &[
                &self.root,
                &entry.plan_id,
                &entry.page_key.as_str(),
                &entry.operation.as_str(),
                &entry.remote_id,
                &entry.parent_key.as_ref().map(|k| k.as_str()),
                &entry.title,
                &entry.content_hash,
                &entry.applied_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Pending entries in application order
    pub fn entries(&self) -> Result<Vec<JournalEntry>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(
            "SELECT plan_id, page_key, operation, remote_id, parent_key, title, content_hash, applied_at
             FROM publish_journal WHERE root = ?1 ORDER BY applied_at, page_key",
        )?;
        let rows = stmt
            .query_map(params![self.root], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                    row.get::<_, String>(7)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut entries = Vec::with_capacity(rows.len());
        for (plan_id, key, op, remote_id, parent, title, hash, applied_at) in rows {
            let operation = JournalOp::parse(&op).ok_or_else(|| {
                SyncError::corruption(format!("journal entry '{}' has operation '{}'", key, op))
            })?;
            let remote_id = remote_id.filter(|id| !id.is_empty()).ok_or_else(|| {
                SyncError::corruption(format!("journal entry '{}' has no remote id", key))
            })?;
            let applied_at = DateTime::parse_from_rfc3339(&applied_at)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| {
                    SyncError::corruption(format!("journal entry '{}' timestamp: {}", key, e))
                })?;
            entries.push(JournalEntry {
                plan_id,
                page_key: PageKey::from(key),
                operation,
                remote_id,
                parent_key: parent.map(PageKey::from),
                title: title.unwrap_or_default(),
                content_hash: hash.unwrap_or_default(),
                applied_at,
            });
        }
        Ok(entries)
    }

    pub fn is_empty(&self) -> Result<bool> {
        let conn = self.db.connection()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM publish_journal WHERE root = ?1",
            params![self.root],
            |row| row.get(0),
        )?;
        Ok(count == 0)
    }

    /// Fold pending entries into `records`. Returns how many were applied.
    pub fn recover(&self, records: &mut RecordMap) -> Result<usize> {
        let entries = self.entries()?;
        for entry in &entries {
            entry.apply(records);
        }
        if !entries.is_empty() {
            info!(
                root = %self.root,
                entries = entries.len(),
                "Recovered mutations from an interrupted run"
            );
        }
        Ok(entries.len())
    }

    pub fn clear(&self) -> Result<usize> {
        self.db.execute(
            "DELETE FROM publish_journal WHERE root = ?1",
            &[&self.root],
        )
    }
}
