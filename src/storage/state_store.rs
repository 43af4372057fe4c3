//! Versioned fingerprint and remote-record store
//!
//! State is read once at run start into an explicit [`StateSnapshot`] and
//! written back once at run end. Nothing in the pipeline reads the tables
//! in between, so every stage works on the frozen snapshot.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use std::collections::BTreeMap;
use tracing::{debug, info};

use super::database::SharedDatabase;
use crate::detect::{FingerprintEntry, FingerprintMap};
use crate::model::EntityKind;
use crate::reconcile::{RecordMap, RemotePageRecord};
use crate::types::{EntityId, PageKey, Result, SyncError};

/// Everything persisted for one documentation root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    pub root: String,
    /// Version the snapshot was loaded at; commit succeeds only if unchanged
    pub version: u64,
    pub fingerprints: FingerprintMap,
    pub records: RecordMap,
}

impl StateSnapshot {
    pub fn empty(root: &str) -> Self {
        Self {
            root: root.to_string(),
            ..Self::default()
        }
    }
}

pub struct StateStore {
    db: SharedDatabase,
}

type FingerprintRow = (String, String, String, String, String);
type RecordRow = (
    String,
    String,
    Option<String>,
    String,
    String,
    String,
    i64,
    Option<String>,
);

impl StateStore {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Load the committed state for `root`.
    ///
    /// Any row that cannot be decoded is reported as `StateCorruption`;
    /// the state is never silently reset.
    pub fn load(&self, root: &str) -> Result<StateSnapshot> {
        let conn = self.db.connection()?;

        let version: u64 = conn
            .query_row(
                "SELECT version FROM state_meta WHERE root = ?1",
                params![root],
                |row| row.get::<_, i64>(0),
            )
            .optional()?
            .map(|v| v as u64)
            .unwrap_or(0);

        let mut stmt = conn.prepare(
            "SELECT entity_id, kind, qualified_name, content_fingerprint, relationship_fingerprint
             FROM entity_fingerprints WHERE root = ?1 ORDER BY entity_id",
        )?;
        let rows: Vec<FingerprintRow> = stmt
            .query_map(params![root], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
            })?
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| SyncError::corruption(format!("entity_fingerprints row: {}", e)))?;

        let mut fingerprints = BTreeMap::new();
        for (id, kind, qualified_name, content, relationships) in rows {
            let kind = EntityKind::parse(&kind).ok_or_else(|| {
                SyncError::corruption(format!("entity '{}' has unknown kind '{}'", id, kind))
            })?;
            if content.is_empty() || relationships.is_empty() {
                return Err(SyncError::corruption(format!(
                    "entity '{}' has an empty fingerprint",
                    id
                )));
            }
            fingerprints.insert(
                EntityId::from(id),
                FingerprintEntry {
                    kind,
                    qualified_name,
                    content_fingerprint: content,
                    relationship_fingerprint: relationships,
                },
            );
        }

        let mut stmt = conn.prepare(
            "SELECT page_key, remote_id, parent_key, title, last_published_hash,
                    last_published_at, manual_edit_flag, archived_at
             FROM remote_records WHERE root = ?1 ORDER BY page_key",
        )?;
        let rows: Vec<RecordRow> = stmt
            .query_map(params![root], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| SyncError::corruption(format!("remote_records row: {}", e)))?;

        let mut records = BTreeMap::new();
        for (key, remote_id, parent, title, hash, published_at, manual, archived_at) in rows {
            if remote_id.is_empty() || hash.is_empty() {
                return Err(SyncError::corruption(format!(
                    "record '{}' is missing its remote id or hash",
                    key
                )));
            }
            let record = RemotePageRecord {
                page_key: PageKey::from(key.as_str()),
                remote_id,
                parent_key: parent.map(PageKey::from),
                title,
                last_published_hash: hash,
                last_published_at: parse_time(&key, &published_at)?,
                manual_edit_flag: manual != 0,
                archived_at: archived_at.map(|t| parse_time(&key, &t)).transpose()?,
            };
            records.insert(record.page_key.clone(), record);
        }

        debug!(
            root,
            version,
            fingerprints = fingerprints.len(),
            records = records.len(),
            "Loaded state"
        );

        Ok(StateSnapshot {
            root: root.to_string(),
            version,
            fingerprints,
            records,
        })
    }

    /// Atomically replace the root's state with `snapshot`.
    ///
    /// Fails without writing anything if another commit happened since the
    /// snapshot was loaded. Also clears the root's publish journal, whose
    /// entries are folded into `snapshot.records` by then. Returns the new
    /// version.
    pub fn commit(&self, snapshot: &StateSnapshot) -> Result<u64> {
        let snapshot = snapshot.clone();
        let new_version = self.db.transaction(move |conn| {
            let stored: u64 = conn
                .query_row(
                    "SELECT version FROM state_meta WHERE root = ?1",
                    params![snapshot.root],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?
                .map(|v| v as u64)
                .unwrap_or(0);

            if stored != snapshot.version {
                return Err(SyncError::Storage(format!(
                    "state for '{}' changed since it was loaded (stored version {}, loaded {})",
                    snapshot.root, stored, snapshot.version
                )));
            }

            conn.execute(
                "DELETE FROM entity_fingerprints WHERE root = ?1",
                params![snapshot.root],
            )?;
            conn.execute(
                "DELETE FROM remote_records WHERE root = ?1",
                params![snapshot.root],
            )?;
            conn.execute(
                "DELETE FROM publish_journal WHERE root = ?1",
                params![snapshot.root],
            )?;

            {
                let mut stmt = conn.prepare(
                    "INSERT INTO entity_fingerprints
                     (root, entity_id, kind, qualified_name, content_fingerprint, relationship_fingerprint)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                )?;
                for (id, entry) in &snapshot.fingerprints {
                    stmt.execute(params![
                        snapshot.root,
                        id.as_str(),
                        entry.kind.as_str(),
                        entry.qualified_name,
                        entry.content_fingerprint,
                        entry.relationship_fingerprint,
                    ])?;
                }
            }

            {
                let mut stmt = conn.prepare(
                    "INSERT INTO remote_records
                     (root, page_key, remote_id, parent_key, title, last_published_hash,
                      last_published_at, manual_edit_flag, archived_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                )?;
                for record in snapshot.records.values() {
                    stmt.execute(params![
                        snapshot.root,
                        record.page_key.as_str(),
                        record.remote_id,
                        record.parent_key.as_ref().map(|k| k.as_str()),
                        record.title,
                        record.last_published_hash,
                        record.last_published_at.to_rfc3339(),
                        record.manual_edit_flag as i64,
                        record.archived_at.map(|t| t.to_rfc3339()),
                    ])?;
                }
            }

            let new_version = snapshot.version + 1;
            conn.execute(
                "INSERT INTO state_meta (root, version, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(root) DO UPDATE SET version = excluded.version,
                                                 updated_at = excluded.updated_at",
                params![snapshot.root, new_version as i64, Utc::now().to_rfc3339()],
            )?;

            Ok(new_version)
        })?;

        info!(version = new_version, "Committed state");
        Ok(new_version)
    }

    /// Roots with committed state
    pub fn roots(&self) -> Result<Vec<(String, u64, String)>> {
        let conn = self.db.connection()?;
        let mut stmt =
            conn.prepare("SELECT root, version, updated_at FROM state_meta ORDER BY root")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get::<_, i64>(1)? as u64, row.get(2)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

fn parse_time(key: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            SyncError::corruption(format!("record '{}' has invalid timestamp '{}': {}", key, value, e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Database;
    use std::sync::Arc;

    fn store() -> StateStore {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        StateStore::new(Arc::new(db))
    }

    fn record(key: &str) -> RemotePageRecord {
        RemotePageRecord {
            page_key: PageKey::from(key),
            remote_id: format!("id-{}", key),
            parent_key: PageKey::from(key).parent(),
            title: key.to_string(),
            last_published_hash: "hash".into(),
            last_published_at: Utc::now(),
            manual_edit_flag: false,
            archived_at: None,
        }
    }

    fn snapshot(root: &str, version: u64) -> StateSnapshot {
        let mut s = StateSnapshot::empty(root);
        s.version = version;
        s.fingerprints.insert(
            EntityId::from("class:A"),
            FingerprintEntry {
                kind: EntityKind::Class,
                qualified_name: "A".into(),
                content_fingerprint: "c".into(),
                relationship_fingerprint: "r".into(),
            },
        );
        for key in ["API", "API/Orders"] {
            s.records.insert(PageKey::from(key), record(key));
        }
        s
    }

    #[test]
    fn test_empty_root_loads_version_zero() {
        let loaded = store().load("docs").unwrap();
        assert_eq!(loaded.version, 0);
        assert!(loaded.records.is_empty());
    }

    #[test]
    fn test_commit_then_load() {
        let store = store();
        let version = store.commit(&snapshot("docs", 0)).unwrap();
        assert_eq!(version, 1);

        let loaded = store.load("docs").unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.fingerprints.len(), 1);
        let orders = &loaded.records[&PageKey::from("API/Orders")];
        assert_eq!(orders.parent_key, Some(PageKey::from("API")));
        assert_eq!(orders.remote_id, "id-API/Orders");
    }

    #[test]
    fn test_stale_commit_is_rejected_without_writing() {
        let store = store();
        store.commit(&snapshot("docs", 0)).unwrap();

        let mut stale = snapshot("docs", 0);
        stale.records.clear();
        assert!(store.commit(&stale).is_err());

        assert_eq!(store.load("docs").unwrap().records.len(), 2);
    }

    #[test]
    fn test_roots_are_isolated() {
        let store = store();
        store.commit(&snapshot("docs", 0)).unwrap();
        assert!(store.load("handbook").unwrap().records.is_empty());
        assert_eq!(store.roots().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_row_is_fatal() {
        let store = store();
        store.commit(&snapshot("docs", 0)).unwrap();
        store
            .db
            .execute(
                "UPDATE remote_records SET last_published_at = 'yesterday' WHERE page_key = 'API'",
                &[],
            )
            .unwrap();

        let err = store.load("docs").unwrap_err();
        assert!(matches!(err, SyncError::StateCorruption(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_unknown_kind_is_corruption() {
        let store = store();
        store.commit(&snapshot("docs", 0)).unwrap();
        store
            .db
            .execute("UPDATE entity_fingerprints SET kind = 'gizmo'", &[])
            .unwrap();

        assert!(matches!(
            store.load("docs").unwrap_err(),
            SyncError::StateCorruption(_)
        ));
    }
}
