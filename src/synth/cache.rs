//! Block cache keyed by generation fingerprint
//!
//! Two levels: a `DashMap` for blocks seen during this run and the
//! `content_cache` table for blocks from earlier runs. The cache is
//! disposable; rows that fail to decode count as misses and are dropped.

use chrono::{Duration, Utc};
use dashmap::DashMap;
use rusqlite::{OptionalExtension, params};
use tracing::{debug, warn};

use crate::model::ContentBlock;
use crate::storage::SharedDatabase;
use crate::types::Result;

pub struct BlockCache {
    memory: DashMap<String, ContentBlock>,
    db: Option<SharedDatabase>,
}

impl BlockCache {
    pub fn new(db: SharedDatabase) -> Self {
        Self {
            memory: DashMap::new(),
            db: Some(db),
        }
    }

    /// Cache without persistence (plan previews, tests)
    pub fn in_memory() -> Self {
        Self {
            memory: DashMap::new(),
            db: None,
        }
    }

    pub fn get(&self, fingerprint: &str) -> Result<Option<ContentBlock>> {
        if let Some(block) = self.memory.get(fingerprint) {
            return Ok(Some(block.clone()));
        }
        let Some(db) = &self.db else {
            return Ok(None);
        };

        let row: Option<String> = db
            .connection()?
            .query_row(
                "SELECT block_json FROM content_cache WHERE generation_fingerprint = ?1",
                params![fingerprint],
                |row| row.get(0),
            )
            .optional()?;

        let Some(json) = row else {
            return Ok(None);
        };

        match serde_json::from_str::<ContentBlock>(&json) {
            Ok(block) if block.generation_fingerprint == fingerprint => {
                self.memory.insert(fingerprint.to_string(), block.clone());
                Ok(Some(block))
            }
            Ok(_) | Err(_) => {
                warn!(fingerprint, "Dropping undecodable cache entry");
                db.execute(
                    "DELETE FROM content_cache WHERE generation_fingerprint = ?1",
                    &[&fingerprint],
                )?;
                Ok(None)
            }
        }
    }

    pub fn put(&self, group_key: &str, block: &ContentBlock) -> Result<()> {
        let fingerprint = block.generation_fingerprint.clone();
        if let Some(db) = &self.db {
            let json = serde_json::to_string(block)?;
            db.execute(
                "INSERT OR REPLACE INTO content_cache
                 (generation_fingerprint, doc_type, group_key, block_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                &[
                    &fingerprint,
                    &block.doc_type.as_str(),
                    &group_key,
                    &json,
                    &Utc::now().to_rfc3339(),
                ],
            )?;
        }
        self.memory.insert(fingerprint, block.clone());
        Ok(())
    }

    /// Delete persisted blocks older than `days`. Returns rows removed.
    pub fn prune(&self, days: i64) -> Result<usize> {
        let Some(db) = &self.db else {
            return Ok(0);
        };
        let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339();
        let removed = db.execute(
            "DELETE FROM content_cache WHERE created_at < ?1",
            &[&cutoff],
        )?;
        debug!(removed, days, "Pruned block cache");
        Ok(removed)
    }

    pub fn clear(&self) -> Result<usize> {
        self.memory.clear();
        match &self.db {
            Some(db) => db.execute("DELETE FROM content_cache", &[]),
            None => Ok(0),
        }
    }

    /// Persisted entries (memory entries when not persisted)
    pub fn len(&self) -> Result<usize> {
        match &self.db {
            Some(db) => {
                let count: i64 = db.connection()?.query_row(
                    "SELECT COUNT(*) FROM content_cache",
                    [],
                    |row| row.get(0),
                )?;
                Ok(count as usize)
            }
            None => Ok(self.memory.len()),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocType;
    use crate::storage::Database;
    use crate::types::EntityId;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn block(fingerprint: &str) -> ContentBlock {
        ContentBlock {
            source_entity_ids: BTreeSet::from([EntityId::from("class:shop::Order")]),
            doc_type: DocType::ApiReference,
            body: "# Order\n".into(),
            generation_fingerprint: fingerprint.into(),
        }
    }

    fn db() -> SharedDatabase {
        let db = Database::open_in_memory().unwrap();
        db.initialize().unwrap();
        Arc::new(db)
    }

    #[test]
    fn test_persisted_blocks_survive_new_cache() {
        let db = db();
        BlockCache::new(db.clone()).put("shop", &block("fp1")).unwrap();

        let fresh = BlockCache::new(db);
        assert_eq!(fresh.get("fp1").unwrap(), Some(block("fp1")));
        assert!(fresh.get("fp2").unwrap().is_none());
        assert_eq!(fresh.len().unwrap(), 1);
    }

    #[test]
    fn test_corrupt_row_is_a_miss() {
        let db = db();
        db.execute(
            "INSERT INTO content_cache VALUES ('bad', 'diagram', 'g', '{not json', '2026-01-01T00:00:00Z')",
            &[],
        )
        .unwrap();

        let cache = BlockCache::new(db);
        assert!(cache.get("bad").unwrap().is_none());
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn test_prune_drops_old_rows_only() {
        let db = db();
        let cache = BlockCache::new(db.clone());
        cache.put("shop", &block("fresh")).unwrap();
        db.execute(
            "INSERT INTO content_cache VALUES ('old', 'diagram', 'g', '{}', '2000-01-01T00:00:00+00:00')",
            &[],
        )
        .unwrap();

        assert_eq!(cache.prune(30).unwrap(), 1);
        assert_eq!(cache.len().unwrap(), 1);
        assert_eq!(cache.clear().unwrap(), 1);
    }

    #[test]
    fn test_in_memory_cache() {
        let cache = BlockCache::in_memory();
        cache.put("shop", &block("fp")).unwrap();
        assert!(cache.get("fp").unwrap().is_some());
        assert_eq!(cache.prune(0).unwrap(), 0);
    }
}
