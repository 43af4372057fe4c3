//! Persisted run reports, newest first

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use serde::{Serialize, de::DeserializeOwned};
use uuid::Uuid;

use super::database::SharedDatabase;
use crate::types::Result;

#[derive(Clone)]
pub struct RunHistory {
    db: SharedDatabase,
}

impl RunHistory {
    pub fn new(db: SharedDatabase) -> Self {
        Self { db }
    }

    /// Store a finished run's report. Returns the generated run id.
    pub fn save<T: Serialize>(
        &self,
        root: &str,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        report: &T,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let json = serde_json::to_string(report)?;
        self.db.execute(
            "INSERT INTO run_history (id, root, started_at, finished_at, report_json)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            &[
                &id,
                &root,
                &started_at.to_rfc3339(),
                &finished_at.to_rfc3339(),
                &json,
            ],
        )?;
        Ok(id)
    }

    pub fn latest<T: DeserializeOwned>(&self, root: &str) -> Result<Option<T>> {
        let conn = self.db.connection()?;
        let json: Option<String> = conn
            .query_row(
                "SELECT report_json FROM run_history WHERE root = ?1
                 ORDER BY finished_at DESC LIMIT 1",
                params![root],
                |row| row.get(0),
            )
            .optional()?;
        json.map(|j| serde_json::from_str(&j))
            .transpose()
            .map_err(Into::into)
    }

    /// Up to `limit` most recent reports for `root`
    pub fn recent<T: DeserializeOwned>(&self, root: &str, limit: usize) -> Result<Vec<T>> {
        let conn = self.db.connection()?;
        let mut stmt = conn.prepare(
            "SELECT report_json FROM run_history WHERE root = ?1
             ORDER BY finished_at DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![root, limit as i64], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.iter()
            .map(|j| serde_json::from_str(j).map_err(Into::into))
            .collect()
    }

    /// Drop all but the newest `keep` reports per root
    pub fn prune(&self, keep: usize) -> Result<usize> {
        self.db.execute(
            "DELETE FROM run_history WHERE id IN (
                SELECT id FROM (
                    SELECT id, ROW_NUMBER() OVER (PARTITION BY root ORDER BY finished_at DESC) AS rn
                    FROM run_history
                ) WHERE rn > ?1
             )",
            &[&(keep as i64)],
        )
    }
}
