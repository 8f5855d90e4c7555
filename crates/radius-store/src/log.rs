// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Operational log entries, mirrored here from the `tracing` stream for
//! the out-of-core admin surface to read back.

use crate::db::Db;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::params;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub logger: String,
    pub message: String,
}

pub struct LogRepository<'a> {
    db: &'a Db,
}

impl<'a> LogRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    pub fn insert(&self, level: &str, logger: &str, message: &str) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO log_entries (timestamp, level, logger, message) VALUES (?1, ?2, ?3, ?4)",
            params![Utc::now(), level, logger, message],
        )?;
        Ok(())
    }

    pub fn count(&self) -> Result<i64, StoreError> {
        let conn = self.db.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM log_entries", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Keep only the most recent `keep_n` rows by insertion order: find the
    /// id at position `count - keep_n` from the start and delete everything
    /// at or below it.
    pub fn apply_retention(&self, keep_n: i64) -> Result<usize, StoreError> {
        let conn = self.db.lock();
        let total: i64 = conn.query_row("SELECT COUNT(*) FROM log_entries", [], |row| row.get(0))?;
        if total <= keep_n {
            return Ok(0);
        }
        let to_delete = total - keep_n;
        let threshold_id: i64 = conn.query_row(
            "SELECT id FROM log_entries ORDER BY id ASC LIMIT 1 OFFSET ?1",
            params![to_delete - 1],
            |row| row.get(0),
        )?;
        let deleted = conn.execute(
            "DELETE FROM log_entries WHERE id <= ?1",
            params![threshold_id],
        )?;
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retention_keeps_only_most_recent() {
        let db = Db::open_in_memory().unwrap();
        let repo = LogRepository::new(&db);
        for i in 0..10 {
            repo.insert("INFO", "radius", &format!("line {i}")).unwrap();
        }
        let deleted = repo.apply_retention(3).unwrap();
        assert_eq!(deleted, 7);
        assert_eq!(repo.count().unwrap(), 3);
    }

    #[test]
    fn retention_is_noop_under_limit() {
        let db = Db::open_in_memory().unwrap();
        let repo = LogRepository::new(&db);
        repo.insert("INFO", "radius", "line").unwrap();
        assert_eq!(repo.apply_retention(10).unwrap(), 0);
    }
}
