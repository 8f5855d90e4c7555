// SPDX-License-Identifier: Apache-2.0 OR MIT

//! NAS client records: the identity of a trusted RADIUS peer.

use crate::db::Db;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NasClient {
    pub id: i64,
    pub identifier: String,
    pub ip_address: String,
    pub shared_secret: Vec<u8>,
    pub auth_port: u16,
    pub acct_port: u16,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn row_to_nas(row: &rusqlite::Row) -> rusqlite::Result<NasClient> {
    Ok(NasClient {
        id: row.get(0)?,
        identifier: row.get(1)?,
        ip_address: row.get(2)?,
        shared_secret: row.get(3)?,
        auth_port: row.get::<_, i64>(4)? as u16,
        acct_port: row.get::<_, i64>(5)? as u16,
        is_active: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

const SELECT_COLUMNS: &str = "id, identifier, ip_address, shared_secret, auth_port, acct_port, is_active, created_at, updated_at";

/// SQL-backed repository for NAS clients. Carries no caching of its own;
/// the NAS Registry's TTL cache layers on top of this in the server crate.
pub struct NasRepository<'a> {
    db: &'a Db,
}

impl<'a> NasRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    /// Strict lookup by both IP and NAS-Identifier, active records only.
    pub fn find_by_ip_and_identifier(
        &self,
        ip_address: &str,
        identifier: &str,
    ) -> Result<Option<NasClient>, StoreError> {
        let conn = self.db.lock();
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM nas_clients
             WHERE ip_address = ?1 AND identifier = ?2 AND is_active = 1"
        );
        conn.query_row(&query, params![ip_address, identifier], row_to_nas)
            .optional()
            .map_err(StoreError::from)
    }

    /// First active record for an IP, used when no NAS-Identifier was sent.
    pub fn find_first_active_by_ip(&self, ip_address: &str) -> Result<Option<NasClient>, StoreError> {
        let conn = self.db.lock();
        let query = format!(
            "SELECT {SELECT_COLUMNS} FROM nas_clients
             WHERE ip_address = ?1 AND is_active = 1
             ORDER BY id ASC LIMIT 1"
        );
        conn.query_row(&query, params![ip_address], row_to_nas)
            .optional()
            .map_err(StoreError::from)
    }

    pub fn create(
        &self,
        identifier: &str,
        ip_address: &str,
        shared_secret: &[u8],
        auth_port: u16,
        acct_port: u16,
    ) -> Result<NasClient, StoreError> {
        let conn = self.db.lock();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO nas_clients
             (identifier, ip_address, shared_secret, auth_port, acct_port, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)",
            params![identifier, ip_address, shared_secret, auth_port, acct_port, now],
        )?;
        let id = conn.last_insert_rowid();
        Ok(NasClient {
            id,
            identifier: identifier.to_string(),
            ip_address: ip_address.to_string(),
            shared_secret: shared_secret.to_vec(),
            auth_port,
            acct_port,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn set_active(&self, id: i64, is_active: bool) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute(
            "UPDATE nas_clients SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![is_active as i64, Utc::now(), id],
        )?;
        Ok(())
    }

    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute("DELETE FROM nas_clients WHERE id = ?1", params![id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_identifier_mismatch_returns_none() {
        let db = Db::open_in_memory().unwrap();
        let repo = NasRepository::new(&db);
        repo.create("nas-1", "10.0.0.5", b"secret", 1812, 1813).unwrap();

        assert!(repo
            .find_by_ip_and_identifier("10.0.0.5", "nas-2")
            .unwrap()
            .is_none());
        assert!(repo
            .find_by_ip_and_identifier("10.0.0.5", "nas-1")
            .unwrap()
            .is_some());
    }

    #[test]
    fn inactive_records_are_not_returned() {
        let db = Db::open_in_memory().unwrap();
        let repo = NasRepository::new(&db);
        let created = repo.create("nas-1", "10.0.0.5", b"secret", 1812, 1813).unwrap();
        repo.set_active(created.id, false).unwrap();

        assert!(repo.find_first_active_by_ip("10.0.0.5").unwrap().is_none());
    }
}
