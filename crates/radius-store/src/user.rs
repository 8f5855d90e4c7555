// SPDX-License-Identifier: Apache-2.0 OR MIT

//! RADIUS user records: the authenticated principal and its traffic/session
//! accounting.

use crate::db::Db;
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

const CLEARTEXT_PREFIX: &str = "ctp:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserStatus {
    Disabled,
    Expired,
    OverQuota,
    Ok,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadiusUser {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub max_concurrent_sessions: i64,
    pub expiration_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub allowed_traffic: Option<i64>,
    pub rx_traffic: i64,
    pub tx_traffic: i64,
    pub total_traffic: i64,
    pub current_sessions: i64,
    pub remaining_sessions: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RadiusUser {
    /// Verify a candidate password against the stored hash. The `ctp:`
    /// prefix marks an intentionally cleartext-stored password (used for
    /// migrated accounts); everything else is a bcrypt digest.
    pub fn verify_password(&self, candidate: &str) -> bool {
        match self.password_hash.strip_prefix(CLEARTEXT_PREFIX) {
            Some(stored) => constant_time_eq(stored.as_bytes(), candidate.as_bytes()),
            None => bcrypt::verify(candidate, &self.password_hash).unwrap_or(false),
        }
    }

    /// Derived status label: first matching wins, Disabled > Expired >
    /// OverQuota > OK.
    pub fn status(&self) -> UserStatus {
        if !self.is_active {
            return UserStatus::Disabled;
        }
        if let Some(expiry) = self.expiration_date {
            if expiry <= Utc::now() {
                return UserStatus::Expired;
            }
        }
        if let Some(quota) = self.allowed_traffic {
            if self.total_traffic >= quota {
                return UserStatus::OverQuota;
            }
        }
        UserStatus::Ok
    }

    /// The full `can_authenticate` predicate: a boolean plus the reason
    /// string to surface in Reply-Message when denied.
    pub fn can_authenticate(&self) -> (bool, Option<&'static str>) {
        match self.status() {
            UserStatus::Disabled => (false, Some("Account is disabled")),
            UserStatus::Expired => (false, Some("Account has expired")),
            UserStatus::OverQuota => (false, Some("Traffic limit reached")),
            UserStatus::Ok => (true, None),
        }
    }
}

/// Constant-time comparison so a cleartext password check does not leak
/// timing information about where the mismatch occurred.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<RadiusUser> {
    Ok(RadiusUser {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        max_concurrent_sessions: row.get(3)?,
        expiration_date: row.get(4)?,
        is_active: row.get::<_, i64>(5)? != 0,
        allowed_traffic: row.get(6)?,
        rx_traffic: row.get(7)?,
        tx_traffic: row.get(8)?,
        total_traffic: row.get(9)?,
        current_sessions: row.get(10)?,
        remaining_sessions: row.get(11)?,
        notes: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
    })
}

const SELECT_COLUMNS: &str = "id, username, password_hash, max_concurrent_sessions, expiration_date, \
     is_active, allowed_traffic, rx_traffic, tx_traffic, total_traffic, current_sessions, \
     remaining_sessions, notes, created_at, updated_at";

pub struct UserRepository<'a> {
    db: &'a Db,
}

impl<'a> UserRepository<'a> {
    pub fn new(db: &'a Db) -> Self {
        Self { db }
    }

    pub fn find_by_username(&self, username: &str) -> Result<Option<RadiusUser>, StoreError> {
        let conn = self.db.lock();
        let query = format!("SELECT {SELECT_COLUMNS} FROM radius_users WHERE username = ?1");
        conn.query_row(&query, params![username], row_to_user)
            .optional()
            .map_err(StoreError::from)
    }

    pub fn create(
        &self,
        username: &str,
        password_hash: &str,
        max_concurrent_sessions: i64,
        allowed_traffic: Option<i64>,
    ) -> Result<RadiusUser, StoreError> {
        let conn = self.db.lock();
        let now = Utc::now();
        conn.execute(
            "INSERT INTO radius_users
             (username, password_hash, max_concurrent_sessions, is_active, allowed_traffic,
              rx_traffic, tx_traffic, total_traffic, current_sessions, remaining_sessions,
              created_at, updated_at)
             VALUES (?1, ?2, ?3, 1, ?4, 0, 0, 0, 0, ?3, ?5, ?5)",
            params![username, password_hash, max_concurrent_sessions, allowed_traffic, now],
        )?;
        let id = conn.last_insert_rowid();
        Ok(RadiusUser {
            id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            max_concurrent_sessions,
            expiration_date: None,
            is_active: true,
            allowed_traffic,
            rx_traffic: 0,
            tx_traffic: 0,
            total_traffic: 0,
            current_sessions: 0,
            remaining_sessions: max_concurrent_sessions,
            notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Add `delta_rx`/`delta_tx` to the stored counters via an atomic
    /// expression-based increment, safe against concurrent updates from
    /// other sessions of the same user.
    pub fn add_traffic(&self, username: &str, delta_rx: i64, delta_tx: i64) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute(
            "UPDATE radius_users
             SET rx_traffic = rx_traffic + ?1,
                 tx_traffic = tx_traffic + ?2,
                 total_traffic = total_traffic + ?1 + ?2,
                 updated_at = ?3
             WHERE username = ?4",
            params![delta_rx, delta_tx, Utc::now(), username],
        )?;
        Ok(())
    }

    /// Recompute `current_sessions`/`remaining_sessions` together, per the
    /// invariant that the two fields are never updated in isolation.
    pub fn refresh_session_counts(&self, username: &str, current_sessions: i64) -> Result<(), StoreError> {
        let conn = self.db.lock();
        conn.execute(
            "UPDATE radius_users
             SET current_sessions = ?1,
                 remaining_sessions = MAX(max_concurrent_sessions - ?1, 0),
                 updated_at = ?2
             WHERE username = ?3",
            params![current_sessions, Utc::now(), username],
        )?;
        Ok(())
    }

    /// Every user record, for the stats samplers to snapshot.
    pub fn list_all(&self) -> Result<Vec<RadiusUser>, StoreError> {
        let conn = self.db.lock();
        let query = format!("SELECT {SELECT_COLUMNS} FROM radius_users");
        let mut stmt = conn.prepare(&query)?;
        let users = stmt.query_map([], row_to_user)?.collect::<Result<_, _>>()?;
        Ok(users)
    }

    /// Sum of `rx_traffic`/`tx_traffic` across every user, for the server
    /// traffic sampler.
    pub fn aggregate_traffic(&self) -> Result<(i64, i64), StoreError> {
        let conn = self.db.lock();
        conn.query_row(
            "SELECT COALESCE(SUM(rx_traffic), 0), COALESCE(SUM(tx_traffic), 0) FROM radius_users",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .map_err(StoreError::from)
    }
}
